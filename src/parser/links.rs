use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use scraper::{Html, Selector};

static COURSE_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/course-directory/course/[\w-]+$").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Course detail paths linked from a saved directory listing page.
pub fn course_paths(listing_html: &str) -> Vec<String> {
    let doc = Html::parse_document(listing_html);
    doc.select(&ANCHOR_SEL)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| COURSE_HREF_RE.is_match(href))
        .map(str::to_string)
        .collect()
}

/// Absolute, deduplicated, sorted course URLs across several listing pages.
pub fn course_urls<'a, I>(listings: I, base_url: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let base = base_url.trim_end_matches('/');
    listings
        .into_iter()
        .flat_map(course_paths)
        .map(|path| format!("{}{}", base, path))
        .unique()
        .sorted()
        .collect()
}
