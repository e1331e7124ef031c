pub mod extract;
pub mod links;
pub mod nodes;

use scraper::Html;

use crate::error::ExtractionError;
use crate::settings::MissingFieldPolicy;
use extract::Extraction;

/// Parse one saved course page and extract its record.
pub fn analyze_document(
    html: &str,
    on_missing: MissingFieldPolicy,
    identifier: &str,
) -> Result<Extraction, ExtractionError> {
    let doc = Html::parse_document(html);
    extract::extract(&doc, on_missing, identifier)
}
