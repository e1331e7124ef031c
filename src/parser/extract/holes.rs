use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

use super::{proximity, Field, Located, Source};
use crate::error::ExtractionError;
use crate::parser::nodes::{full_text, NodeSeq};

static HOLES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());

pub const HOLES_LABEL: &str = "# Holes";

/// Elements with this much text or more are page sections, not labels.
pub const LABEL_TEXT_LIMIT: usize = 100;

fn is_hole_count(text: &str) -> bool {
    HOLES_RE.is_match(text)
}

/// Shortest element whose text carries the holes label. Ties go to the
/// element that comes first in the document.
pub fn holes_anchor<'a>(seq: &NodeSeq<'a>) -> Option<ElementRef<'a>> {
    seq.elements()
        .filter_map(|el| {
            let text = full_text(el);
            let len = text.chars().count();
            (text.contains(HOLES_LABEL) && len < LABEL_TEXT_LIMIT).then_some((len, el))
        })
        .min_by_key(|(len, _)| *len)
        .map(|(_, el)| el)
}

pub fn locate_hole_count(seq: &NodeSeq<'_>) -> Result<Located, ExtractionError> {
    let anchor = holes_anchor(seq).ok_or(ExtractionError::MissingAnchor {
        field: Field::HoleCount,
    })?;
    let value = proximity(seq, anchor, Field::HoleCount, is_hole_count)?;
    Ok(Located {
        value,
        source: Source::Proximity,
    })
}
