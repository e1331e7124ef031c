pub mod holes;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use serde::Serialize;
use tracing::{debug, warn};

use super::nodes::{own_text, NodeSeq, MAX_SCAN_STEPS};
use crate::error::{ExtractionError, ValidationWarning};
use crate::record::{Coordinate, CourseRecord};
use crate::settings::MissingFieldPolicy;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z].+").unwrap());

/// Attributes that carry a marker value on `<meta>`-style elements.
const MARKER_ATTRS: &[&str] = &["property", "name", "itemprop"];

/// Hole count used when the placeholder policy fills a missing value.
pub const PLACEHOLDER_HOLE_COUNT: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    HoleCount,
    Latitude,
    Longitude,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Name => "name",
            Field::HoleCount => "hole count",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
        })
    }
}

/// Which strategy produced a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Marker,
    Proximity,
    Placeholder,
    Missing,
}

/// How one field is located: marker values to look for and the text
/// predicates for each strategy.
pub struct FieldSpec {
    pub field: Field,
    pub markers: &'static [&'static str],
    pub accept_marker: fn(&str) -> bool,
    pub accept_scan: fn(&str) -> bool,
}

fn is_name(text: &str) -> bool {
    NAME_RE.is_match(text)
}

fn is_non_empty(text: &str) -> bool {
    !text.is_empty()
}

fn is_coordinate(text: &str) -> bool {
    Coordinate::parse(text).is_some()
}

pub const NAME: FieldSpec = FieldSpec {
    field: Field::Name,
    markers: &["og:title"],
    accept_marker: is_non_empty,
    accept_scan: is_name,
};

pub const LATITUDE: FieldSpec = FieldSpec {
    field: Field::Latitude,
    markers: &["og:latitude", "place:location:latitude"],
    accept_marker: is_coordinate,
    accept_scan: is_coordinate,
};

pub const LONGITUDE: FieldSpec = FieldSpec {
    field: Field::Longitude,
    markers: &["og:longitude", "place:location:longitude"],
    accept_marker: is_coordinate,
    accept_scan: is_coordinate,
};

/// A value and the strategy that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub value: String,
    pub source: Source,
}

/// Best-effort record for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub record: CourseRecord,
    pub sources: Vec<(Field, Source)>,
    pub warnings: Vec<ValidationWarning>,
}

/// Reads `content` from the first element whose marker attribute equals one
/// of `markers`.
pub fn direct_marker(seq: &NodeSeq<'_>, markers: &[&str]) -> Option<String> {
    seq.elements().find_map(|el| {
        let v = el.value();
        let marked = MARKER_ATTRS
            .iter()
            .filter_map(|a| v.attr(a))
            .any(|val| markers.contains(&val));
        if !marked {
            return None;
        }
        v.attr("content")
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    })
}

/// First classed element whose own text mentions one of `markers`. This is
/// where a marker survives as text when the attribute itself is gone.
pub fn marker_anchor<'a>(seq: &NodeSeq<'a>, markers: &[&str]) -> Option<ElementRef<'a>> {
    seq.elements().find(|el| {
        el.value().attr("class").is_some() && {
            let text = own_text(*el);
            markers.iter().any(|m| text.contains(m))
        }
    })
}

/// Bounded forward scan from `anchor` for a text accepted by `accept`.
pub fn proximity<'a>(
    seq: &NodeSeq<'a>,
    anchor: ElementRef<'a>,
    field: Field,
    accept: fn(&str) -> bool,
) -> Result<String, ExtractionError> {
    let start = seq
        .position(anchor)
        .ok_or(ExtractionError::MissingAnchor { field })?;
    seq.scan_forward(start, MAX_SCAN_STEPS, accept)
        .map(str::to_string)
        .ok_or(ExtractionError::ScanExhausted {
            field,
            steps: MAX_SCAN_STEPS,
        })
}

/// Marker first, proximity fallback second.
pub fn locate(seq: &NodeSeq<'_>, spec: &FieldSpec) -> Result<Located, ExtractionError> {
    if let Some(value) = direct_marker(seq, spec.markers) {
        if (spec.accept_marker)(&value) {
            return Ok(Located {
                value,
                source: Source::Marker,
            });
        }
        debug!(field = %spec.field, value = %value, "marker value rejected");
    }

    let anchor = marker_anchor(seq, spec.markers).ok_or(ExtractionError::MissingAnchor {
        field: spec.field,
    })?;
    debug!(field = %spec.field, "marker attribute absent, scanning from anchor");
    let value = proximity(seq, anchor, spec.field, spec.accept_scan)?;
    Ok(Located {
        value,
        source: Source::Proximity,
    })
}

/// Extracts one course from a parsed document.
///
/// Name and hole count are required; a miss is an error under
/// [`MissingFieldPolicy::Drop`] and a placeholder under
/// [`MissingFieldPolicy::Placeholder`] (`identifier` for the name,
/// [`PLACEHOLDER_HOLE_COUNT`] for holes). Coordinates are optional and stay
/// empty when not found.
pub fn extract(
    doc: &Html,
    on_missing: MissingFieldPolicy,
    identifier: &str,
) -> Result<Extraction, ExtractionError> {
    let seq = NodeSeq::new(doc);
    let mut warnings = Vec::new();
    let mut sources = Vec::with_capacity(4);

    let name = required(locate(&seq, &NAME), on_missing, identifier, &mut warnings)?;
    let holes = required(
        holes::locate_hole_count(&seq),
        on_missing,
        &PLACEHOLDER_HOLE_COUNT.to_string(),
        &mut warnings,
    )?;
    let hole_count = holes
        .value
        .parse::<u32>()
        .map_err(|_| ExtractionError::InvalidValue {
            field: Field::HoleCount,
            value: holes.value.clone(),
        })?;
    sources.push((Field::Name, name.source));
    sources.push((Field::HoleCount, holes.source));

    let mut record = CourseRecord::new(name.value, hole_count);
    let (latitude, lat_source) = optional(locate(&seq, &LATITUDE));
    let (longitude, lon_source) = optional(locate(&seq, &LONGITUDE));
    record.latitude = latitude;
    record.longitude = longitude;
    sources.push((Field::Latitude, lat_source));
    sources.push((Field::Longitude, lon_source));

    if record.name_has_delimiter() {
        warn!("Warning: comma in name of course {}", record.name);
        warnings.push(ValidationWarning::DelimiterInName {
            name: record.name.clone(),
        });
    }

    Ok(Extraction {
        record,
        sources,
        warnings,
    })
}

fn required(
    found: Result<Located, ExtractionError>,
    on_missing: MissingFieldPolicy,
    placeholder: &str,
    warnings: &mut Vec<ValidationWarning>,
) -> Result<Located, ExtractionError> {
    match (found, on_missing) {
        (Ok(located), _) => Ok(located),
        (Err(e), MissingFieldPolicy::Drop) => Err(e),
        (Err(e), MissingFieldPolicy::Placeholder) => {
            warn!(error = %e, placeholder, "required field missing, using placeholder");
            warnings.push(ValidationWarning::PlaceholderUsed {
                field: e.field(),
                value: placeholder.to_string(),
            });
            Ok(Located {
                value: placeholder.to_string(),
                source: Source::Placeholder,
            })
        }
    }
}

fn optional(found: Result<Located, ExtractionError>) -> (Option<Coordinate>, Source) {
    match found {
        Ok(located) => match Coordinate::parse(&located.value) {
            Some(c) => (Some(c), located.source),
            None => (None, Source::Missing),
        },
        Err(e) => {
            debug!(error = %e, "optional field left empty");
            (None, Source::Missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Html {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        Html::parse_document(&html)
    }

    fn source_of(x: &Extraction, field: Field) -> Source {
        x.sources.iter().find(|(f, _)| *f == field).unwrap().1
    }

    #[test]
    fn marker_document() {
        let x = extract(&fixture("maple_hill"), MissingFieldPolicy::Drop, "maple-hill").unwrap();
        assert_eq!(x.record.name, "Maple Hill");
        assert_eq!(x.record.hole_count, 18);
        assert_eq!(x.record.latitude.as_ref().unwrap().as_str(), "42.2583");
        assert_eq!(x.record.longitude.as_ref().unwrap().as_str(), "-71.9094");
        assert_eq!(source_of(&x, Field::Name), Source::Marker);
        assert_eq!(source_of(&x, Field::Latitude), Source::Marker);
        assert!(x.warnings.is_empty());
    }

    #[test]
    fn legacy_document_uses_proximity() {
        let x = extract(&fixture("maple_hill_legacy"), MissingFieldPolicy::Drop, "maple-hill").unwrap();
        assert_eq!(source_of(&x, Field::Name), Source::Proximity);
        assert_eq!(source_of(&x, Field::Latitude), Source::Proximity);
        assert_eq!(source_of(&x, Field::Longitude), Source::Proximity);
    }

    #[test]
    fn both_strategies_agree() {
        let direct = extract(&fixture("maple_hill"), MissingFieldPolicy::Drop, "a").unwrap();
        let fallback = extract(&fixture("maple_hill_legacy"), MissingFieldPolicy::Drop, "a").unwrap();
        assert_eq!(direct.record, fallback.record);
    }

    #[test]
    fn missing_coordinates_are_not_fatal() {
        let doc = Html::parse_document(
            r#"<meta property="og:title" content="Elm Park">
               <div class="label"># Holes</div><div>24</div>"#,
        );
        let x = extract(&doc, MissingFieldPolicy::Drop, "elm-park").unwrap();
        assert_eq!(x.record.hole_count, 24);
        assert!(x.record.latitude.is_none());
        assert_eq!(source_of(&x, Field::Longitude), Source::Missing);
    }

    #[test]
    fn malformed_marker_coordinate_falls_back() {
        let doc = Html::parse_document(
            r#"<meta property="og:title" content="Elm Park">
               <meta property="og:latitude" content="unknown">
               <span class="attr">og:latitude</span> <span>39.5</span>
               <div class="label"># Holes</div><div>18</div>"#,
        );
        let x = extract(&doc, MissingFieldPolicy::Drop, "elm-park").unwrap();
        assert_eq!(x.record.latitude.as_ref().unwrap().as_str(), "39.5");
        assert_eq!(source_of(&x, Field::Latitude), Source::Proximity);
    }

    #[test]
    fn missing_name_is_an_error() {
        let doc = Html::parse_document(r#"<div class="label"># Holes</div><div>18</div>"#);
        let err = extract(&doc, MissingFieldPolicy::Drop, "x").unwrap_err();
        assert_eq!(err, ExtractionError::MissingAnchor { field: Field::Name });
    }

    #[test]
    fn missing_holes_is_an_error() {
        let doc = Html::parse_document(r#"<meta property="og:title" content="Elm Park"><p>Par 54</p>"#);
        let err = extract(&doc, MissingFieldPolicy::Drop, "x").unwrap_err();
        assert_eq!(err.field(), Field::HoleCount);
    }

    #[test]
    fn name_scan_is_bounded() {
        let noise: String = (0..80).map(|i| format!("<i>word{}</i>", i)).collect();
        let html = format!(
            r#"<span class="v">og:title</span>{}<b>Far Away Park</b>
               <div class="label"># Holes</div><div>18</div>"#,
            noise
        );
        let err = extract(&Html::parse_document(&html), MissingFieldPolicy::Drop, "x").unwrap_err();
        assert_eq!(
            err,
            ExtractionError::ScanExhausted {
                field: Field::Name,
                steps: MAX_SCAN_STEPS
            }
        );
    }

    #[test]
    fn placeholder_policy_fills_required_fields() {
        let doc = Html::parse_document(r#"<p>nothing useful here</p>"#);
        let x = extract(&doc, MissingFieldPolicy::Placeholder, "pine-ridge").unwrap();
        assert_eq!(x.record.name, "pine-ridge");
        assert_eq!(x.record.hole_count, PLACEHOLDER_HOLE_COUNT);
        assert_eq!(source_of(&x, Field::Name), Source::Placeholder);
        assert_eq!(x.warnings.len(), 2);
    }

    #[test]
    fn comma_in_name_is_a_warning() {
        let doc = Html::parse_document(
            r#"<meta property="og:title" content="Hudson Mills, Lower">
               <div class="label"># Holes</div><div>18</div>"#,
        );
        let x = extract(&doc, MissingFieldPolicy::Drop, "x").unwrap();
        assert_eq!(x.record.name, "Hudson Mills, Lower");
        assert_eq!(
            x.warnings,
            vec![ValidationWarning::DelimiterInName {
                name: "Hudson Mills, Lower".into()
            }]
        );
    }
}
