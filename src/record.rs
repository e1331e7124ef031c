use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static COORDINATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").unwrap());

/// Field delimiter of every output file.
pub const DELIMITER: u8 = b',';

/// Header line of the extraction output, written verbatim.
pub const EXTRACTION_HEADER: &str = "Name, Number of holes, Latitude, Longitude";

/// Column order of the enrichment output.
pub const DATASET_HEADER: [&str; 9] = [
    "Course",
    "City",
    "State/Province",
    "Country",
    "Postal Code",
    "# Holes",
    "Rating",
    "Approximate_Lat",
    "Approximate_Lon",
];

/// A decimal degree value as it appears in the source, e.g. `-122.68`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate(String);

impl Coordinate {
    /// Trims `raw` and accepts it only if it is a plain signed decimal.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if COORDINATE_RE.is_match(trimmed) {
            Some(Coordinate(trimmed.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One physical course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseRecord {
    pub name: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub hole_count: u32,
    pub latitude: Option<Coordinate>,
    pub longitude: Option<Coordinate>,
    pub rating: Option<i64>,
}

impl CourseRecord {
    pub fn new(name: impl Into<String>, hole_count: u32) -> Self {
        CourseRecord {
            name: name.into(),
            hole_count,
            ..Default::default()
        }
    }

    /// A delimiter inside the name would split the row in naive consumers.
    pub fn name_has_delimiter(&self) -> bool {
        self.name.contains(char::from(DELIMITER))
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Row for the extraction output: name, holes, latitude, longitude.
    pub fn extraction_fields(&self) -> [String; 4] {
        [
            self.name.clone(),
            self.hole_count.to_string(),
            coordinate_text(&self.latitude),
            coordinate_text(&self.longitude),
        ]
    }
}

fn coordinate_text(c: &Option<Coordinate>) -> String {
    c.as_ref().map(|c| c.as_str().to_string()).unwrap_or_default()
}

/// One row of the raw course table consumed by the enricher.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawCourseRow {
    #[serde(rename = "Course")]
    pub name: String,
    #[serde(rename = "City", default)]
    pub city: String,
    #[serde(rename = "State/Province", default)]
    pub state: String,
    #[serde(rename = "Country", default)]
    pub country: String,
    #[serde(rename = "Postal Code", default)]
    pub postal_code: String,
    #[serde(rename = "# Holes")]
    pub hole_count: u32,
    #[serde(rename = "Rating", default, deserialize_with = "csv::invalid_option")]
    pub rating: Option<i64>,
}

impl From<&RawCourseRow> for CourseRecord {
    fn from(row: &RawCourseRow) -> Self {
        CourseRecord {
            name: row.name.clone(),
            city: row.city.clone(),
            state: row.state.clone(),
            country: row.country.clone(),
            postal_code: row.postal_code.clone(),
            hole_count: row.hole_count,
            latitude: None,
            longitude: None,
            rating: row.rating,
        }
    }
}

/// Serialized shape of the enrichment output; field order is `DATASET_HEADER`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    #[serde(rename = "Course")]
    pub name: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "State/Province")]
    pub state: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Postal Code")]
    pub postal_code: String,
    #[serde(rename = "# Holes")]
    pub hole_count: u32,
    #[serde(rename = "Rating")]
    pub rating: Option<i64>,
    #[serde(rename = "Approximate_Lat")]
    pub latitude: Option<String>,
    #[serde(rename = "Approximate_Lon")]
    pub longitude: Option<String>,
}

impl From<&CourseRecord> for DatasetRow {
    fn from(r: &CourseRecord) -> Self {
        DatasetRow {
            name: r.name.clone(),
            city: r.city.clone(),
            state: r.state.clone(),
            country: r.country.clone(),
            postal_code: r.postal_code.clone(),
            hole_count: r.hole_count,
            rating: r.rating,
            latitude: r.latitude.as_ref().map(|c| c.as_str().to_string()),
            longitude: r.longitude.as_ref().map(|c| c.as_str().to_string()),
        }
    }
}

impl From<DatasetRow> for CourseRecord {
    fn from(row: DatasetRow) -> Self {
        CourseRecord {
            latitude: row.latitude.as_deref().and_then(Coordinate::parse),
            longitude: row.longitude.as_deref().and_then(Coordinate::parse),
            name: row.name,
            city: row.city,
            state: row.state,
            country: row.country,
            postal_code: row.postal_code,
            hole_count: row.hole_count,
            rating: row.rating,
        }
    }
}
