use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::settings::PostalMatch;
use crate::text::decode_text;

/// Width of a US ZIP code, used by [`PostalMatch::ZeroPadded`].
pub const POSTAL_CODE_WIDTH: usize = 5;

/// Raw coordinate pair as stored in the reference file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatLon {
    pub lat: String,
    pub lon: String,
}

/// Postal code to coordinate reference, read once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct CoordinateLookupTable {
    entries: HashMap<String, LatLon>,
    matching: PostalMatch,
}

impl CoordinateLookupTable {
    pub fn load(path: &Path, matching: PostalMatch) -> Result<Self, PipelineError> {
        let file = std::fs::File::open(path).map_err(|e| PipelineError::read(path, e))?;
        let table = Self::from_reader(file, matching).map_err(|e| PipelineError::csv(path, e))?;
        info!(
            "Loaded {} postal codes from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Reads `code,lat,lon` rows after a header line. The bytes are decoded
    /// as UTF-8 with a Latin-1 fallback. Unparseable rows and rows without
    /// exactly three fields are skipped; a repeated code replaces the earlier
    /// one.
    pub fn from_reader<R: Read>(mut reader: R, matching: PostalMatch) -> Result<Self, csv::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = decode_text(bytes);
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut entries = HashMap::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(line = idx + 2, error = %e, "skipping unreadable postal code row");
                    continue;
                }
            };
            if record.len() != 3 {
                warn!(line = idx + 2, fields = record.len(), "skipping malformed postal code row");
                continue;
            }
            let code = normalize(record[0].trim(), matching);
            entries.insert(
                code,
                LatLon {
                    lat: record[1].to_string(),
                    lon: record[2].to_string(),
                },
            );
        }
        Ok(CoordinateLookupTable { entries, matching })
    }

    pub fn get(&self, postal_code: &str) -> Option<&LatLon> {
        match self.matching {
            PostalMatch::Exact => self.entries.get(postal_code),
            PostalMatch::ZeroPadded => self.entries.get(&normalize(postal_code, self.matching)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(code: &str, matching: PostalMatch) -> String {
    match matching {
        PostalMatch::Exact => code.to_string(),
        PostalMatch::ZeroPadded => {
            if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
                format!("{:0>width$}", code, width = POSTAL_CODE_WIDTH)
            } else {
                code.to_string()
            }
        }
    }
}
