use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim, WriterBuilder};
use tracing::{debug, info, warn};

use crate::error::{LookupMiss, PipelineError, ValidationWarning};
use crate::lookup::CoordinateLookupTable;
use crate::parser::extract::Field;
use crate::record::{Coordinate, CourseRecord, DatasetRow, RawCourseRow, DATASET_HEADER};
use crate::settings::PostalMatch;
use crate::text::decode_text;

/// Inputs and output of one enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub courses_input: PathBuf,
    pub postal_codes: PathBuf,
    pub dataset_output: PathBuf,
    pub min_holes: u32,
    pub postal_match: PostalMatch,
}

/// Raw course rows plus the rows that could not be parsed.
#[derive(Debug, Default)]
pub struct RawTable {
    pub rows: Vec<RawCourseRow>,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub line: u64,
    pub error: String,
}

impl fmt::Display for RejectedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

/// Result of the coordinate join, in input order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub records: Vec<CourseRecord>,
    pub unmatched: Vec<String>,
    pub warnings: Vec<ValidationWarning>,
}

/// Records that survived the hole filter and deduplication.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Dataset {
    pub rows: Vec<CourseRecord>,
    pub below_min_holes: usize,
    pub duplicates: Vec<ValidationWarning>,
}

#[derive(Debug, Default)]
pub struct EnrichReport {
    pub input_rows: usize,
    pub rejected: Vec<RejectedRow>,
    pub matched: usize,
    pub unmatched: Vec<String>,
    pub below_min_holes: usize,
    pub warned: usize,
    pub written: usize,
}

/// Attaches approximate coordinates to every row by postal code. A miss is
/// reported and the record is kept without coordinates.
pub fn enrich(rows: &[RawCourseRow], lookup: &CoordinateLookupTable) -> Enrichment {
    let mut out = Enrichment::default();
    for row in rows {
        let mut record = CourseRecord::from(row);
        match lookup.get(&row.postal_code) {
            Some(pair) => {
                let lat = Coordinate::parse(&pair.lat);
                let lon = Coordinate::parse(&pair.lon);
                if lat.is_none() {
                    out.warnings.push(invalid(Field::Latitude, &pair.lat));
                }
                if lon.is_none() {
                    out.warnings.push(invalid(Field::Longitude, &pair.lon));
                }
                if let (Some(lat), Some(lon)) = (lat, lon) {
                    record.latitude = Some(lat);
                    record.longitude = Some(lon);
                }
            }
            None => {
                let miss = LookupMiss {
                    course: row.name.clone(),
                    postal_code: row.postal_code.clone(),
                };
                warn!("{}", miss);
                out.unmatched.push(miss.postal_code);
            }
        }
        out.records.push(record);
    }
    out
}

fn invalid(field: Field, value: &str) -> ValidationWarning {
    let w = ValidationWarning::InvalidCoordinate {
        field,
        value: value.to_string(),
    };
    warn!("{}", w);
    w
}

/// Drops courses below `min_holes`, then repeats of the same course
/// (name, city, state, postal code). Order is preserved.
pub fn build_dataset(records: Vec<CourseRecord>, min_holes: u32) -> Dataset {
    let mut dataset = Dataset::default();
    let mut seen = HashSet::new();
    for record in records {
        if record.hole_count < min_holes {
            debug!(course = %record.name, holes = record.hole_count, "below hole minimum");
            dataset.below_min_holes += 1;
            continue;
        }
        let key = (
            record.name.clone(),
            record.city.clone(),
            record.state.clone(),
            record.postal_code.clone(),
        );
        if !seen.insert(key) {
            let w = ValidationWarning::DuplicateCourse {
                name: record.name.clone(),
                postal_code: record.postal_code.clone(),
            };
            warn!("{}", w);
            dataset.duplicates.push(w);
            continue;
        }
        dataset.rows.push(record);
    }
    dataset
}

/// Rewrites `path` with the fixed header and one row per record.
pub fn write_dataset(path: &Path, rows: &[CourseRecord]) -> Result<(), PipelineError> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| PipelineError::csv(path, e))?;
    wtr.write_record(DATASET_HEADER)
        .map_err(|e| PipelineError::csv(path, e))?;
    for row in rows {
        wtr.serialize(DatasetRow::from(row))
            .map_err(|e| PipelineError::csv(path, e))?;
    }
    wtr.flush().map_err(|e| PipelineError::write(path, e))?;
    Ok(())
}

/// Reads the raw course table. Unparseable rows are rejected individually.
pub fn read_raw_courses(path: &Path) -> Result<RawTable, PipelineError> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::read(path, e))?;
    let text = decode_text(bytes);
    parse_raw_courses(text.trim_start_matches('\u{feff}'))
        .map_err(|e| PipelineError::csv(path, e))
}

pub fn parse_raw_courses(text: &str) -> Result<RawTable, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    // Header problems are fatal; row problems are not.
    rdr.headers()?;

    let mut table = RawTable::default();
    for result in rdr.deserialize::<RawCourseRow>() {
        match result {
            Ok(row) => table.rows.push(row),
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                warn!(line, error = %e, "skipping course row");
                table.rejected.push(RejectedRow {
                    line,
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(table)
}

/// Load, join, filter and rewrite the final dataset.
pub fn run(opts: &EnrichOptions) -> Result<EnrichReport, PipelineError> {
    let lookup = CoordinateLookupTable::load(&opts.postal_codes, opts.postal_match)?;
    if lookup.is_empty() {
        warn!("postal code table {} is empty", opts.postal_codes.display());
    }
    let raw = read_raw_courses(&opts.courses_input)?;
    info!(
        "Loaded {} course rows ({} rejected) from {}",
        raw.rows.len(),
        raw.rejected.len(),
        opts.courses_input.display()
    );

    let enrichment = enrich(&raw.rows, &lookup);
    let matched = enrichment
        .records
        .iter()
        .filter(|r| r.has_coordinates())
        .count();
    let coordinate_warnings = enrichment.warnings.len();
    let dataset = build_dataset(enrichment.records, opts.min_holes);

    write_dataset(&opts.dataset_output, &dataset.rows)?;
    info!("Result saved to {}", opts.dataset_output.display());

    Ok(EnrichReport {
        input_rows: raw.rows.len() + raw.rejected.len(),
        rejected: raw.rejected,
        matched,
        unmatched: enrichment.unmatched,
        below_min_holes: dataset.below_min_holes,
        warned: coordinate_warnings + dataset.duplicates.len(),
        written: dataset.rows.len(),
    })
}
