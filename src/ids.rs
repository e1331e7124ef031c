use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::record::DELIMITER;
use crate::text::decode_text;

/// Rows with fewer fields than this are left out of the rewritten file.
pub const MIN_FIELDS: usize = 4;

pub const ID_COLUMN: &str = "ID";

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

/// Moves `path` to `<path>.backup` and rewrites it with a leading `ID`
/// column. IDs are 1-based data row ordinals, blank lines included, so a
/// skipped short or blank row leaves a gap. Returns the number of rows
/// written.
pub fn add_course_ids(path: &Path) -> Result<usize, PipelineError> {
    let backup = backup_path(path);
    fs::rename(path, &backup).map_err(|source| PipelineError::Backup {
        from: path.to_path_buf(),
        to: backup.clone(),
        source,
    })?;
    info!("Backed up {} to {}", path.display(), backup.display());

    let bytes = fs::read(&backup).map_err(|e| PipelineError::read(&backup, e))?;
    let text = mark_blank_lines(&decode_text(bytes));
    let mut rdr = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut wtr = WriterBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .from_path(path)
        .map_err(|e| PipelineError::csv(path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| PipelineError::csv(&backup, e))?
        .clone();
    wtr.write_record(&with_id(ID_COLUMN, &headers))
        .map_err(|e| PipelineError::csv(path, e))?;

    let mut written = 0;
    for (idx, row) in rdr.records().enumerate() {
        let row = row.map_err(|e| PipelineError::csv(&backup, e))?;
        let id = idx + 1;
        if row.len() < MIN_FIELDS {
            warn!(row = id, fields = row.len(), "skipping short row");
            continue;
        }
        wtr.write_record(&with_id(&id.to_string(), &row))
            .map_err(|e| PipelineError::csv(path, e))?;
        written += 1;
    }
    wtr.flush().map_err(|e| PipelineError::write(path, e))?;

    info!("Assigned IDs to {} course(s) in {}", written, path.display());
    Ok(written)
}

/// Turns every blank line outside a quoted field into an empty `""` row,
/// which the csv reader would otherwise drop, so that it still takes an ID.
fn mark_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_quotes = false;
    let mut line_start = true;
    for c in text.chars() {
        if line_start && !in_quotes && (c == '\n' || c == '\r') {
            out.push_str("\"\"");
        }
        if c == '"' {
            in_quotes = !in_quotes;
        }
        out.push(c);
        line_start = c == '\n' && !in_quotes;
    }
    out
}

fn with_id(id: &str, row: &StringRecord) -> StringRecord {
    let mut out = StringRecord::with_capacity(row.as_slice().len() + id.len(), row.len() + 1);
    out.push_field(id);
    out.extend(row.iter());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_row_ordinals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usa_courses.csv");
        let before = "Course,City,State/Province,Country,Postal Code\n\
                        Pier Park,Portland,OR,US,97201\n\
                        Broken,Row\n\
                        \"Smith, John Memorial\",Ann Arbor,MI,US,48105\n";
        fs::write(&path, before).unwrap();

        let written = add_course_ids(&path).unwrap();
        assert_eq!(written, 2);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "ID,Course,City,State/Province,Country,Postal Code\n\
             1,Pier Park,Portland,OR,US,97201\n\
             3,\"Smith, John Memorial\",Ann Arbor,MI,US,48105\n"
        );
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), before);
    }

    #[test]
    fn blank_lines_take_an_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usa_courses.csv");
        fs::write(
            &path,
            "Course,City,State/Province,Country\n\
             Pier Park,Portland,OR,US\n\
             \n\
             \"Two\nLines\",Eugene,OR,US\n\
             Hudson Mills,Dexter,MI,US\n",
        )
        .unwrap();

        assert_eq!(add_course_ids(&path).unwrap(), 3);
        let ids: Vec<String> = ReaderBuilder::new()
            .from_path(&path)
            .unwrap()
            .records()
            .map(|r| r.unwrap()[0].to_string())
            .collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
    }

    #[test]
    fn blank_marker_skips_quoted_newlines() {
        assert_eq!(mark_blank_lines("a\n\nb\r\n\r\n"), "a\n\"\"\nb\r\n\"\"\r\n");
        assert_eq!(mark_blank_lines("\"x\n\ny\"\n"), "\"x\n\ny\"\n");
    }

    #[test]
    fn missing_file_fails_backup() {
        let dir = tempfile::tempdir().unwrap();
        let err = add_course_ids(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::Backup { .. }));
    }

    #[test]
    fn backup_name_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("data/usa_courses.csv")),
            PathBuf::from("data/usa_courses.csv.backup")
        );
    }
}
