use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use tracing::{info, warn};

use crate::error::{DocumentError, PipelineError};
use crate::parser::{self, extract::Extraction};
use crate::record::{CourseRecord, DELIMITER, EXTRACTION_HEADER};
use crate::settings::MissingFieldPolicy;
use crate::summary::StrategyTally;
use crate::text::decode_text;

/// One saved course page, named by an opaque identifier (its file stem).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub path: PathBuf,
}

impl Document {
    pub fn from_path(path: PathBuf) -> Self {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Document { id, path }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub id: String,
    pub error: String,
}

/// Everything one batch produced. `records.len() + failures.len()` equals the
/// number of documents processed.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub records: Vec<CourseRecord>,
    pub failures: Vec<DocumentFailure>,
    pub warned: usize,
    pub tally: StrategyTally,
}

impl BatchResult {
    pub fn processed(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    fn push_success(&mut self, extraction: Extraction) {
        if !extraction.warnings.is_empty() {
            self.warned += 1;
        }
        self.tally.record(&extraction.sources);
        self.records.push(extraction.record);
    }

    fn push_failure(&mut self, id: &str, error: &DocumentError) {
        warn!(document = %id, error = %error, "document skipped");
        self.failures.push(DocumentFailure {
            id: id.to_string(),
            error: error.to_string(),
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub on_missing: MissingFieldPolicy,
    pub skip: usize,
    pub limit: Option<usize>,
    pub progress: bool,
}

/// `*.html` files in `dir`, sorted by identifier.
pub fn collect_documents(dir: &Path) -> Result<Vec<Document>, PipelineError> {
    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::read(dir, e))?;
    let mut docs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| PipelineError::read(dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "html") {
            docs.push(Document::from_path(path));
        }
    }
    docs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(docs)
}

/// Append-mode writer for the extraction output. The header goes in only
/// when the file starts out empty; each row is flushed as it is written.
pub struct ExtractionWriter {
    path: PathBuf,
    wtr: csv::Writer<File>,
    needs_header: bool,
    written: usize,
}

impl ExtractionWriter {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| PipelineError::write(path, e))?;
        let existing = file
            .metadata()
            .map_err(|e| PipelineError::write(path, e))?
            .len();
        let wtr = WriterBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .from_writer(file);
        Ok(ExtractionWriter {
            path: path.to_path_buf(),
            wtr,
            needs_header: existing == 0,
            written: 0,
        })
    }

    pub fn write(&mut self, record: &CourseRecord) -> Result<(), PipelineError> {
        if self.needs_header {
            self.wtr
                .write_record(EXTRACTION_HEADER.split(char::from(DELIMITER)))
                .map_err(|e| PipelineError::csv(&self.path, e))?;
            self.needs_header = false;
        }
        self.wtr
            .write_record(record.extraction_fields())
            .map_err(|e| PipelineError::csv(&self.path, e))?;
        self.wtr
            .flush()
            .map_err(|e| PipelineError::write(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read and extract one document.
pub fn analyze_one(
    doc: &Document,
    on_missing: MissingFieldPolicy,
) -> Result<Extraction, DocumentError> {
    let html = decode_text(std::fs::read(&doc.path)?);
    Ok(parser::analyze_document(&html, on_missing, &doc.id)?)
}

/// Runs the extractor over `documents` in identifier order. A failing
/// document is logged and recorded, never fatal; only the output writer can
/// abort the batch, and rows written before that stay on disk.
pub fn analyze_all(
    documents: &[Document],
    opts: &BatchOptions,
    writer: &mut ExtractionWriter,
) -> Result<BatchResult, PipelineError> {
    let window: Vec<&Document> = documents
        .iter()
        .sorted_by(|a, b| a.id.cmp(&b.id))
        .skip(opts.skip)
        .take(opts.limit.unwrap_or(usize::MAX))
        .collect();
    info!(
        "Analyzing {} of {} documents (from #{})",
        window.len(),
        documents.len(),
        opts.skip
    );

    let pb = progress_bar(window.len(), opts.progress);
    let mut result = BatchResult::default();
    for doc in window {
        match analyze_one(doc, opts.on_missing) {
            Ok(extraction) => {
                writer.write(&extraction.record)?;
                result.push_success(extraction);
            }
            Err(e) => result.push_failure(&doc.id, &e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        "Added {} course(s) to {}",
        result.records.len(),
        writer.path().display()
    );
    Ok(result)
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn opts() -> BatchOptions {
        BatchOptions {
            on_missing: MissingFieldPolicy::Drop,
            skip: 0,
            limit: None,
            progress: false,
        }
    }

    /// Copies named fixtures into a fresh directory as `<id>.html`.
    fn stage(pages: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (id, fixture) in pages {
            fs::copy(
                format!("tests/fixtures/{}.html", fixture),
                dir.path().join(format!("{}.html", id)),
            )
            .unwrap();
        }
        dir
    }

    fn run(dir: &Path, out: &Path, opts: &BatchOptions) -> BatchResult {
        let docs = collect_documents(dir).unwrap();
        let mut writer = ExtractionWriter::open(out).unwrap();
        analyze_all(&docs, opts, &mut writer).unwrap()
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.csv");
        let result = run(dir.path(), &out, &opts());
        assert_eq!(result.processed(), 0);
        assert!(result.records.is_empty());
        assert_eq!(fs::read_to_string(&out).unwrap(), "");
    }

    #[test]
    fn one_bad_document_does_not_abort() {
        let pages = stage(&[
            ("0001", "maple_hill"),
            ("0002", "broken"),
            ("0003", "maple_hill_legacy"),
            ("0004", "short_course"),
        ]);
        let out_dir = tempfile::tempdir().unwrap();
        let result = run(pages.path(), &out_dir.path().join("courses.csv"), &opts());

        assert_eq!(result.records.len(), 3);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].id, "0002");
        assert_eq!(result.processed(), 4);
    }

    #[test]
    fn documents_run_in_identifier_order() {
        let pages = stage(&[("b", "short_course"), ("a", "maple_hill")]);
        let docs = collect_documents(pages.path()).unwrap();
        let reversed: Vec<Document> = docs.iter().rev().cloned().collect();
        let out_dir = tempfile::tempdir().unwrap();
        let mut writer = ExtractionWriter::open(&out_dir.path().join("o.csv")).unwrap();
        let result = analyze_all(&reversed, &opts(), &mut writer).unwrap();
        let names: Vec<&str> = result.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Maple Hill", "Pine Ridge Nine"]);
    }

    #[test]
    fn new_file_gets_header_once_then_appends() {
        let pages = stage(&[("0001", "maple_hill")]);
        let out_dir = tempfile::tempdir().unwrap();
        let out = out_dir.path().join("usa_courses_full.csv");

        run(pages.path(), &out, &opts());
        run(pages.path(), &out, &opts());

        let text = fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            "Name, Number of holes, Latitude, Longitude\n\
             Maple Hill,18,42.2583,-71.9094\n\
             Maple Hill,18,42.2583,-71.9094\n"
        );
    }

    #[test]
    fn writer_counts_rows_not_header() {
        let pages = stage(&[("a", "maple_hill"), ("b", "broken"), ("c", "short_course")]);
        let out_dir = tempfile::tempdir().unwrap();
        let out = out_dir.path().join("o.csv");
        let docs = collect_documents(pages.path()).unwrap();
        let mut writer = ExtractionWriter::open(&out).unwrap();
        let result = analyze_all(&docs, &opts(), &mut writer).unwrap();

        assert_eq!(writer.written(), 2);
        assert_eq!(writer.written(), result.records.len());
        assert_eq!(fs::read_to_string(&out).unwrap().lines().count(), 3);
    }

    #[test]
    fn existing_file_is_not_given_a_header() {
        let pages = stage(&[("0001", "short_course")]);
        let out_dir = tempfile::tempdir().unwrap();
        let out = out_dir.path().join("usa_courses_full.csv");
        fs::write(&out, "Name, Number of holes, Latitude, Longitude\nOld Course,18,,\n").unwrap();

        run(pages.path(), &out, &opts());

        let text = fs::read_to_string(&out).unwrap();
        assert_eq!(text.matches("Name, Number of holes").count(), 1);
        assert!(text.ends_with("Old Course,18,,\nPine Ridge Nine,9,44.9778,-93.2650\n"));
    }

    #[test]
    fn window_selects_a_slice() {
        let pages = stage(&[("a", "maple_hill"), ("b", "broken"), ("c", "short_course")]);
        let out_dir = tempfile::tempdir().unwrap();
        let o = BatchOptions {
            skip: 1,
            limit: Some(1),
            ..opts()
        };
        let result = run(pages.path(), &out_dir.path().join("o.csv"), &o);
        assert_eq!(result.processed(), 1);
        assert_eq!(result.failures[0].id, "b");
    }

    #[test]
    fn placeholder_policy_keeps_every_document() {
        let pages = stage(&[("maple", "maple_hill"), ("missing-page", "broken")]);
        let out_dir = tempfile::tempdir().unwrap();
        let o = BatchOptions {
            on_missing: MissingFieldPolicy::Placeholder,
            ..opts()
        };
        let result = run(pages.path(), &out_dir.path().join("o.csv"), &o);
        assert!(result.failures.is_empty());
        assert_eq!(result.records[1].name, "missing-page");
        assert_eq!(result.warned, 1);
    }

    #[test]
    fn unreadable_document_is_a_failure() {
        let docs = vec![Document::from_path(PathBuf::from("tests/fixtures/absent.html"))];
        let out_dir = tempfile::tempdir().unwrap();
        let mut writer = ExtractionWriter::open(&out_dir.path().join("o.csv")).unwrap();
        let result = analyze_all(&docs, &opts(), &mut writer).unwrap();
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].error.starts_with("read failed"));
    }

    #[test]
    fn unwritable_destination_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExtractionWriter::open(&dir.path().join("no/such/dir/out.csv"))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Write { .. }));
    }

    #[test]
    fn missing_document_dir_is_fatal() {
        assert!(matches!(
            collect_documents(Path::new("tests/fixtures/nope")),
            Err(PipelineError::Read { .. })
        ));
    }

    #[test]
    fn tally_tracks_strategies() {
        use crate::parser::extract::Field;
        let pages = stage(&[("a", "maple_hill"), ("b", "maple_hill_legacy")]);
        let out_dir = tempfile::tempdir().unwrap();
        let result = run(pages.path(), &out_dir.path().join("o.csv"), &opts());
        let name = result.tally.get(Field::Name);
        assert_eq!((name.marker, name.proximity), (1, 1));
        assert_eq!(result.tally.get(Field::HoleCount).proximity, 2);
    }
}
