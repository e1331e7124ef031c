use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::batch::BatchResult;
use crate::enrich::EnrichReport;
use crate::parser::extract::{Field, Source};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub marker: usize,
    pub proximity: usize,
    pub placeholder: usize,
    pub missing: usize,
}

/// Per-field count of which strategy produced the value.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyTally(BTreeMap<Field, SourceCounts>);

impl StrategyTally {
    pub fn record(&mut self, sources: &[(Field, Source)]) {
        for (field, source) in sources {
            let counts = self.0.entry(*field).or_default();
            match source {
                Source::Marker => counts.marker += 1,
                Source::Proximity => counts.proximity += 1,
                Source::Placeholder => counts.placeholder += 1,
                Source::Missing => counts.missing += 1,
            }
        }
    }

    pub fn get(&self, field: Field) -> SourceCounts {
        self.0.get(&field).copied().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a run reports at the end: succeeded, failed and warned records plus
/// the elapsed time.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub command: &'static str,
    pub succeeded: usize,
    pub failed: usize,
    pub warned: usize,
    pub written: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmatched: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded: Option<usize>,
    #[serde(skip_serializing_if = "StrategyTally::is_empty")]
    pub strategies: StrategyTally,
    /// One line per failed document or rejected row.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    pub elapsed_secs: f64,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn new(command: &'static str) -> Self {
        RunSummary {
            command,
            succeeded: 0,
            failed: 0,
            warned: 0,
            written: 0,
            matched: None,
            unmatched: None,
            excluded: None,
            strategies: StrategyTally::default(),
            failures: Vec::new(),
            elapsed_secs: 0.0,
            finished_at: Utc::now(),
        }
    }

    pub fn from_batch(result: &BatchResult) -> Self {
        RunSummary {
            succeeded: result.records.len(),
            failed: result.failures.len(),
            warned: result.warned,
            written: result.records.len(),
            strategies: result.tally.clone(),
            failures: result
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.id, f.error))
                .collect(),
            ..RunSummary::new("extract")
        }
    }

    pub fn from_enrich(report: &EnrichReport) -> Self {
        RunSummary {
            succeeded: report.input_rows - report.rejected.len(),
            failed: report.rejected.len(),
            warned: report.warned,
            written: report.written,
            matched: Some(report.matched),
            unmatched: Some(report.unmatched.len()),
            failures: report.rejected.iter().map(ToString::to_string).collect(),
            excluded: Some(report.below_min_holes),
            ..RunSummary::new("enrich")
        }
    }

    pub fn finish(mut self, elapsed: Duration) -> Self {
        self.elapsed_secs = elapsed.as_secs_f64();
        self.finished_at = Utc::now();
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{}: {} succeeded, {} failed, {} warned, {} written",
            self.command, self.succeeded, self.failed, self.warned, self.written
        );
        if let Some(n) = self.matched {
            out.push_str(&format!("\n  matched postal codes: {}", n));
        }
        if let Some(n) = self.unmatched {
            out.push_str(&format!("\n  unmatched postal codes: {}", n));
        }
        if let Some(n) = self.excluded {
            out.push_str(&format!("\n  excluded below hole minimum: {}", n));
        }
        for (field, c) in &self.strategies.0 {
            out.push_str(&format!(
                "\n  {:<10} marker={} proximity={} placeholder={} missing={}",
                field.to_string(),
                c.marker,
                c.proximity,
                c.placeholder,
                c.missing
            ));
        }
        for failure in &self.failures {
            out.push_str(&format!("\n  failed {}", failure));
        }
        out.push_str(&format!(
            "\nDone in {}",
            format_duration(Duration::from_secs_f64(self.elapsed_secs))
        ));
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
