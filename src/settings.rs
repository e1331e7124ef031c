use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Settings file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "courses.toml";

/// Prefix of environment overrides, e.g. `COURSES_MIN_HOLES=9`.
pub const ENV_PREFIX: &str = "COURSES";

/// What to do with a document whose name or hole count cannot be found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MissingFieldPolicy {
    /// Count the document as failed.
    #[default]
    Drop,
    /// Keep the record with placeholder values and a warning.
    Placeholder,
}

/// How postal codes are compared against the lookup table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PostalMatch {
    /// Byte-for-byte equality.
    #[default]
    Exact,
    /// All-digit codes are left-padded with zeros to five digits first.
    ZeroPadded,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub documents_dir: PathBuf,
    pub extraction_output: PathBuf,
    pub courses_input: PathBuf,
    pub postal_codes: PathBuf,
    pub dataset_output: PathBuf,
    pub min_holes: u32,
    pub on_missing_required: MissingFieldPolicy,
    pub postal_match: PostalMatch,
    pub progress: bool,
    pub listing_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            documents_dir: PathBuf::from("data/all_courses"),
            extraction_output: PathBuf::from("data/usa_courses_full.csv"),
            courses_input: PathBuf::from("data/disc_golf_usa.csv"),
            postal_codes: PathBuf::from("data/zipcode_lat_lon.csv"),
            dataset_output: PathBuf::from("data/usa_courses.csv"),
            min_holes: 18,
            on_missing_required: MissingFieldPolicy::Drop,
            postal_match: PostalMatch::Exact,
            progress: true,
            listing_base_url: "https://www.pdga.com".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then the settings file, then `COURSES_*` environment values.
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to load settings")?
            .try_deserialize::<Settings>()
            .context("Invalid settings")?;
        Ok(settings)
    }
}
