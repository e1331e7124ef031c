mod batch;
mod enrich;
mod error;
mod ids;
mod lookup;
mod parser;
mod record;
mod settings;
mod summary;
mod text;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use batch::{BatchOptions, ExtractionWriter};
use enrich::EnrichOptions;
use settings::{MissingFieldPolicy, PostalMatch, Settings};
use summary::RunSummary;

#[derive(Parser)]
#[command(name = "dg_courses", about = "Disc golf course dataset builder")]
struct Cli {
    /// Settings file (default: ./courses.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Print the run summary as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract name, holes and coordinates from saved course pages
    Extract {
        /// Directory of saved *.html pages
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// CSV to append extracted courses to
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Documents to skip, in identifier order
        #[arg(long, default_value = "0")]
        skip: usize,
        /// Max documents to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Drop documents missing a name or hole count, or keep them with placeholders
        #[arg(long, value_enum)]
        on_missing: Option<MissingFieldPolicy>,
        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Attach approximate coordinates by postal code and keep full-size courses
    Enrich {
        /// Course table (Course,City,State/Province,Country,Postal Code,# Holes,Rating)
        #[arg(long)]
        courses: Option<PathBuf>,
        /// Postal code table (zip,lat,lon)
        #[arg(long)]
        postal_codes: Option<PathBuf>,
        /// Dataset to write
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Courses with fewer holes are excluded
        #[arg(long)]
        min_holes: Option<u32>,
        #[arg(long, value_enum)]
        postal_match: Option<PostalMatch>,
    },
    /// Collect course page URLs from saved directory listing pages
    Links {
        /// Saved listing pages
        #[arg(required = true)]
        listings: Vec<PathBuf>,
        #[arg(short, long, default_value = "data/course_urls.csv")]
        output: PathBuf,
        /// Prefix for the relative course paths
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Add an ID column to the dataset (the previous file is kept as <file>.backup)
    Ids {
        /// Dataset file (default: dataset_output from settings)
        path: Option<PathBuf>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let summary = match cli.command {
        Commands::Extract {
            dir,
            output,
            skip,
            limit,
            on_missing,
            no_progress,
        } => {
            let dir = dir.unwrap_or(settings.documents_dir);
            let output = output.unwrap_or(settings.extraction_output);
            let opts = BatchOptions {
                on_missing: on_missing.unwrap_or(settings.on_missing_required),
                skip,
                limit,
                progress: settings.progress && !no_progress,
            };
            let documents = batch::collect_documents(&dir)?;
            let mut writer = ExtractionWriter::open(&output)?;
            let result = batch::analyze_all(&documents, &opts, &mut writer)?;
            RunSummary {
                written: writer.written(),
                ..RunSummary::from_batch(&result)
            }
        }
        Commands::Enrich {
            courses,
            postal_codes,
            output,
            min_holes,
            postal_match,
        } => {
            let opts = EnrichOptions {
                courses_input: courses.unwrap_or(settings.courses_input),
                postal_codes: postal_codes.unwrap_or(settings.postal_codes),
                dataset_output: output.unwrap_or(settings.dataset_output),
                min_holes: min_holes.unwrap_or(settings.min_holes),
                postal_match: postal_match.unwrap_or(settings.postal_match),
            };
            let report = enrich::run(&opts)?;
            RunSummary::from_enrich(&report)
        }
        Commands::Links {
            listings,
            output,
            base_url,
        } => {
            let base_url = base_url.unwrap_or(settings.listing_base_url);
            let written = write_course_urls(&listings, &output, &base_url)?;
            RunSummary {
                succeeded: listings.len(),
                written,
                ..RunSummary::new("links")
            }
        }
        Commands::Ids { path } => {
            let path = path.unwrap_or(settings.dataset_output);
            let written = ids::add_course_ids(&path)?;
            RunSummary {
                succeeded: written,
                written,
                ..RunSummary::new("ids")
            }
        }
    };

    let summary = summary.finish(t0.elapsed());
    if cli.json {
        println!("{}", summary.to_json()?);
    } else {
        println!("{}", summary.render());
    }
    Ok(())
}

/// Reads every listing page, writes the sorted unique course URLs one per line.
fn write_course_urls(listings: &[PathBuf], output: &Path, base_url: &str) -> Result<usize> {
    let pages = listings
        .iter()
        .map(|p| {
            fs::read(p)
                .map(text::decode_text)
                .with_context(|| format!("Failed to read listing {}", p.display()))
        })
        .collect::<Result<Vec<String>>>()?;
    let urls = parser::links::course_urls(pages.iter().map(String::as_str), base_url);

    let mut file = fs::File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    for url in &urls {
        writeln!(file, "{}", url)?;
    }
    file.flush()?;
    info!("Wrote {} course URLs to {}", urls.len(), output.display());
    Ok(urls.len())
}
