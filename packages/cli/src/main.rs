#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the address matching tools.
//!
//! Uses `indicatif-log-bridge` (via [`address_match_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use address_match::config::load_config;
use address_match::dictionary::NameOutcome;
use address_match::{AddressStore, CorrectionRequest, Corrector, CorrectorConfig};
use address_match_cli::tune;
use address_match_cli_utils::IndicatifProgress;
use address_match_index::{BuildConfig, build_store, csv_source, default_index_dir};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "address_match", about = "Fuzzy address correction tools")]
struct Cli {
    /// Store directory (defaults to `ADDRESS_MATCH_INDEX_DIR`, then
    /// `data/address_index`)
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// TOML engine configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the store from a CSV file or a directory of CSV files
    Build {
        /// CSV file or directory
        input: PathBuf,
        /// Writer memory budget in megabytes
        #[arg(long, default_value = "64")]
        heap_mb: usize,
    },
    /// Rank records for a free-text address
    Search {
        /// Address to search for
        query: String,
        /// Maximum number of results
        #[arg(long, default_value = "5")]
        limit: usize,
        /// Print candidates as JSON
        #[arg(long)]
        json: bool,
    },
    /// Handle a correction request and print the JSON response
    Correct {
        /// Address to correct
        address: String,
        /// Maximum suggestions (5 when not positive)
        #[arg(long, default_value = "5")]
        max_suggestions: i32,
        /// Minimum suggestion score (0.5 when not positive)
        #[arg(long, default_value = "0.5")]
        min_similarity: f64,
        /// Only return exact and fuzzy matches
        #[arg(long)]
        strict: bool,
        /// Do not try normalized variants of the address
        #[arg(long)]
        no_normalization: bool,
    },
    /// Correct a bare street name
    Street {
        /// Street name
        name: String,
        /// Maximum number of matches
        #[arg(long, default_value = "5")]
        limit: usize,
        /// Minimum similarity
        #[arg(long, default_value = "0.6")]
        min_similarity: f64,
    },
    /// Correct a bare city name
    City {
        /// City name
        name: String,
        /// Maximum number of matches
        #[arg(long, default_value = "5")]
        limit: usize,
        /// Minimum similarity
        #[arg(long, default_value = "0.6")]
        min_similarity: f64,
    },
    /// Print store health as JSON
    Health,
    /// Grid-search ranking weights over a corpus of tuning cases
    Tune {
        /// Cases file (defaults to the bundled corpus)
        #[arg(long)]
        cases: Option<PathBuf>,
        /// Number of weight triples to print
        #[arg(long, default_value = "10")]
        top: usize,
    },
}

fn open_corrector(
    index_dir: &Path,
    config: Option<&Path>,
) -> Result<Corrector, Box<dyn std::error::Error>> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => CorrectorConfig::default(),
    };
    let store = AddressStore::open(index_dir)?;
    Ok(Corrector::new(store, config, None)?)
}

fn print_names(outcome: &NameOutcome) {
    if outcome.matches.is_empty() {
        println!("No matches ({} entries scanned)", outcome.scanned);
        return;
    }
    for m in &outcome.matches {
        println!(
            "{:.3}  {:<40} similarity={:.3} usage={} tier={:?}",
            m.blended, m.display_name, m.similarity, m.usage_count, m.tier
        );
    }
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = address_match_cli_utils::init_logger();
    let cli = Cli::parse();

    let index_dir = cli.index_dir.unwrap_or_else(default_index_dir);
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Build { input, heap_mb } => {
            let records = csv_source::load_records(&input)?;
            log::info!("Loaded {} records from {}", records.len(), input.display());

            let progress = IndicatifProgress::records_bar(&multi, "Indexing records");
            let stats = build_store(
                &index_dir,
                records,
                BuildConfig {
                    writer_heap_bytes: heap_mb.saturating_mul(1024 * 1024),
                },
                progress,
            )
            .await?;

            println!(
                "Built {}: {} records, {} streets, {} cities in {:.1}s",
                index_dir.display(),
                stats.records,
                stats.streets,
                stats.cities,
                stats.build_time_secs
            );
        }
        Commands::Search { query, limit, json } => {
            let corrector = open_corrector(&index_dir, config)?;
            let outcome = corrector.search(&query, limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.candidates)?);
            } else {
                println!(
                    "Components: {:?} ({:?}{})",
                    outcome.components,
                    outcome.parse_method,
                    if outcome.escalated { ", escalated" } else { "" }
                );
                for c in &outcome.candidates {
                    println!(
                        "{:.3}  {:<50} sim={:.3} comp={:.3} rel={:.3} {:?}",
                        c.final_score,
                        c.record.full_address,
                        c.similarity,
                        c.component_score,
                        c.relevance_score,
                        c.tier
                    );
                }
            }
        }
        Commands::Correct {
            address,
            max_suggestions,
            min_similarity,
            strict,
            no_normalization,
        } => {
            let corrector = Arc::new(open_corrector(&index_dir, config)?);
            let mut request = CorrectionRequest::new(address);
            request.max_suggestions = max_suggestions;
            request.min_similarity = min_similarity;
            request.options.strict_mode = strict;
            request.options.enable_normalization = !no_normalization;

            let response = corrector.handle_async(request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Street {
            name,
            limit,
            min_similarity,
        } => {
            let corrector = open_corrector(&index_dir, config)?;
            print_names(&corrector.correct_street(&name, limit, min_similarity)?);
        }
        Commands::City {
            name,
            limit,
            min_similarity,
        } => {
            let corrector = open_corrector(&index_dir, config)?;
            print_names(&corrector.correct_city(&name, limit, min_similarity)?);
        }
        Commands::Health => {
            let corrector = open_corrector(&index_dir, config)?;
            println!("{}", serde_json::to_string_pretty(&corrector.health())?);
        }
        Commands::Tune { cases, top } => {
            let corrector = open_corrector(&index_dir, config)?;
            let cases = tune::load_cases(cases.as_deref())?;
            log::info!("Collecting signals for {} tuning cases", cases.len());

            let signals = tune::collect_signals(&corrector, cases)?;
            let progress = IndicatifProgress::steps_bar(
                &multi,
                "Evaluating weights",
                tune::weight_grid().len() as u64,
            );
            let results = tune::run_grid(&signals, &progress);

            println!("{:>5} {:>5} {:>5}  {:>7}  MEAN TOP", "SIM", "COMP", "REL", "PASS");
            println!("{}", "-".repeat(40));
            for result in results.iter().take(top) {
                println!(
                    "{:>5.1} {:>5.1} {:>5.1}  {:>3}/{:<3}  {:.3}",
                    result.weights.similarity,
                    result.weights.component,
                    result.weights.relevance,
                    result.passed,
                    result.total,
                    result.mean_top_score
                );
            }
        }
    }

    Ok(())
}
