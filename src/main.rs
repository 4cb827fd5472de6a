//! Bindset: build and update train/test datasets for binary classifiers
//!
//! Each `preprocess` run adds the samples of one category to the
//! `train.bin` / `test.bin` pair of a model directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::LevelFilter;

use bindset::persistence::{MoveDirection, RebalanceReport, StoreSummary};
use bindset::pipeline::config::{DEFAULT_FEATURES, DEFAULT_SPLIT};
use bindset::pipeline::{
    inspect, run_preprocess, run_rebalance, DatasetSummary, PreprocessConfig, PreprocessReport,
};

#[derive(Parser)]
#[command(name = "bindset")]
#[command(author, version, about = "Incremental train/test dataset builder for opcode and raw-byte classifiers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add the samples of one category to the dataset
    Preprocess {
        /// Directory with the category's sample files
        #[arg(required_unless_present = "config")]
        input_dir: Option<PathBuf>,

        /// Category id of the samples
        #[arg(short, long, required_unless_present = "config")]
        category: Option<u32>,

        /// Directory holding train.bin and test.bin
        #[arg(short, long, required_unless_present = "config")]
        model_dir: Option<PathBuf>,

        /// Read opcode traces (.txt) instead of raw binaries (.bin)
        #[arg(short, long)]
        function: bool,

        /// Bytes per example
        #[arg(long, default_value_t = DEFAULT_FEATURES)]
        features: usize,

        /// Fraction of examples routed to training
        #[arg(short, long, default_value_t = DEFAULT_SPLIT)]
        split: f64,

        /// Load the run configuration from a JSON file instead
        #[arg(long, conflicts_with_all = ["input_dir", "category", "model_dir"])]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Rebalance an existing dataset without adding samples
    Rebalance {
        /// Directory holding train.bin and test.bin
        #[arg(required = true)]
        model_dir: PathBuf,

        /// Fraction of examples kept in training
        #[arg(short, long, default_value_t = DEFAULT_SPLIT)]
        split: f64,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show schema and per-category counts of a dataset
    Info {
        /// Directory holding train.bin and test.bin
        #[arg(required = true)]
        model_dir: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Preprocess {
            input_dir,
            category,
            model_dir,
            function,
            features,
            split,
            config,
            format,
        } => {
            let config = match config {
                Some(path) => PreprocessConfig::load_json(&path)?,
                None => PreprocessConfig {
                    input_dir: input_dir.context("missing input directory")?,
                    category: category.context("missing category")?,
                    model_dir: model_dir.context("missing model directory")?,
                    function,
                    features,
                    split,
                },
            };
            preprocess(&config, format)
        }

        Commands::Rebalance {
            model_dir,
            split,
            format,
        } => rebalance(&model_dir, split, format),

        Commands::Info { model_dir, format } => show_info(&model_dir, format),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    if let Some(level) = cli_level(verbose, quiet) {
        builder.filter_level(level);
    }
    let _ = builder.try_init();
}

/// Level forced by `-v`/`-q`; `None` leaves `RUST_LOG` in charge
fn cli_level(verbose: u8, quiet: bool) -> Option<LevelFilter> {
    if quiet {
        return Some(LevelFilter::Warn);
    }
    match verbose {
        0 => None,
        1 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    }
}

/// Add one category's samples and print the run report
fn preprocess(config: &PreprocessConfig, format: OutputFormat) -> Result<()> {
    let report = run_preprocess(config)
        .with_context(|| format!("preprocessing category {} failed", config.category))?;

    match format {
        OutputFormat::Text => print!("{}", format_report_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// Rebalance an existing pair of stores
fn rebalance(model_dir: &PathBuf, split: f64, format: OutputFormat) -> Result<()> {
    let report = run_rebalance(model_dir, split)
        .with_context(|| format!("rebalancing {:?} failed", model_dir))?;

    match format {
        OutputFormat::Text => print!("{}", format_moves_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// Show dataset information
fn show_info(model_dir: &PathBuf, format: OutputFormat) -> Result<()> {
    let summary = inspect(model_dir)?;

    match format {
        OutputFormat::Text => print!("{}", format_summary_text(&summary)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

fn format_report_text(report: &PreprocessReport) -> String {
    let mut out = String::new();

    out.push_str("Bindset Preprocess Report\n");
    out.push_str("=========================\n");
    out.push_str(&format!("Category: {}\n", report.category));
    out.push_str(&format!("Files read: {}\n", report.files));
    out.push_str(&format!("Samples: {}\n", report.samples));
    out.push_str(&format!("Examples: {}\n", report.examples));
    out.push_str(&format!(
        "New split: {} train / {} test\n",
        report.new_train, report.new_test
    ));
    out.push_str(&format!(
        "Stored: {} train / {} test\n",
        report.train_count, report.test_count
    ));
    out.push('\n');
    out.push_str(&format_moves_text(&report.rebalance));

    out
}

fn format_moves_text(report: &RebalanceReport) -> String {
    let mut out = String::new();

    if report.is_noop() {
        out.push_str("Rebalance: no examples moved\n");
        return out;
    }

    out.push_str(&format!("Rebalance: {} examples moved\n", report.moved()));
    for entry in &report.moves {
        let direction = match entry.direction {
            MoveDirection::ToThis => "test -> train",
            MoveDirection::ToOther => "train -> test",
        };
        out.push_str(&format!(
            "  category {}: {} ({})\n",
            entry.category, entry.count, direction
        ));
    }

    out
}

fn format_summary_text(summary: &DatasetSummary) -> String {
    let mut out = String::new();

    out.push_str("Bindset Dataset Information\n");
    out.push_str("===========================\n");
    for (name, store) in [("Train", &summary.train), ("Test", &summary.test)] {
        out.push('\n');
        match store {
            Some(store) => out.push_str(&format_store_text(name, store)),
            None => out.push_str(&format!("{}: not created yet\n", name)),
        }
    }

    out
}

fn format_store_text(name: &str, store: &StoreSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("{}: {:?}\n", name, store.path));
    if let Some(schema) = store.schema {
        out.push_str(&format!("  Schema: {}\n", schema));
    }
    if let Some(updated_at) = store.updated_at {
        out.push_str(&format!("  Updated: {}\n", updated_at));
    }
    out.push_str(&format!("  Examples: {}\n", store.total_examples));
    for (category, count) in &store.categories {
        out.push_str(&format!("  category {}: {}\n", category, count));
    }

    out
}
