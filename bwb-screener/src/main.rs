//! Broken-wing butterfly screener CLI.
//!
//! # Usage
//!
//! ```bash
//! # Screen one expiry with default thresholds
//! bwb-screener screen --data chains/aapl.csv --ticker AAPL --expiry 2025-11-15
//!
//! # Screen every listed expiry, thresholds from a config file, CSV output
//! bwb-screener screen --data chains/aapl.csv --ticker AAPL --config config/default.toml --format csv
//!
//! # Check a chain file without screening
//! bwb-screener validate --data chains/aapl.csv
//!
//! # Print the default configuration
//! bwb-screener config > config/default.toml
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use bwb_screener::analytics::{BrokenWingButterfly, SortKey};
use bwb_screener::data::DataLoader;
use bwb_screener::report::{self, OutputFormat};
use bwb_screener::ScreenerConfig;

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "bwb-screener")]
#[command(about = "Screen options chains for broken-wing butterfly call spreads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate, filter and rank spreads for a ticker
    Screen(ScreenArgs),

    /// Load and validate a chain file, then print a summary
    Validate {
        /// Path to the options chain CSV
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Print the default configuration as TOML
    Config,
}

#[derive(Args)]
struct ScreenArgs {
    /// Path to the options chain CSV
    #[arg(short, long)]
    data: PathBuf,

    /// Underlying ticker
    #[arg(short, long)]
    ticker: String,

    /// Expiration date (YYYY-MM-DD); every listed expiry when omitted
    #[arg(short, long)]
    expiry: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Minimum net credit
    #[arg(long)]
    min_credit: Option<Decimal>,

    /// Minimum days to expiration
    #[arg(long)]
    min_dte: Option<i32>,

    /// Maximum days to expiration
    #[arg(long)]
    max_dte: Option<i32>,

    /// Minimum short strike delta
    #[arg(long)]
    min_short_delta: Option<f64>,

    /// Maximum short strike delta
    #[arg(long)]
    max_short_delta: Option<f64>,

    /// Sort column (score, credit, max_profit, max_loss, k1, k2, k3)
    #[arg(long)]
    sort_by: Option<SortKey>,

    /// Sort ascending instead of descending
    #[arg(long)]
    ascending: bool,

    /// Keep only the best N spreads per expiry
    #[arg(long)]
    top: Option<usize>,

    /// Output format (table, csv, json)
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,
}

impl ScreenArgs {
    /// Config file (or defaults) with command-line overrides applied, validated.
    fn resolve_config(&self) -> Result<ScreenerConfig> {
        let mut config = match &self.config {
            Some(path) => ScreenerConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ScreenerConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate().context("Invalid screening thresholds")?;
        Ok(config)
    }

    fn expiry_date(&self) -> Result<Option<NaiveDate>> {
        self.expiry
            .as_deref()
            .map(|e| {
                NaiveDate::parse_from_str(e, "%Y-%m-%d")
                    .with_context(|| format!("Invalid expiry date '{}'", e))
            })
            .transpose()
    }

    /// Command-line flags win over the config file.
    fn apply_overrides(&self, config: &mut ScreenerConfig) {
        if let Some(v) = self.min_credit {
            config.filter.min_credit = v;
        }
        if let Some(v) = self.min_dte {
            config.filter.min_dte = v;
        }
        if let Some(v) = self.max_dte {
            config.filter.max_dte = v;
        }
        if let Some(v) = self.min_short_delta {
            config.filter.min_short_delta = v;
        }
        if let Some(v) = self.max_short_delta {
            config.filter.max_short_delta = v;
        }
        if let Some(v) = self.sort_by {
            config.rank.sort_by = v;
        }
        if self.ascending {
            config.rank.ascending = true;
        }
        if self.top.is_some() {
            config.top = self.top;
        }
    }
}

fn cmd_screen(args: ScreenArgs) -> Result<()> {
    let config = args.resolve_config()?;
    let expiry = args.expiry_date()?;

    let table = DataLoader::new()
        .load_csv(&args.data)
        .with_context(|| format!("Failed to load {}", args.data.display()))?;
    let screener = BrokenWingButterfly::new(table)?;

    // Symbols are uppercase after loading
    let ticker = args.ticker.trim().to_uppercase();

    if expiry.is_none() && screener.table().expiries(&ticker).is_empty() {
        bail!("No options found for ticker {}", ticker);
    }

    let results = config.screen(&screener, &ticker, expiry)?;
    print!("{}", report::render(&results, args.format)?);
    Ok(())
}

fn cmd_validate(data: PathBuf) -> Result<()> {
    let table = DataLoader::new()
        .load_csv(&data)
        .with_context(|| format!("Failed to load {}", data.display()))?;
    let summary = table.summary();

    println!("{}", SEPARATOR);
    println!("{}: OK", data.display());
    println!("{}", SEPARATOR);
    println!("  Rows: {}", summary.rows);
    println!("  Calls: {}", summary.calls);
    println!("  Puts: {}", summary.puts);

    for (symbol, expiries) in &summary.expiries {
        let dates: Vec<String> = expiries.iter().map(|d| d.to_string()).collect();
        println!("  {}: {} expiries ({})", symbol, dates.len(), dates.join(", "));
    }

    Ok(())
}

fn cmd_config() -> Result<()> {
    print!("{}", ScreenerConfig::default().to_toml_string()?);
    Ok(())
}

fn main() -> Result<()> {
    // Logs go to stderr so CSV/JSON output on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bwb_screener=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Screen(args) => cmd_screen(args)?,
        Commands::Validate { data } => cmd_validate(data)?,
        Commands::Config => cmd_config()?,
    }

    Ok(())
}
