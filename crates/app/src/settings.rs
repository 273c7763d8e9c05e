//! Settings of the intranet host, read from `settings.toml`.
//!
//! Every key can be overridden with an `INTRANET__<SECTION>__<KEY>`
//! environment variable and the most common ones on the command line.
use chrono::NaiveDate;
use clap::Parser;
use serde::Deserialize;

use crate::error::Result;

const DEFAULT_SETTINGS_PATH: &str = "settings";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Calculation {
    /// Defaults to today when missing.
    pub status_date: Option<NaiveDate>,
    pub top_warnings: usize,
}

impl Default for Calculation {
    fn default() -> Self {
        Self {
            status_date: None,
            top_warnings: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub path: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            path: "demos/ledger.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub calculation: Calculation,
    pub ledger: Ledger,
}

#[derive(Debug, Parser)]
#[command(name = "intranet")]
#[command(about = "Calculates an accounting ledger and reports its posting warnings")]
struct Args {
    /// Settings file without extension (TOML, JSON or YAML).
    #[arg(long, env = "INTRANET_SETTINGS")]
    settings: Option<String>,
    /// Ledger file to calculate.
    #[arg(long)]
    ledger: Option<String>,
    /// Status date (YYYY-MM-DD) the ledger is calculated as of.
    #[arg(long, env = "INTRANET_STATUS_DATE")]
    status_date: Option<NaiveDate>,
    /// How many warnings to print.
    #[arg(long)]
    top_warnings: Option<usize>,
}

impl Settings {
    pub fn new() -> Result<Self> {
        let args = Args::parse();

        let path = args.settings.as_deref().unwrap_or(DEFAULT_SETTINGS_PATH);
        let mut settings: Settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("INTRANET").separator("__"))
            .build()?
            .try_deserialize()?;

        if let Some(ledger) = args.ledger {
            settings.ledger.path = ledger;
        }
        if let Some(status_date) = args.status_date {
            settings.calculation.status_date = Some(status_date);
        }
        if let Some(top_warnings) = args.top_warnings {
            settings.calculation.top_warnings = top_warnings;
        }

        Ok(settings)
    }
}
