//! Command line options and dashboard defaults.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use thiserror::Error;

use crate::data::filter::ExtremeThresholds;
use crate::data::loader::LoaderOptions;

/// Source loaded when no path is given.
pub const DEFAULT_DATA_PATH: &str = "data/df6.json";
/// Markets pre-selected in the time series views.
pub const DEFAULT_MARKETS: [&str; 3] = ["Gold", "Silver", "Copper"];
/// Upper bound of the lookback slider, in weeks.
pub const MAX_LOOKBACK_WEEKS: u32 = 260;
/// Delay between frames while the bubble chart is playing.
pub const PLAYBACK_STEP_MS: u64 = 500;

pub const WINDOW_SIZE: [f32; 2] = [1400.0, 900.0];
pub const WINDOW_MIN_SIZE: [f32; 2] = [800.0, 500.0];

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// COT table to load (.json, .csv, .parquet, .html, .ipynb)
    #[arg(default_value = DEFAULT_DATA_PATH)]
    pub data: PathBuf,

    /// Bubble chart lookback in weeks (0 = everything up to the selected date)
    #[arg(long, default_value_t = 0)]
    pub lookback_weeks: u32,

    /// Index reading at or above which a market counts as crowded
    #[arg(long, default_value_t = ExtremeThresholds::default().high)]
    pub extreme_high: f64,

    /// Index reading at or below which a market counts as crowded
    #[arg(long, default_value_t = ExtremeThresholds::default().low)]
    pub extreme_low: f64,

    /// Markets selected at startup, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_MARKETS.map(String::from))]
    pub markets: Vec<String>,

    /// Report date stamped on HTML snapshots without a date column (YYYY-MM-DD)
    #[arg(long)]
    pub snapshot_date: Option<String>,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("extreme thresholds must satisfy low < high (got low {low}, high {high})")]
    ThresholdOrder { low: f64, high: f64 },
    #[error("invalid --snapshot-date '{0}', expected YYYY-MM-DD")]
    SnapshotDate(String),
    #[error("lookback of {0} weeks exceeds the maximum of {max}", max = MAX_LOOKBACK_WEEKS)]
    Lookback(u32),
}

/// Validated dashboard settings.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub lookback_weeks: u32,
    pub thresholds: ExtremeThresholds,
    pub default_markets: Vec<String>,
    pub loader: LoaderOptions,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            lookback_weeks: 0,
            thresholds: ExtremeThresholds::default(),
            default_markets: DEFAULT_MARKETS.map(String::from).to_vec(),
            loader: LoaderOptions::default(),
        }
    }
}

impl TryFrom<Cli> for DashboardConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if !(cli.extreme_low < cli.extreme_high) {
            return Err(ConfigError::ThresholdOrder {
                low: cli.extreme_low,
                high: cli.extreme_high,
            });
        }
        if cli.lookback_weeks > MAX_LOOKBACK_WEEKS {
            return Err(ConfigError::Lookback(cli.lookback_weeks));
        }
        let snapshot_date = cli
            .snapshot_date
            .map(|s| {
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map_err(|_| ConfigError::SnapshotDate(s.clone()))
            })
            .transpose()?;

        Ok(DashboardConfig {
            data_path: cli.data,
            lookback_weeks: cli.lookback_weeks,
            thresholds: ExtremeThresholds {
                high: cli.extreme_high,
                low: cli.extreme_low,
            },
            default_markets: cli
                .markets
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            loader: LoaderOptions { snapshot_date },
        })
    }
}
