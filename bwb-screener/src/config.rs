//! Screener configuration loaded from TOML.
//!
//! Every field has a default, so a file only needs the values it changes:
//!
//! ```toml
//! top = 10
//!
//! [filter]
//! min_credit = 0.75
//! max_dte = 14
//!
//! [rank]
//! sort_by = "credit"
//! ascending = false
//! ```

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::analytics::{
    BrokenWingButterfly, EngineError, EngineResult, FilterCriteria, RankOptions, RankedSpread,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] EngineError),
}

/// Filter thresholds, ranking order and output size for a screening run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenerConfig {
    /// Keep only the best N ranked spreads per expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,

    pub filter: FilterCriteria,

    pub rank: RankOptions,
}

impl ScreenerConfig {
    /// Read and validate a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML content.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.filter.validate()
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Screen one expiry, or every expiry listed for the ticker when `expiry`
    /// is `None`.
    ///
    /// Rows are grouped by expiry in date order and ranked within each group;
    /// `top` keeps the best N of every group.
    pub fn screen(
        &self,
        screener: &BrokenWingButterfly,
        ticker: &str,
        expiry: Option<NaiveDate>,
    ) -> EngineResult<Vec<RankedSpread>> {
        if ticker.trim().is_empty() {
            return Err(EngineError::BlankTicker);
        }

        let expiries = match expiry {
            Some(date) => vec![date],
            None => screener.table().expiries(ticker),
        };

        let mut results = Vec::new();
        for expiry in expiries {
            let mut ranked = screener.screen(ticker, expiry, &self.filter, &self.rank)?;
            if let Some(n) = self.top {
                ranked.truncate(n);
            }
            info!("{} {}: {} ranked spreads", ticker, expiry, ranked.len());
            results.extend(ranked);
        }

        Ok(results)
    }
}
