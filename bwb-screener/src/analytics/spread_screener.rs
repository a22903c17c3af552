//! Broken-wing butterfly call spread screening.
//!
//! Structure (all calls, one expiry):
//! - Long 1 at K1
//! - Short 2 at K2
//! - Long 1 at K3
//!
//! with K1 < K2 < K3 and (K2 - K1) != (K3 - K2). Symmetric butterflies are
//! excluded. Cost = P(K1) - 2 * P(K2) + P(K3) on mid prices; a negative cost
//! is a net credit.
//!
//! Screening runs in three steps, each returning a fresh table:
//! generate -> filter -> rank.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::ranking::{self, RankOptions, RankedSpread};
use crate::data::{OptionQuote, OptionsTable};

/// Slack on the credit threshold so a computed credit of 0.4999999999 still
/// meets a 0.50 minimum.
pub const CREDIT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Options table is empty")]
    EmptyTable,

    #[error("Ticker must be a non-empty string")]
    BlankTicker,

    #[error("Invalid {name} range: min {min} exceeds max {max}")]
    InvalidRange {
        name: &'static str,
        min: String,
        max: String,
    },

    #[error("Negative wing width in spread {k1}/{k2}/{k3}")]
    NegativeWidth { k1: Decimal, k2: Decimal, k3: Decimal },

    #[error("Arithmetic overflow pricing spread {k1}/{k2}/{k3}")]
    Overflow { k1: Decimal, k2: Decimal, k3: Decimal },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Thresholds for keeping a candidate spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterCriteria {
    /// Minimum net credit (credit = -cost).
    #[serde(with = "rust_decimal::serde::float")]
    pub min_credit: Decimal,
    /// Minimum days to expiration.
    pub min_dte: i32,
    /// Maximum days to expiration.
    pub max_dte: i32,
    /// Minimum delta of the short (K2) strike.
    pub min_short_delta: f64,
    /// Maximum delta of the short (K2) strike.
    pub max_short_delta: f64,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            min_credit: Decimal::new(50, 2),
            min_dte: 1,
            max_dte: 10,
            min_short_delta: 0.20,
            max_short_delta: 0.35,
        }
    }
}

impl FilterCriteria {
    /// Reject inverted DTE or delta ranges.
    pub fn validate(&self) -> EngineResult<()> {
        if self.min_dte > self.max_dte {
            return Err(EngineError::InvalidRange {
                name: "dte",
                min: self.min_dte.to_string(),
                max: self.max_dte.to_string(),
            });
        }
        if self.min_short_delta > self.max_short_delta {
            return Err(EngineError::InvalidRange {
                name: "short delta",
                min: self.min_short_delta.to_string(),
                max: self.max_short_delta.to_string(),
            });
        }
        Ok(())
    }

    /// Check a single spread against the thresholds.
    pub fn accepts(&self, spread: &CandidateSpread) -> bool {
        let dte_ok = spread.dte >= self.min_dte && spread.dte <= self.max_dte;
        let delta_ok =
            spread.delta_k2 >= self.min_short_delta && spread.delta_k2 <= self.max_short_delta;
        // A threshold past Decimal::MAX admits every cost
        let credit_ok = (-self.min_credit)
            .checked_add(CREDIT_EPSILON)
            .map_or(true, |max_cost| spread.cost <= max_cost);
        dte_ok && delta_ok && credit_ok
    }
}

/// A generated broken-wing butterfly before filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpread {
    /// Underlying ticker.
    pub symbol: String,
    /// Expiration date.
    pub expiry: NaiveDate,
    /// Days to expiration.
    pub dte: i32,
    /// Lower long strike.
    #[serde(with = "rust_decimal::serde::float")]
    pub k1: Decimal,
    /// Short strike (sold twice).
    #[serde(with = "rust_decimal::serde::float")]
    pub k2: Decimal,
    /// Upper long strike.
    #[serde(with = "rust_decimal::serde::float")]
    pub k3: Decimal,
    /// K2 - K1.
    #[serde(with = "rust_decimal::serde::float")]
    pub width1: Decimal,
    /// K3 - K2.
    #[serde(with = "rust_decimal::serde::float")]
    pub width2: Decimal,
    /// P(K1) - 2 * P(K2) + P(K3). Negative means net credit.
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_k1: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_k2: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_k3: Decimal,
    /// Delta of the short strike.
    pub delta_k2: f64,
}

impl CandidateSpread {
    /// Net credit received (negative for a debit).
    pub fn credit(&self) -> Decimal {
        -self.cost
    }

    pub fn is_broken_wing(&self) -> bool {
        self.width1 != self.width2
    }
}

/// Screener for broken-wing butterfly call spreads over one options table.
///
/// The table is never mutated, so one screener can serve concurrent readers.
#[derive(Debug, Clone)]
pub struct BrokenWingButterfly {
    table: OptionsTable,
}

impl BrokenWingButterfly {
    /// Create a screener. Fails if the table has no rows.
    pub fn new(table: OptionsTable) -> EngineResult<Self> {
        if table.is_empty() {
            return Err(EngineError::EmptyTable);
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &OptionsTable {
        &self.table
    }

    /// Generate every broken-wing call spread for one ticker and expiry.
    ///
    /// The ticker is matched exactly against the normalized (uppercase)
    /// symbols. An empty slice or fewer than three distinct strikes yields an
    /// empty result.
    pub fn generate_call_spreads(
        &self,
        ticker: &str,
        expiry: NaiveDate,
    ) -> EngineResult<Vec<CandidateSpread>> {
        if ticker.trim().is_empty() {
            return Err(EngineError::BlankTicker);
        }

        let mut legs = self.table.calls_for(ticker, expiry);
        if legs.is_empty() {
            warn!("No call options found for {} expiring on {}", ticker, expiry);
            return Ok(Vec::new());
        }

        // Stable sort, so the first quote listed at a duplicated strike wins
        legs.sort_by(|a, b| a.strike.cmp(&b.strike));
        legs.dedup_by(|later, first| later.strike == first.strike);

        let dte = legs[0].dte;
        let mut spreads = Vec::new();

        for (i, low) in legs.iter().enumerate() {
            for (j, body) in legs.iter().enumerate().skip(i + 1) {
                for high in legs.iter().skip(j + 1) {
                    if let Some(spread) = build_spread(ticker, expiry, dte, low, body, high)? {
                        spreads.push(spread);
                    }
                }
            }
        }

        info!(
            "Generated {} BWB spreads for {} on {} from {} strikes",
            spreads.len(),
            ticker,
            expiry,
            legs.len()
        );

        Ok(spreads)
    }

    /// Keep spreads meeting the DTE, short-delta and minimum-credit thresholds.
    ///
    /// Survivors keep their input order.
    pub fn filter_spreads(
        &self,
        spreads: &[CandidateSpread],
        criteria: &FilterCriteria,
    ) -> EngineResult<Vec<CandidateSpread>> {
        criteria.validate()?;

        if spreads.is_empty() {
            return Ok(Vec::new());
        }

        let filtered: Vec<CandidateSpread> = spreads
            .iter()
            .filter(|s| criteria.accepts(s))
            .cloned()
            .collect();

        info!("Filtered spreads from {} to {}", spreads.len(), filtered.len());

        Ok(filtered)
    }

    /// Score and sort spreads. See [`ranking::rank_spreads`].
    pub fn rank_spreads(
        &self,
        spreads: &[CandidateSpread],
        options: &RankOptions,
    ) -> EngineResult<Vec<RankedSpread>> {
        ranking::rank_spreads(spreads, options)
    }

    /// Generate, filter and rank in one call.
    pub fn screen(
        &self,
        ticker: &str,
        expiry: NaiveDate,
        criteria: &FilterCriteria,
        options: &RankOptions,
    ) -> EngineResult<Vec<RankedSpread>> {
        let candidates = self.generate_call_spreads(ticker, expiry)?;
        let filtered = self.filter_spreads(&candidates, criteria)?;
        self.rank_spreads(&filtered, options)
    }
}

/// Build the spread for one ordered strike triple, or `None` when the wings
/// are symmetric.
fn build_spread(
    symbol: &str,
    expiry: NaiveDate,
    dte: i32,
    low: &OptionQuote,
    body: &OptionQuote,
    high: &OptionQuote,
) -> EngineResult<Option<CandidateSpread>> {
    let overflow = || EngineError::Overflow {
        k1: low.strike,
        k2: body.strike,
        k3: high.strike,
    };

    let width1 = body.strike.checked_sub(low.strike).ok_or_else(overflow)?;
    let width2 = high.strike.checked_sub(body.strike).ok_or_else(overflow)?;
    if width1 == width2 {
        return Ok(None);
    }

    // (P1 - P2) - (P2 - P3) never doubles a price before subtracting
    let cost = low
        .mid
        .checked_sub(body.mid)
        .zip(body.mid.checked_sub(high.mid))
        .and_then(|(lower, upper)| lower.checked_sub(upper))
        .ok_or_else(overflow)?;

    Ok(Some(CandidateSpread {
        symbol: symbol.to_string(),
        expiry,
        dte,
        k1: low.strike,
        k2: body.strike,
        k3: high.strike,
        width1,
        width2,
        cost,
        price_k1: low.mid,
        price_k2: body.mid,
        price_k3: high.mid,
        delta_k2: body.delta,
    }))
}
