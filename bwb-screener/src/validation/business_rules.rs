//! Business rules for option quotes.
//!
//! Each rule scans every row and fails on the first rule with offenders,
//! reporting up to five offending values:
//! - delta in [0, 1]
//! - strike > 0
//! - bid, ask, mid >= 0
//! - bid <= ask
//! - |mid - (bid + ask) / 2| <= 0.01
//! - dte >= 0
//! - type is call or put

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::data::QuoteRecord;

/// Allowed distance between the quoted mid and (bid + ask) / 2.
pub const MID_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Offending values listed in an error message.
const MAX_REPORTED: usize = 5;

/// A failed business rule.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct RuleViolation {
    /// Short rule identifier (e.g., "bid_ask")
    pub rule: &'static str,
    pub message: String,
}

impl RuleViolation {
    pub fn new(rule: &'static str, message: String) -> Self {
        Self { rule, message }
    }
}

pub type RuleResult = Result<(), RuleViolation>;

/// Trim and lowercase a raw type value.
pub fn normalize_option_type(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Run every rule in order, stopping at the first violation.
pub fn check_business_rules(records: &[QuoteRecord]) -> RuleResult {
    check_delta_range(records)?;
    check_strike_positive(records)?;
    check_prices_non_negative(records)?;
    check_bid_not_above_ask(records)?;
    check_mid_consistency(records)?;
    check_dte_non_negative(records)?;
    check_option_type(records)?;
    Ok(())
}

fn first_offenders<T, F, V>(records: &[QuoteRecord], predicate: F, value: V) -> Vec<T>
where
    F: Fn(&QuoteRecord) -> bool,
    V: Fn(&QuoteRecord) -> T,
{
    records
        .iter()
        .filter(|r| predicate(*r))
        .take(MAX_REPORTED)
        .map(value)
        .collect()
}

pub fn check_delta_range(records: &[QuoteRecord]) -> RuleResult {
    let invalid = first_offenders(records, |r| !(0.0..=1.0).contains(&r.delta), |r| r.delta);
    if invalid.is_empty() {
        return Ok(());
    }
    Err(RuleViolation::new(
        "delta_range",
        format!("Delta values must be between 0 and 1. Invalid values: {:?}", invalid),
    ))
}

pub fn check_strike_positive(records: &[QuoteRecord]) -> RuleResult {
    let invalid = first_offenders(records, |r| r.strike <= Decimal::ZERO, |r| r.strike);
    if invalid.is_empty() {
        return Ok(());
    }
    Err(RuleViolation::new(
        "strike_positive",
        format!("Strike prices must be positive. Invalid values: {:?}", invalid),
    ))
}

pub fn check_prices_non_negative(records: &[QuoteRecord]) -> RuleResult {
    let columns: [(&str, fn(&QuoteRecord) -> Decimal); 3] = [
        ("bid", |r| r.bid),
        ("ask", |r| r.ask),
        ("mid", |r| r.mid),
    ];

    for (name, price) in columns {
        let invalid = first_offenders(records, |r| price(r) < Decimal::ZERO, price);
        if !invalid.is_empty() {
            return Err(RuleViolation::new(
                "price_non_negative",
                format!("{} prices must be non-negative. Invalid values: {:?}", name, invalid),
            ));
        }
    }
    Ok(())
}

pub fn check_bid_not_above_ask(records: &[QuoteRecord]) -> RuleResult {
    let invalid = first_offenders(records, |r| r.bid > r.ask, |r| (r.bid, r.ask));
    if invalid.is_empty() {
        return Ok(());
    }
    Err(RuleViolation::new(
        "bid_ask",
        format!("Bid price cannot exceed ask price. Invalid (bid, ask) pairs: {:?}", invalid),
    ))
}

/// |mid - (bid + ask) / 2|, or `None` when it leaves the `Decimal` range.
fn mid_deviation(r: &QuoteRecord) -> Option<Decimal> {
    // Halve before adding so prices near Decimal::MAX cannot overflow the sum
    let midpoint = (r.bid / Decimal::TWO).checked_add(r.ask / Decimal::TWO)?;
    r.mid.checked_sub(midpoint).map(|d| d.abs())
}

/// Rows whose deviation cannot be represented count as inconsistent.
pub fn check_mid_consistency(records: &[QuoteRecord]) -> RuleResult {
    let invalid = first_offenders(
        records,
        |r| mid_deviation(r).map_or(true, |d| d > MID_TOLERANCE),
        |r| (r.bid, r.ask, r.mid),
    );
    if invalid.is_empty() {
        return Ok(());
    }
    Err(RuleViolation::new(
        "mid_consistency",
        format!(
            "Mid price should be (bid + ask) / 2. Invalid (bid, ask, mid) rows: {:?}",
            invalid
        ),
    ))
}

pub fn check_dte_non_negative(records: &[QuoteRecord]) -> RuleResult {
    let invalid = first_offenders(records, |r| r.dte < 0, |r| r.dte);
    if invalid.is_empty() {
        return Ok(());
    }
    Err(RuleViolation::new(
        "dte_non_negative",
        format!("DTE must be non-negative. Invalid values: {:?}", invalid),
    ))
}

pub fn check_option_type(records: &[QuoteRecord]) -> RuleResult {
    let invalid: BTreeSet<&str> = records
        .iter()
        .map(|r| r.option_type.as_str())
        .filter(|t| !matches!(normalize_option_type(t).as_str(), "call" | "put"))
        .collect();
    if invalid.is_empty() {
        return Ok(());
    }
    Err(RuleViolation::new(
        "option_type",
        format!("Type must be 'call' or 'put'. Invalid values: {:?}", invalid),
    ))
}
