//! Core data types for options chain screening.
//!
//! A loaded chain is an immutable [`OptionsTable`] of [`OptionQuote`] rows.
//! Quotes are only ever built by the loader after validation, or directly by
//! callers that already hold clean data.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Parse an already-normalized type value. Only `call` and `put` are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "call" => Some(Self::Call),
            "put" => Some(Self::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validated option quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Underlying symbol, uppercase (e.g., "AAPL")
    pub symbol: String,

    /// Option expiration date
    pub expiry: NaiveDate,

    /// Days to expiration
    pub dte: i32,

    /// Strike price
    pub strike: Decimal,

    /// Option type (call or put)
    #[serde(rename = "type")]
    pub option_type: OptionType,

    /// Bid price
    pub bid: Decimal,

    /// Ask price
    pub ask: Decimal,

    /// Mid price, within a cent of (bid + ask) / 2
    pub mid: Decimal,

    /// Delta in [0, 1]
    pub delta: f64,

    /// Implied volatility
    pub iv: f64,
}

impl OptionQuote {
    pub fn is_call(&self) -> bool {
        self.option_type == OptionType::Call
    }
}

/// An immutable, validated table of option quotes.
///
/// Row order is the order of the source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsTable {
    quotes: Vec<OptionQuote>,
}

impl OptionsTable {
    /// Wrap quotes that already satisfy the loader's invariants.
    pub fn from_quotes(quotes: Vec<OptionQuote>) -> Self {
        Self { quotes }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionQuote> {
        self.quotes.iter()
    }

    pub fn quotes(&self) -> &[OptionQuote] {
        &self.quotes
    }

    /// Distinct symbols, sorted.
    pub fn symbols(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.quotes.iter().map(|q| q.symbol.as_str()).collect();
        set.into_iter().collect()
    }

    /// Distinct expiries listed for a symbol, sorted ascending.
    pub fn expiries(&self, symbol: &str) -> Vec<NaiveDate> {
        let set: BTreeSet<NaiveDate> = self
            .quotes
            .iter()
            .filter(|q| q.symbol == symbol)
            .map(|q| q.expiry)
            .collect();
        set.into_iter().collect()
    }

    /// Call quotes for one (symbol, expiry) slice, in table order.
    pub fn calls_for(&self, symbol: &str, expiry: NaiveDate) -> Vec<&OptionQuote> {
        self.quotes
            .iter()
            .filter(|q| q.symbol == symbol && q.expiry == expiry && q.is_call())
            .collect()
    }

    /// Row counts and expiries per symbol.
    pub fn summary(&self) -> TableSummary {
        let mut expiries: BTreeMap<String, BTreeSet<NaiveDate>> = BTreeMap::new();
        let mut calls = 0;
        let mut puts = 0;

        for quote in &self.quotes {
            match quote.option_type {
                OptionType::Call => calls += 1,
                OptionType::Put => puts += 1,
            }
            expiries
                .entry(quote.symbol.clone())
                .or_default()
                .insert(quote.expiry);
        }

        TableSummary {
            rows: self.quotes.len(),
            calls,
            puts,
            expiries: expiries
                .into_iter()
                .map(|(symbol, dates)| (symbol, dates.into_iter().collect()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a OptionsTable {
    type Item = &'a OptionQuote;
    type IntoIter = std::slice::Iter<'a, OptionQuote>;

    fn into_iter(self) -> Self::IntoIter {
        self.quotes.iter()
    }
}

/// Overview of a loaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub rows: usize,
    pub calls: usize,
    pub puts: usize,
    /// Sorted expiries per symbol
    pub expiries: BTreeMap<String, Vec<NaiveDate>>,
}
