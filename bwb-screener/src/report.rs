//! Rendering of ranked spreads as a text table, CSV or JSON.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::RankedSpread;

const SEPARATOR: &str =
    "------------------------------------------------------------------------------------";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output format for ranked spreads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{}' (expected table, csv or json)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Table => "table",
            Self::Csv => "csv",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

/// Render spreads in the given format.
pub fn render(rows: &[RankedSpread], format: OutputFormat) -> Result<String, ReportError> {
    match format {
        OutputFormat::Table => Ok(render_table(rows)),
        OutputFormat::Csv => {
            let mut buf = Vec::new();
            write_csv(rows, &mut buf)?;
            Ok(String::from_utf8(buf)?)
        }
        OutputFormat::Json => Ok(to_json(rows)?),
    }
}

fn price(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn score(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.3}", value)
    }
}

/// Fixed-width text table, one line per spread.
pub fn render_table(rows: &[RankedSpread]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<8} {:<10} {:>8} {:>8} {:>8} {:>8} {:>10} {:>9} {:>7}\n",
        "SYMBOL", "EXPIRY", "K1", "K2", "K3", "CREDIT", "MAX_PROFIT", "MAX_LOSS", "SCORE"
    ));
    out.push_str(SEPARATOR);
    out.push('\n');

    for row in rows {
        out.push_str(&format!(
            "{:<8} {:<10} {:>8} {:>8} {:>8} {:>8} {:>10} {:>9} {:>7}\n",
            row.symbol,
            row.expiry.to_string(),
            price(row.k1),
            price(row.k2),
            price(row.k3),
            price(row.credit),
            price(row.max_profit),
            price(row.max_loss),
            score(row.score),
        ));
    }

    if rows.is_empty() {
        out.push_str("(no spreads)\n");
    }
    out
}

/// Write spreads as CSV with a header row. Undefined scores are written as `NaN`.
pub fn write_csv<W: std::io::Write>(rows: &[RankedSpread], writer: W) -> Result<(), ReportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv_writer.write_record([
            "symbol", "expiry", "k1", "k2", "k3", "credit", "max_profit", "max_loss", "score",
        ])?;
    }
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Pretty JSON array. Undefined scores become `null`.
pub fn to_json(rows: &[RankedSpread]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(rows)
}
