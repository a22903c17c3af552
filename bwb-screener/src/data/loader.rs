//! CSV loader for options chain snapshots.
//!
//! Loads a header-first CSV file into an [`OptionsTable`]. Validation runs
//! in passes over the whole file, and the first failing pass aborts the load:
//! 1. schema (required columns present)
//! 2. nulls (no missing required values)
//! 3. types (every value coerces to its semantic type)
//! 4. business rules (see [`crate::validation`])
//!
//! Required columns (case-sensitive, extra columns ignored):
//! - symbol, expiry, dte, strike, type
//! - bid, ask, mid, delta, iv

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info};

use super::types::{OptionQuote, OptionType, OptionsTable};
use crate::validation::{check_business_rules, normalize_option_type, RuleViolation};

/// Columns every input file must carry.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "symbol", "expiry", "dte", "strike", "type", "bid", "ask", "mid", "delta", "iv",
];

/// Cell values treated as missing.
const NULL_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Null values found in required columns: {0}")]
    NullValue(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Business rule violated: {0}")]
    BusinessRule(#[from] RuleViolation),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type LoaderResult<T> = Result<T, LoaderError>;

/// A row with every required column coerced to its semantic type.
///
/// Symbol and type are trimmed but not yet case-normalized; business rules
/// have not been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRecord {
    pub symbol: String,
    pub expiry: NaiveDate,
    pub dte: i32,
    pub strike: Decimal,
    pub option_type: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
    pub delta: f64,
    pub iv: f64,
}

impl QuoteRecord {
    /// Normalize into a quote. Fails only if the type is not call/put, which
    /// the business rules already reject.
    pub fn into_quote(self) -> Result<OptionQuote, RuleViolation> {
        let normalized = normalize_option_type(&self.option_type);
        let option_type = OptionType::parse(&normalized).ok_or_else(|| {
            RuleViolation::new(
                "option_type",
                format!("Type must be 'call' or 'put'. Invalid value: {:?}", self.option_type),
            )
        })?;

        Ok(OptionQuote {
            symbol: self.symbol.trim().to_uppercase(),
            expiry: self.expiry,
            dte: self.dte,
            strike: self.strike,
            option_type,
            bid: self.bid,
            ask: self.ask,
            mid: self.mid,
            delta: self.delta,
            iv: self.iv,
        })
    }
}

/// Positions of the required columns in the header.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    positions: [usize; 10],
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> LoaderResult<Self> {
        let mut positions = [0usize; 10];
        let mut missing = Vec::new();

        for (slot, name) in REQUIRED_COLUMNS.iter().enumerate() {
            match headers.iter().position(|h| h == *name) {
                Some(pos) => positions[slot] = pos,
                None => missing.push(*name),
            }
        }

        if !missing.is_empty() {
            return Err(LoaderError::Schema(format!(
                "Missing required columns: {}",
                missing.join(", ")
            )));
        }

        Ok(Self { positions })
    }

    /// Trimmed value of a required column, by its name's slot.
    fn value<'r>(&self, record: &'r StringRecord, slot: usize) -> &'r str {
        record.get(self.positions[slot]).unwrap_or("").trim()
    }
}

/// CSV loader for options chain data.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataLoader;

impl DataLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and validate a CSV file.
    pub fn load_csv(&self, path: impl AsRef<Path>) -> LoaderResult<OptionsTable> {
        let path = path.as_ref();
        let source = path.display().to_string();

        if !path.exists() {
            return Err(log_failure(LoaderError::NotFound(source)));
        }

        let metadata = std::fs::metadata(path).map_err(|e| log_failure(e.into()))?;
        if metadata.len() == 0 {
            return Err(log_failure(LoaderError::EmptyInput(format!(
                "File is empty: {}",
                source
            ))));
        }

        let file = File::open(path).map_err(|e| log_failure(e.into()))?;
        self.load_from_reader(file, &source)
    }

    /// Load and validate CSV content from any reader. `source` names the
    /// input in log lines and error messages.
    pub fn load_from_reader<R: Read>(
        &self,
        reader: R,
        source: &str,
    ) -> LoaderResult<OptionsTable> {
        let table = read_table(reader, source).map_err(log_failure)?;
        info!("Successfully loaded {} rows from {}", table.len(), source);
        Ok(table)
    }
}

fn log_failure(err: LoaderError) -> LoaderError {
    error!("{}", err);
    err
}

fn read_table<R: Read>(reader: R, source: &str) -> LoaderResult<OptionsTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        rows.push(result?);
    }

    if rows.is_empty() {
        return Err(LoaderError::EmptyInput(format!(
            "File contains no data rows: {}",
            source
        )));
    }

    let columns = ColumnIndex::from_headers(&headers)?;
    check_nulls(&rows, &columns)?;

    let records = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| coerce_row(row, &columns, idx + 1))
        .collect::<LoaderResult<Vec<_>>>()?;

    check_business_rules(&records)?;

    let quotes = records
        .into_iter()
        .map(QuoteRecord::into_quote)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OptionsTable::from_quotes(quotes))
}

fn is_null(value: &str) -> bool {
    NULL_MARKERS.contains(&value)
}

fn check_nulls(rows: &[StringRecord], columns: &ColumnIndex) -> LoaderResult<()> {
    let mut counts = [0usize; 10];
    for row in rows {
        for (slot, count) in counts.iter_mut().enumerate() {
            if is_null(columns.value(row, slot)) {
                *count += 1;
            }
        }
    }

    let offenders: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .zip(counts.iter())
        .filter(|(_, count)| **count > 0)
        .map(|(name, count)| format!("{}: {}", name, count))
        .collect();

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(LoaderError::NullValue(offenders.join(", ")))
    }
}

fn coerce_row(
    row: &StringRecord,
    columns: &ColumnIndex,
    row_no: usize,
) -> LoaderResult<QuoteRecord> {
    Ok(QuoteRecord {
        symbol: columns.value(row, 0).to_string(),
        expiry: parse_expiry(columns.value(row, 1), row_no)?,
        dte: parse_whole("dte", columns.value(row, 2), row_no)?,
        strike: parse_decimal("strike", columns.value(row, 3), row_no)?,
        option_type: columns.value(row, 4).to_string(),
        bid: parse_decimal("bid", columns.value(row, 5), row_no)?,
        ask: parse_decimal("ask", columns.value(row, 6), row_no)?,
        mid: parse_decimal("mid", columns.value(row, 7), row_no)?,
        delta: parse_float("delta", columns.value(row, 8), row_no)?,
        iv: parse_float("iv", columns.value(row, 9), row_no)?,
    })
}

fn type_error(column: &str, expected: &str, value: &str, row_no: usize) -> LoaderError {
    LoaderError::Type(format!(
        "{} column must be {}. Got {:?} at row {}",
        column, expected, value, row_no
    ))
}

fn parse_decimal(column: &str, value: &str, row_no: usize) -> LoaderResult<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| type_error(column, "numeric", value, row_no))
}

fn parse_float(column: &str, value: &str, row_no: usize) -> LoaderResult<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| type_error(column, "numeric", value, row_no))
}

/// Whole numbers only; `8.0` is accepted, `8.5` is not.
fn parse_whole(column: &str, value: &str, row_no: usize) -> LoaderResult<i32> {
    if let Ok(v) = value.parse::<i32>() {
        return Ok(v);
    }

    let float = value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| type_error(column, "integer", value, row_no))?;

    if float.fract() != 0.0 || float < i32::MIN as f64 || float > i32::MAX as f64 {
        return Err(type_error(column, "integer (whole numbers)", value, row_no));
    }

    Ok(float as i32)
}

/// ISO-8601 dates, optionally with a time part which is dropped.
fn parse_expiry(value: &str, row_no: usize) -> LoaderResult<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }

    Err(type_error("expiry", "date-like (YYYY-MM-DD)", value, row_no))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const HEADER: &str = "symbol,expiry,dte,strike,type,bid,ask,mid,delta,iv";

    fn load_str(content: &str) -> LoaderResult<OptionsTable> {
        DataLoader::new().load_from_reader(content.as_bytes(), "inline")
    }

    fn with_rows(rows: &[&str]) -> String {
        let mut content = String::from(HEADER);
        for row in rows {
            content.push('\n');
            content.push_str(row);
        }
        content
    }

    #[test]
    fn test_load_valid_rows_normalizes_fields() {
        let content = with_rows(&[
            " aapl ,2025-11-15,8,100,Call,7.20,7.30,7.25,0.30,0.15",
            "AAPL,2025-11-15T00:00:00,8.0,105, put ,4.80,4.90,4.85,0.20,-0.01",
        ]);

        let table = load_str(&content).unwrap();
        assert_eq!(table.len(), 2);

        let first = &table.quotes()[0];
        assert_eq!(first.symbol, "AAPL");
        assert_eq!(first.expiry, NaiveDate::from_ymd_opt(2025, 11, 15).unwrap());
        assert_eq!(first.option_type, OptionType::Call);
        assert_eq!(first.strike, dec!(100));
        assert_eq!(first.mid, dec!(7.25));

        let second = &table.quotes()[1];
        assert_eq!(second.dte, 8);
        assert_eq!(second.option_type, OptionType::Put);
        assert_eq!(second.iv, -0.01);
    }

    #[test]
    fn test_extra_columns_ignored_and_order_free() {
        let content = "iv,volume,delta,mid,ask,bid,type,strike,dte,expiry,symbol\n\
                       0.15,120,0.30,7.25,7.30,7.20,call,100,8,2025-11-15,SPY";
        let table = load_str(content).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.quotes()[0].symbol, "SPY");
        assert_eq!(table.quotes()[0].bid, dec!(7.20));
    }

    #[test]
    fn test_missing_file() {
        let err = DataLoader::new().load_csv("does/not/exist.csv").unwrap_err();
        assert!(matches!(err, LoaderError::NotFound(_)));
    }

    #[test]
    fn test_zero_length_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = DataLoader::new().load_csv(file.path()).unwrap_err();
        assert!(matches!(err, LoaderError::EmptyInput(_)));
    }

    #[test]
    fn test_header_only_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        let err = DataLoader::new().load_csv(file.path()).unwrap_err();
        assert!(matches!(err, LoaderError::EmptyInput(_)));
    }

    #[test]
    fn test_load_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            with_rows(&["SPY,2025-01-17,3,500,call,2.00,2.10,2.05,0.25,0.12"])
        )
        .unwrap();
        let table = DataLoader::new().load_csv(file.path()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_missing_columns() {
        let content = "symbol,expiry,dte,strike,type,bid,ask,mid\n\
                       SPY,2025-01-17,3,500,call,2.00,2.10,2.05";
        match load_str(content).unwrap_err() {
            LoaderError::Schema(msg) => {
                assert!(msg.contains("delta"));
                assert!(msg.contains("iv"));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_column_names_are_case_sensitive() {
        let content = "Symbol,expiry,dte,strike,type,bid,ask,mid,delta,iv\n\
                       SPY,2025-01-17,3,500,call,2.00,2.10,2.05,0.25,0.12";
        assert!(matches!(load_str(content).unwrap_err(), LoaderError::Schema(_)));
    }

    #[test]
    fn test_null_values() {
        let content = with_rows(&[
            "SPY,2025-01-17,3,500,call,2.00,2.10,,0.25,0.12",
            "SPY,2025-01-17,NA,505,call,1.00,1.10,1.05,0.20,0.12",
        ]);
        match load_str(&content).unwrap_err() {
            LoaderError::NullValue(msg) => {
                assert!(msg.contains("mid: 1"));
                assert!(msg.contains("dte: 1"));
            }
            other => panic!("expected null error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_strike() {
        let content = with_rows(&["SPY,2025-01-17,3,abc,call,2.00,2.10,2.05,0.25,0.12"]);
        assert!(matches!(load_str(&content).unwrap_err(), LoaderError::Type(_)));
    }

    #[test]
    fn test_fractional_dte() {
        let content = with_rows(&["SPY,2025-01-17,3.5,500,call,2.00,2.10,2.05,0.25,0.12"]);
        assert!(matches!(load_str(&content).unwrap_err(), LoaderError::Type(_)));
    }

    #[test]
    fn test_unparseable_expiry() {
        let content = with_rows(&["SPY,next friday,3,500,call,2.00,2.10,2.05,0.25,0.12"]);
        match load_str(&content).unwrap_err() {
            LoaderError::Type(msg) => assert!(msg.contains("expiry")),
            other => panic!("expected type error, got {other:?}"),
        }
    }

    #[test]
    fn test_bid_above_ask_fails_load() {
        let content = with_rows(&[
            "SPY,2025-01-17,3,500,call,2.00,2.10,2.05,0.25,0.12",
            "SPY,2025-01-17,3,505,call,1.30,1.10,1.20,0.20,0.12",
        ]);
        match load_str(&content).unwrap_err() {
            LoaderError::BusinessRule(v) => assert_eq!(v.rule, "bid_ask"),
            other => panic!("expected business rule error, got {other:?}"),
        }
    }

    #[test]
    fn test_prices_near_decimal_max_load_without_panic() {
        let huge = "50000000000000000000000000000";
        let row = format!("SPY,2025-01-17,3,500,call,{huge},{huge},{huge},0.25,0.12");
        let table = load_str(&with_rows(&[row.as_str()])).unwrap();
        assert_eq!(table.quotes()[0].mid, huge.parse::<Decimal>().unwrap());

        let row = format!("SPY,2025-01-17,3,500,call,0,{},0,0.25,0.12", Decimal::MAX);
        match load_str(&with_rows(&[row.as_str()])).unwrap_err() {
            LoaderError::BusinessRule(v) => assert_eq!(v.rule, "mid_consistency"),
            other => panic!("expected business rule error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_option_type() {
        let content = with_rows(&["SPY,2025-01-17,3,500,straddle,2.00,2.10,2.05,0.25,0.12"]);
        match load_str(&content).unwrap_err() {
            LoaderError::BusinessRule(v) => assert_eq!(v.rule, "option_type"),
            other => panic!("expected business rule error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_whole() {
        assert_eq!(parse_whole("dte", "8", 1).unwrap(), 8);
        assert_eq!(parse_whole("dte", "8.0", 1).unwrap(), 8);
        assert_eq!(parse_whole("dte", "-2", 1).unwrap(), -2);
        assert!(parse_whole("dte", "8.25", 1).is_err());
        assert!(parse_whole("dte", "eight", 1).is_err());
    }

    #[test]
    fn test_parse_decimal_scientific() {
        assert_eq!(parse_decimal("bid", "1.5e-1", 1).unwrap(), dec!(0.15));
        assert_eq!(parse_decimal("bid", "0.15", 1).unwrap(), dec!(0.15));
    }

    #[test]
    fn test_parse_expiry_variants() {
        let expected = NaiveDate::from_ymd_opt(2025, 11, 15).unwrap();
        assert_eq!(parse_expiry("2025-11-15", 1).unwrap(), expected);
        assert_eq!(parse_expiry("2025-11-15 16:00:00", 1).unwrap(), expected);
        assert_eq!(parse_expiry("2025-11-15T16:00:00Z", 1).unwrap(), expected);
        assert!(parse_expiry("11/15/2025", 1).is_err());
    }

    #[test]
    fn test_required_columns() {
        assert_eq!(REQUIRED_COLUMNS.len(), 10);
        assert!(REQUIRED_COLUMNS.contains(&"type"));
        assert!(REQUIRED_COLUMNS.contains(&"delta"));
    }
}
