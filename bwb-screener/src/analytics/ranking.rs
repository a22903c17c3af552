//! Profit/loss scoring and ordering of broken-wing butterflies.
//!
//! For a spread with net credit C (= -cost):
//! - max profit = width1 + C (pinned at K2)
//! - max loss = max(0, width2 - width1 - C) (above K3)
//! - score = max profit / max loss, NaN when max loss is zero

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::spread_screener::{CandidateSpread, EngineError, EngineResult};

/// Column to sort ranked spreads by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Score,
    Credit,
    MaxProfit,
    MaxLoss,
    K1,
    K2,
    K3,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::Credit => "credit",
            Self::MaxProfit => "max_profit",
            Self::MaxLoss => "max_loss",
            Self::K1 => "k1",
            Self::K2 => "k2",
            Self::K3 => "k3",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "score" => Ok(Self::Score),
            "credit" => Ok(Self::Credit),
            "max_profit" => Ok(Self::MaxProfit),
            "max_loss" => Ok(Self::MaxLoss),
            "k1" => Ok(Self::K1),
            "k2" => Ok(Self::K2),
            "k3" => Ok(Self::K3),
            other => Err(format!(
                "unknown sort column '{}' (expected score, credit, max_profit, max_loss, k1, k2 or k3)",
                other
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering applied by [`rank_spreads`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankOptions {
    pub sort_by: SortKey,
    pub ascending: bool,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            sort_by: SortKey::Score,
            ascending: false,
        }
    }
}

/// A scored spread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSpread {
    pub symbol: String,
    pub expiry: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub k1: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub k2: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub k3: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub credit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_profit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_loss: Decimal,
    /// max_profit / max_loss; NaN when max_loss is zero.
    pub score: f64,
}

impl RankedSpread {
    /// Fails with [`EngineError::Overflow`] when profit or loss leaves the
    /// `Decimal` range.
    pub fn from_candidate(spread: &CandidateSpread) -> EngineResult<Self> {
        let overflow = || EngineError::Overflow {
            k1: spread.k1,
            k2: spread.k2,
            k3: spread.k3,
        };

        let credit = spread.credit();
        let max_profit = spread.width1.checked_add(credit).ok_or_else(overflow)?;
        let max_loss = spread
            .width2
            .checked_sub(spread.width1)
            .and_then(|w| w.checked_sub(credit))
            .ok_or_else(overflow)?
            .max(Decimal::ZERO);

        let score = if max_loss.is_zero() {
            f64::NAN
        } else {
            // Quotients past the Decimal range fall back to float division
            max_profit
                .checked_div(max_loss)
                .and_then(|s| s.to_f64())
                .or_else(|| Some(max_profit.to_f64()? / max_loss.to_f64()?))
                .unwrap_or(f64::NAN)
        };

        Ok(Self {
            symbol: spread.symbol.clone(),
            expiry: spread.expiry,
            k1: spread.k1,
            k2: spread.k2,
            k3: spread.k3,
            credit,
            max_profit,
            max_loss,
            score,
        })
    }

    pub fn is_credit(&self) -> bool {
        self.credit > Decimal::ZERO
    }

    /// False when max loss is zero and the score is undefined.
    pub fn has_score(&self) -> bool {
        !self.score.is_nan()
    }

    fn compare(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Score => self.score.total_cmp(&other.score),
            SortKey::Credit => self.credit.cmp(&other.credit),
            SortKey::MaxProfit => self.max_profit.cmp(&other.max_profit),
            SortKey::MaxLoss => self.max_loss.cmp(&other.max_loss),
            SortKey::K1 => self.k1.cmp(&other.k1),
            SortKey::K2 => self.k2.cmp(&other.k2),
            SortKey::K3 => self.k3.cmp(&other.k3),
        }
    }
}

/// Score spreads and sort them.
///
/// Sorting is stable. When sorting by score, undefined (NaN) scores go last
/// in either direction. The row count is unchanged and the input is not
/// modified.
pub fn rank_spreads(
    spreads: &[CandidateSpread],
    options: &RankOptions,
) -> EngineResult<Vec<RankedSpread>> {
    if let Some(bad) = spreads
        .iter()
        .find(|s| s.width1 < Decimal::ZERO || s.width2 < Decimal::ZERO)
    {
        return Err(EngineError::NegativeWidth {
            k1: bad.k1,
            k2: bad.k2,
            k3: bad.k3,
        });
    }

    if spreads.is_empty() {
        return Ok(Vec::new());
    }

    let key = options.sort_by;
    let (mut ranked, undefined): (Vec<_>, Vec<_>) = spreads
        .iter()
        .map(RankedSpread::from_candidate)
        .collect::<EngineResult<Vec<_>>>()?
        .into_iter()
        .partition(|r| key != SortKey::Score || r.has_score());

    ranked.sort_by(|a, b| {
        let ord = a.compare(b, key);
        if options.ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    ranked.extend(undefined);

    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn spread(k1: Decimal, k2: Decimal, k3: Decimal, cost: Decimal) -> CandidateSpread {
        CandidateSpread {
            symbol: "AAPL".to_string(),
            expiry: NaiveDate::from_ymd_opt(2025, 11, 15).unwrap(),
            dte: 8,
            k1,
            k2,
            k3,
            width1: k2 - k1,
            width2: k3 - k2,
            cost,
            price_k1: Decimal::ZERO,
            price_k2: Decimal::ZERO,
            price_k3: Decimal::ZERO,
            delta_k2: 0.25,
        }
    }

    #[test]
    fn test_score_calculation() {
        // credit 0.5, max profit 5 + 0.5, max loss 10 - 5 - 0.5
        let ranked =
            RankedSpread::from_candidate(&spread(dec!(100), dec!(105), dec!(115), dec!(-0.5)))
                .unwrap();
        assert_eq!(ranked.credit, dec!(0.5));
        assert_eq!(ranked.max_profit, dec!(5.5));
        assert_eq!(ranked.max_loss, dec!(4.5));
        assert!((ranked.score - 1.2222).abs() < 1e-3);
        assert!(ranked.is_credit());
    }

    #[test]
    fn test_zero_max_loss_gives_nan() {
        // Upper wing narrower than the lower one: no risk above K3
        let ranked =
            RankedSpread::from_candidate(&spread(dec!(95), dec!(105), dec!(110), dec!(0.2)))
                .unwrap();
        assert_eq!(ranked.max_loss, Decimal::ZERO);
        assert!(ranked.score.is_nan());
        assert!(!ranked.has_score());
        assert!(!ranked.is_credit());
    }

    #[test]
    fn test_default_sort_descending_with_nan_last() {
        let spreads = vec![
            spread(dec!(95), dec!(105), dec!(110), dec!(0.2)), // NaN
            spread(dec!(100), dec!(105), dec!(115), dec!(-0.5)), // 1.22
            spread(dec!(95), dec!(100), dec!(110), dec!(-0.8)), // 1.38
            spread(dec!(100), dec!(105), dec!(120), dec!(-1.3)), // 0.72
        ];

        let ranked = rank_spreads(&spreads, &RankOptions::default()).unwrap();
        assert_eq!(ranked.len(), spreads.len());
        let k3s: Vec<Decimal> = ranked.iter().map(|r| r.k3).collect();
        assert_eq!(k3s, vec![dec!(110), dec!(115), dec!(120), dec!(110)]);
        assert_eq!(ranked[0].k1, dec!(95));
        assert!(ranked[3].score.is_nan());
    }

    #[test]
    fn test_ascending_still_puts_nan_last() {
        let spreads = vec![
            spread(dec!(95), dec!(105), dec!(110), dec!(0.2)),
            spread(dec!(100), dec!(105), dec!(115), dec!(-0.5)),
            spread(dec!(100), dec!(105), dec!(120), dec!(-1.3)),
        ];
        let options = RankOptions {
            sort_by: SortKey::Score,
            ascending: true,
        };

        let ranked = rank_spreads(&spreads, &options).unwrap();
        assert_eq!(ranked[0].k3, dec!(120));
        assert_eq!(ranked[1].k3, dec!(115));
        assert!(ranked[2].score.is_nan());
    }

    #[test]
    fn test_sort_by_credit() {
        let spreads = vec![
            spread(dec!(100), dec!(105), dec!(115), dec!(-0.5)),
            spread(dec!(100), dec!(105), dec!(120), dec!(-1.3)),
            spread(dec!(95), dec!(100), dec!(110), dec!(-0.8)),
        ];
        let options = RankOptions {
            sort_by: SortKey::Credit,
            ascending: false,
        };

        let ranked = rank_spreads(&spreads, &options).unwrap();
        let credits: Vec<Decimal> = ranked.iter().map(|r| r.credit).collect();
        assert_eq!(credits, vec![dec!(1.3), dec!(0.8), dec!(0.5)]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let first = spread(dec!(100), dec!(105), dec!(115), dec!(-0.5));
        let mut second = first.clone();
        second.symbol = "MSFT".to_string();

        let ranked = rank_spreads(&[first, second], &RankOptions::default()).unwrap();
        assert_eq!(ranked[0].symbol, "AAPL");
        assert_eq!(ranked[1].symbol, "MSFT");
    }

    #[test]
    fn test_profit_overflow_is_an_error() {
        let huge_credit = spread(dec!(100), dec!(105), dec!(115), -Decimal::MAX);
        let err = rank_spreads(&[huge_credit], &RankOptions::default()).unwrap_err();
        assert_eq!(
            err,
            EngineError::Overflow {
                k1: dec!(100),
                k2: dec!(105),
                k3: dec!(115),
            }
        );
    }

    #[test]
    fn test_huge_debit_scores_without_panicking() {
        // Max profit is deeply negative, max loss near Decimal::MAX
        let ranked = RankedSpread::from_candidate(&spread(
            dec!(100),
            dec!(105),
            dec!(115),
            Decimal::MAX / dec!(2),
        ))
        .unwrap();
        assert!(ranked.max_loss > Decimal::ZERO);
        assert!(ranked.score < 0.0);
    }

    #[test]
    fn test_ranked_spread_serializes_numbers() {
        let ranked =
            RankedSpread::from_candidate(&spread(dec!(100), dec!(105), dec!(115), dec!(-0.5)))
                .unwrap();
        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json["k3"], 115.0);
        assert_eq!(json["credit"], 0.5);
        assert_eq!(json["max_loss"], 4.5);
    }

    #[test]
    fn test_negative_width_rejected() {
        let bad = spread(dec!(105), dec!(100), dec!(115), dec!(-0.5));
        let err = rank_spreads(&[bad], &RankOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::NegativeWidth { .. }));
    }

    #[test]
    fn test_empty_input() {
        assert!(rank_spreads(&[], &RankOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_input_not_modified() {
        let spreads = vec![
            spread(dec!(100), dec!(105), dec!(115), dec!(-0.5)),
            spread(dec!(95), dec!(100), dec!(110), dec!(-0.8)),
        ];
        let before = spreads.clone();
        rank_spreads(&spreads, &RankOptions::default()).unwrap();
        assert_eq!(spreads, before);
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("score".parse::<SortKey>().unwrap(), SortKey::Score);
        assert_eq!("max-profit".parse::<SortKey>().unwrap(), SortKey::MaxProfit);
        assert_eq!("MAX_LOSS".parse::<SortKey>().unwrap(), SortKey::MaxLoss);
        assert!("delta".parse::<SortKey>().is_err());
        assert_eq!(SortKey::MaxProfit.to_string(), "max_profit");
    }
}
