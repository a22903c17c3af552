//! Options analytics module.
//!
//! Provides:
//! - Broken-wing butterfly call spread generation and filtering
//! - Profit/loss scoring and ranking of screened spreads

pub mod ranking;
pub mod spread_screener;

pub use ranking::{rank_spreads, RankOptions, RankedSpread, SortKey};
pub use spread_screener::{
    BrokenWingButterfly, CandidateSpread, EngineError, EngineResult, FilterCriteria,
    CREDIT_EPSILON,
};
