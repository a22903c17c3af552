pub mod analytics;
pub mod config;
pub mod data;
pub mod report;
pub mod validation;

// Re-export commonly used types
pub use analytics::{
    BrokenWingButterfly, CandidateSpread, EngineError, FilterCriteria, RankOptions, RankedSpread,
    SortKey,
};
pub use config::{ConfigError, ScreenerConfig};
pub use data::{DataLoader, LoaderError, OptionQuote, OptionType, OptionsTable};
pub use report::{OutputFormat, ReportError};
pub use validation::RuleViolation;
