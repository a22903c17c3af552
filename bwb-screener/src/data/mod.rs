pub mod loader;
pub mod types;

pub use loader::{DataLoader, LoaderError, LoaderResult, QuoteRecord, REQUIRED_COLUMNS};
pub use types::{OptionQuote, OptionType, OptionsTable, TableSummary};
