//! Validation of option quotes.
//!
//! The loader coerces raw CSV rows into typed [`crate::data::QuoteRecord`]s;
//! this module checks the domain invariants those records must satisfy
//! before they become an [`crate::data::OptionsTable`].

pub mod business_rules;

pub use business_rules::{
    check_business_rules, normalize_option_type, RuleResult, RuleViolation, MID_TOLERANCE,
};
