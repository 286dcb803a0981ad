pub mod csv;
pub mod rules;

pub use crate::csv::{
    normalize, normalize_with_limits, CsvError, Field, ImportLimits, NormalizedStatement,
    SkipReason, SkippedRow, PLACEHOLDER_DESCRIPTION,
};
pub use crate::rules::{derive_keyword, Resolution, RuleMatcher, MIN_KEYWORD_LEN};
