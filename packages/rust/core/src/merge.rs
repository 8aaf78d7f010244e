//! Flattening a [`Classification`] into output columns.

use joblens_shared::Classification;
use joblens_storage::{LINK_COLUMN, Row};

pub const DATE_COLUMN: &str = "Date";
pub const STATUS_COLUMN: &str = "Status";
pub const REMOTE_COLUMN: &str = "Remote";
pub const BEST_STACK_COLUMN: &str = "BestStack";
pub const ALL_STACKS_COLUMN: &str = "AllPossibleStacks";
pub const SECRET_REQUIRED_COLUMN: &str = "SecretRequired";
pub const PHRASES_COLUMN: &str = "GovernanceAndSecurityPhrases";
pub const INDUSTRY_COLUMN: &str = "Industry";
pub const SALARY_COLUMN: &str = "AnnualSalary";
pub const LEVEL_COLUMN: &str = "Level";

/// Columns every analyzed row carries, in output order.
pub const OUTPUT_COLUMNS: [&str; 11] = [
    DATE_COLUMN,
    STATUS_COLUMN,
    LINK_COLUMN,
    REMOTE_COLUMN,
    BEST_STACK_COLUMN,
    ALL_STACKS_COLUMN,
    SECRET_REQUIRED_COLUMN,
    PHRASES_COLUMN,
    INDUSTRY_COLUMN,
    SALARY_COLUMN,
    LEVEL_COLUMN,
];

/// Separator for list-valued columns.
pub const LIST_SEPARATOR: &str = ", ";

/// Per-run values written next to each classification.
#[derive(Debug, Clone)]
pub struct RunStamp {
    /// Formatted run start time.
    pub date: String,
    /// Status for rows that do not have one yet.
    pub status_marker: String,
}

/// Source row plus run stamp, canonical link and classification.
///
/// A `Status` already present (for example edited by hand on a previous
/// output) is kept; every other output column is overwritten.
pub fn merge_row(source: &Row, link: &str, classification: &Classification, stamp: &RunStamp) -> Row {
    let mut row = source.clone();

    row.set(DATE_COLUMN, stamp.date.as_str());
    let status = source
        .get(STATUS_COLUMN)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(stamp.status_marker.as_str())
        .to_string();
    row.set(STATUS_COLUMN, status);
    row.set(LINK_COLUMN, link);

    row.set(REMOTE_COLUMN, classification.remote.as_str());
    row.set(BEST_STACK_COLUMN, classification.best_stack_label());
    row.set(ALL_STACKS_COLUMN, classification.all_possible_stacks.join(LIST_SEPARATOR));
    row.set(
        SECRET_REQUIRED_COLUMN,
        if classification.has_special_phrase { "Yes" } else { "No" },
    );
    row.set(PHRASES_COLUMN, classification.matched_special_phrases.join(LIST_SEPARATOR));
    row.set(INDUSTRY_COLUMN, classification.industry.as_str());
    row.set(SALARY_COLUMN, classification.annual_salary.as_str());
    row.set(LEVEL_COLUMN, classification.level.as_str());

    row
}
