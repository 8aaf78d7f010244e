//! Core domain types: the closed classification taxonomy and run identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label used for "could not be determined" in every closed vocabulary.
pub const NOT_APPLICABLE: &str = "N/A";

/// Stack vocabulary accepted for `bestStack` / `allPossibleStacks`.
pub const STACK_VOCABULARY: &[&str] = &[
    "Frontend",
    "Backend",
    "Full Stack",
    "Mobile",
    "DevOps",
    "Cloud",
    "Data",
    "Machine Learning",
    "QA",
    "Security",
    "Embedded",
    "Blockchain",
    "Game",
];

/// Phrases the classifier looks for when deciding `hasSpecialPhrase`.
pub const SPECIAL_PHRASES: &[&str] = &[
    "security clearance",
    "secret clearance",
    "top secret",
    "TS/SCI",
    "public trust",
    "governance",
    "compliance",
    "SOC 2",
    "FedRAMP",
    "NIST",
    "ISO 27001",
    "HIPAA",
    "PCI DSS",
];

/// Lowercase and drop separators so `On-site`, `on site` and `ONSITE` compare equal.
fn fold(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Closed vocabularies
// ---------------------------------------------------------------------------

/// Work arrangement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RemoteMode {
    Remote,
    Hybrid,
    OnSite,
    #[default]
    NotApplicable,
}

impl RemoteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "Remote",
            Self::Hybrid => "Hybrid",
            Self::OnSite => "On-site",
            Self::NotApplicable => NOT_APPLICABLE,
        }
    }

    /// Coerce a free-form label; anything outside the vocabulary is `N/A`.
    pub fn from_label(label: &str) -> Self {
        match fold(label).as_str() {
            "remote" => Self::Remote,
            "hybrid" => Self::Hybrid,
            "onsite" => Self::OnSite,
            _ => Self::NotApplicable,
        }
    }
}

/// Industry bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Industry {
    Finance,
    Healthcare,
    #[default]
    NotApplicable,
}

impl Industry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finance => "finance",
            Self::Healthcare => "healthcare",
            Self::NotApplicable => NOT_APPLICABLE,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match fold(label).as_str() {
            "finance" => Self::Finance,
            "healthcare" => Self::Healthcare,
            _ => Self::NotApplicable,
        }
    }
}

/// Annual salary lower bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SalaryBand {
    Over30K,
    Over60K,
    Over100K,
    Over160K,
    Over200K,
    #[default]
    NotApplicable,
}

impl SalaryBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Over30K => "30K <",
            Self::Over60K => "60K <",
            Self::Over100K => "100K <",
            Self::Over160K => "160K <",
            Self::Over200K => "200K <",
            Self::NotApplicable => NOT_APPLICABLE,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match fold(label).as_str() {
            "30k<" => Self::Over30K,
            "60k<" => Self::Over60K,
            "100k<" => Self::Over100K,
            "160k<" => Self::Over160K,
            "200k<" => Self::Over200K,
            _ => Self::NotApplicable,
        }
    }
}

/// Seniority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Level {
    Middle,
    Senior,
    Staff,
    Principal,
    Lead,
    Architect,
    #[default]
    NotApplicable,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Middle => "Middle",
            Self::Senior => "Senior",
            Self::Staff => "Staff",
            Self::Principal => "Principal",
            Self::Lead => "Lead",
            Self::Architect => "Architect",
            Self::NotApplicable => NOT_APPLICABLE,
        }
    }

    /// Coerce a free-form label. The common misspelling `Principle` maps to `Principal`.
    pub fn from_label(label: &str) -> Self {
        match fold(label).as_str() {
            "middle" => Self::Middle,
            "senior" => Self::Senior,
            "staff" => Self::Staff,
            "principal" | "principle" => Self::Principal,
            "lead" => Self::Lead,
            "architect" => Self::Architect,
            _ => Self::NotApplicable,
        }
    }
}

/// Canonical spelling of a stack label, if it belongs to [`STACK_VOCABULARY`].
pub fn canonical_stack(label: &str) -> Option<&'static str> {
    let folded = fold(label);
    if folded.is_empty() {
        return None;
    }
    STACK_VOCABULARY
        .iter()
        .copied()
        .find(|candidate| fold(candidate) == folded)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Schema-validated description of one job posting.
///
/// Every field holds a member of its closed vocabulary; construct instances
/// from model output only through the classifier's coercion step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub remote: RemoteMode,
    /// A [`STACK_VOCABULARY`] entry, or `None` for `N/A`.
    pub best_stack: Option<&'static str>,
    pub all_possible_stacks: Vec<&'static str>,
    pub has_special_phrase: bool,
    pub matched_special_phrases: Vec<String>,
    pub industry: Industry,
    pub annual_salary: SalaryBand,
    pub level: Level,
}

impl Classification {
    /// `bestStack` as written to the table.
    pub fn best_stack_label(&self) -> &'static str {
        self.best_stack.unwrap_or(NOT_APPLICABLE)
    }

    /// True when nothing could be determined.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_normalizes_principle() {
        assert_eq!(Level::from_label("Principle"), Level::Principal);
        assert_eq!(Level::from_label("principal"), Level::Principal);
        assert_eq!(Level::from_label("Expert"), Level::NotApplicable);
        assert_eq!(Level::from_label(""), Level::NotApplicable);
    }

    #[test]
    fn remote_mode_accepts_spelling_variants() {
        assert_eq!(RemoteMode::from_label("On-site"), RemoteMode::OnSite);
        assert_eq!(RemoteMode::from_label("on site"), RemoteMode::OnSite);
        assert_eq!(RemoteMode::from_label("REMOTE"), RemoteMode::Remote);
        assert_eq!(RemoteMode::from_label("Fully distributed"), RemoteMode::NotApplicable);
        assert_eq!(RemoteMode::OnSite.as_str(), "On-site");
    }

    #[test]
    fn salary_band_labels() {
        assert_eq!(SalaryBand::from_label("100K <"), SalaryBand::Over100K);
        assert_eq!(SalaryBand::from_label("100k<"), SalaryBand::Over100K);
        assert_eq!(SalaryBand::from_label("$120,000"), SalaryBand::NotApplicable);
        assert_eq!(SalaryBand::Over200K.as_str(), "200K <");
    }

    #[test]
    fn industry_is_lowercase() {
        assert_eq!(Industry::from_label("Finance"), Industry::Finance);
        assert_eq!(Industry::Finance.as_str(), "finance");
        assert_eq!(Industry::from_label("retail"), Industry::NotApplicable);
    }

    #[test]
    fn stack_vocabulary_lookup() {
        assert_eq!(canonical_stack("backend"), Some("Backend"));
        assert_eq!(canonical_stack("full-stack"), Some("Full Stack"));
        assert_eq!(canonical_stack("Rust"), None);
        assert_eq!(canonical_stack("  "), None);
    }

    #[test]
    fn default_classification_is_all_na() {
        let c = Classification::default();
        assert!(c.is_default());
        assert_eq!(c.remote.as_str(), NOT_APPLICABLE);
        assert_eq!(c.best_stack_label(), NOT_APPLICABLE);
        assert_eq!(c.industry.as_str(), NOT_APPLICABLE);
        assert_eq!(c.annual_salary.as_str(), NOT_APPLICABLE);
        assert_eq!(c.level.as_str(), NOT_APPLICABLE);
        assert!(c.all_possible_stacks.is_empty());
        assert!(!c.has_special_phrase);
    }
}
