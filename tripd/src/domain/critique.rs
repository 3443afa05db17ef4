//! CritiqueResult domain type
//!
//! Structured verdict from the critique stage. Critique never edits a
//! candidate; it only annotates it with issues the generation stage is
//! expected to address on the next revision.

use serde::{Deserialize, Serialize};

/// Critique verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Rejected,
}

/// Rubric dimension an issue is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    LogicalConsistency,
    BudgetMisalignment,
    PreferenceMismatch,
    Feasibility,
    /// Seeded from user feedback via RequestChanges, never by the critic
    UserRequested,
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LogicalConsistency => write!(f, "logical_consistency"),
            Self::BudgetMisalignment => write!(f, "budget_misalignment"),
            Self::PreferenceMismatch => write!(f, "preference_mismatch"),
            Self::Feasibility => write!(f, "feasibility"),
            Self::UserRequested => write!(f, "user_requested"),
        }
    }
}

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One structured issue from critique (or seeded user feedback)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueIssue {
    /// Rubric dimension
    pub dimension: Dimension,

    /// Severity
    pub severity: Severity,

    /// Target activity, None for day-level issues
    #[serde(default)]
    pub activity_id: Option<String>,

    /// Human-readable detail fed back into generation
    pub detail: String,
}

impl CritiqueIssue {
    /// Create a day-level issue
    pub fn day_level(dimension: Dimension, severity: Severity, detail: impl Into<String>) -> Self {
        Self {
            dimension,
            severity,
            activity_id: None,
            detail: detail.into(),
        }
    }

    /// Create an issue seeded from user feedback
    pub fn user_requested(detail: impl Into<String>) -> Self {
        Self::day_level(Dimension::UserRequested, Severity::High, detail)
    }
}

/// Result of critiquing one candidate day plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueResult {
    /// Verdict
    pub verdict: Verdict,

    /// Quality score 0-100, used for best-candidate selection
    pub score: f32,

    /// Structured issues
    #[serde(default)]
    pub issues: Vec<CritiqueIssue>,

    /// One-line summary for display
    #[serde(default)]
    pub summary: String,
}

impl CritiqueResult {
    /// Create an approval with a score
    pub fn approved(score: f32) -> Self {
        Self {
            verdict: Verdict::Approved,
            score,
            issues: Vec::new(),
            summary: String::new(),
        }
    }

    /// Create a rejection with a score and issues
    pub fn rejected(score: f32, issues: Vec<CritiqueIssue>) -> Self {
        Self {
            verdict: Verdict::Rejected,
            score,
            issues,
            summary: String::new(),
        }
    }

    /// Check if the verdict is approval
    pub fn is_approved(&self) -> bool {
        self.verdict == Verdict::Approved
    }

    /// Count of high-severity issues, the degraded-commit tie-breaker
    pub fn high_severity_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::High).count()
    }
}
