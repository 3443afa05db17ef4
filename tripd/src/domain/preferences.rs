//! User preference snapshot
//!
//! Captured once at session start (directly or via the intent stage) and
//! read-only to every stage afterwards.

use serde::{Deserialize, Serialize};

/// Spending tier used by generation and critique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLevel {
    Budget,
    #[default]
    MidRange,
    Luxury,
}

impl std::fmt::Display for BudgetLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Budget => write!(f, "budget"),
            Self::MidRange => write!(f, "mid_range"),
            Self::Luxury => write!(f, "luxury"),
        }
    }
}

/// How densely packed the traveler wants each day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TravelPace {
    Relaxed,
    #[default]
    Moderate,
    Packed,
}

impl std::fmt::Display for TravelPace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relaxed => write!(f, "relaxed"),
            Self::Moderate => write!(f, "moderate"),
            Self::Packed => write!(f, "packed"),
        }
    }
}

/// Immutable preference snapshot for one planning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Spending tier
    pub budget: BudgetLevel,

    /// Daily pacing
    pub pace: TravelPace,

    /// Interest tags (e.g. "museums", "hiking", "street food")
    pub interests: Vec<String>,

    /// Dietary restrictions passed through to food lookups
    pub dietary: Vec<String>,

    /// Number of travelers
    pub party_size: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            budget: BudgetLevel::default(),
            pace: TravelPace::default(),
            interests: Vec::new(),
            dietary: Vec::new(),
            party_size: 1,
        }
    }
}
