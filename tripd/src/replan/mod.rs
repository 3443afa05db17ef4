//! Replanning engine
//!
//! Computes a disruption's blast radius over an existing plan, invalidates
//! exactly that subset, and re-enters the revise loop per affected day with
//! the disruption rendered as an explicit generation constraint.

mod engine;
pub mod scope;

pub use engine::{DayReplanOutcome, ReplanEngine, ReplanReport};
