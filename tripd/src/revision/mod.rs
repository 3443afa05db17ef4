//! Plan-critique-revise loop
//!
//! Bounded controller driving the generation and critique stages against
//! one day until approval or budget exhaustion. Never blocks on the
//! confirmation gate.

mod engine;

pub use engine::{FailurePolicy, ReviseEngine, ReviseError, ReviseOutcome, RevisionConfig};
