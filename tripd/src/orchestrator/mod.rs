//! Session orchestrator
//!
//! One actor per trip owns the PlanContext and applies every operation in
//! arrival order. Trips are independent; the manager is the registry and
//! shares the stage invokers across all of them.

mod handle;
mod manager;
mod messages;
mod session;

pub use handle::SessionHandle;
pub use manager::{SessionManager, StartSessionRequest};
pub use messages::{DaySummary, PlanSummary, SessionCommand, SessionError};
pub use session::TripSession;
