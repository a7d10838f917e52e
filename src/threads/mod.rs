//! Topic thread lifecycle: state machine, pure decisions, and the manager
//! that persists and notifies.

pub mod cooldown;
pub mod decide;
pub mod manager;
pub mod state;

pub use cooldown::Cooldown;
pub use decide::{Decision, NotificationContext, Suppressed, ThreadSignal, ThreadStats};
pub use manager::{AssignOutcome, Assignment, ThreadManager};
