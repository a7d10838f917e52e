//! Explicit thread state machine.
//!
//! `ACTIVE ⇄ CLOSED`. Every transition returns the new status plus the event
//! kind to log; illegal moves (closing a closed thread, reopening an active
//! one or one outside the reopen window) are errors, never no-ops.

use chrono::{DateTime, Duration, Utc};

use crate::error::TransitionError;
use crate::model::{ThreadEventKind, ThreadStatus};

/// Status of a brand-new thread.
pub fn activate() -> (ThreadStatus, ThreadEventKind) {
    (ThreadStatus::Active, ThreadEventKind::Created)
}

/// ACTIVE → CLOSED at `now`.
pub fn close(
    status: &ThreadStatus,
    now: DateTime<Utc>,
) -> Result<(ThreadStatus, ThreadEventKind), TransitionError> {
    match status {
        ThreadStatus::Active => Ok((ThreadStatus::Closed { closed_at: now }, ThreadEventKind::Closed)),
        ThreadStatus::Closed { .. } => Err(TransitionError::AlreadyClosed),
    }
}

/// CLOSED → ACTIVE, only while `now - closed_at <= window`.
pub fn reopen(
    status: &ThreadStatus,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<(ThreadStatus, ThreadEventKind), TransitionError> {
    match status {
        ThreadStatus::Active => Err(TransitionError::AlreadyActive),
        ThreadStatus::Closed { closed_at } if now - *closed_at <= window => {
            Ok((ThreadStatus::Active, ThreadEventKind::Reopened))
        }
        ThreadStatus::Closed { closed_at } => Err(TransitionError::OutsideReopenWindow {
            closed_at: *closed_at,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
    }

    #[test]
    fn close_then_reopen_inside_window() {
        let (s, ev) = activate();
        assert_eq!(ev, ThreadEventKind::Created);
        let (s, ev) = close(&s, t0()).unwrap();
        assert_eq!(ev, ThreadEventKind::Closed);
        assert_eq!(s.closed_at(), Some(t0()));
        let (s, ev) = reopen(&s, t0() + Duration::hours(10), Duration::hours(72)).unwrap();
        assert_eq!(ev, ThreadEventKind::Reopened);
        assert!(s.is_active());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let active = ThreadStatus::Active;
        assert_eq!(
            reopen(&active, t0(), Duration::hours(72)),
            Err(TransitionError::AlreadyActive)
        );
        let closed = ThreadStatus::Closed { closed_at: t0() };
        assert_eq!(close(&closed, t0()), Err(TransitionError::AlreadyClosed));
    }

    #[test]
    fn reopen_outside_window_fails() {
        let closed = ThreadStatus::Closed { closed_at: t0() };
        let r = reopen(&closed, t0() + Duration::hours(100), Duration::hours(72));
        assert_eq!(r, Err(TransitionError::OutsideReopenWindow { closed_at: t0() }));
    }
}
