// src/threads/cooldown.rs
use chrono::{DateTime, Duration, Utc};

/// Per-thread cooldown gate for sentiment-shift alerts.
/// - First alert always allowed.
/// - Inside cooldown, alerts are suppressed.
/// - The anchor only moves when an alert actually fires; suppressed
///   alerts leave it untouched.
#[derive(Debug, Clone, Copy)]
pub struct Cooldown {
    window: Duration,
}

impl Cooldown {
    /// Negative windows are treated as zero (no cooldown).
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.max(Duration::zero()),
        }
    }

    /// May we alert at `now` given the last fired alert? Does NOT mutate state.
    pub fn allows(&self, last_notified_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_notified_at {
            None => true,
            Some(ts) => now.signed_duration_since(ts) >= self.window,
        }
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
    fn first_alert_passes() {
        let cd = Cooldown::new(Duration::hours(4));
        assert!(cd.allows(None, t0()));
    }

    #[test]
    fn inside_cooldown_blocked() {
        let cd = Cooldown::new(Duration::hours(4));
        assert!(!cd.allows(Some(t0()), t0() + Duration::minutes(120)));
    }

    #[test]
    fn after_cooldown_passes() {
        let cd = Cooldown::new(Duration::hours(4));
        assert!(cd.allows(Some(t0()), t0() + Duration::hours(4)));
        assert!(cd.allows(Some(t0()), t0() + Duration::hours(5)));
    }

    #[test]
    fn negative_window_means_no_cooldown() {
        let cd = Cooldown::new(Duration::hours(-1));
        assert!(cd.allows(Some(t0()), t0()));
    }
}
