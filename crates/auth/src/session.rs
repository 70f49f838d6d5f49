//! Activity-based session validity.

use chrono::{DateTime, Duration, Utc};

/// Default inactivity timeout.
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 30;

/// `true` iff there was activity and `now - last_activity < timeout`.
///
/// An absent timestamp is never valid.
pub fn session_is_valid(
    last_activity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    timeout: Duration,
) -> bool {
    match last_activity {
        Some(last) => now - last < timeout,
        None => false,
    }
}

/// Tracks the last user-initiated interaction of one actor.
///
/// Validity is recomputed lazily on every check; nothing sweeps in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTracker {
    last_activity: Option<DateTime<Utc>>,
    timeout: Duration,
}

impl SessionTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_activity: None,
            timeout,
        }
    }

    /// Resume from a persisted timestamp.
    pub fn resume(last_activity: Option<DateTime<Utc>>, timeout: Duration) -> Self {
        Self {
            last_activity,
            timeout,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        session_is_valid(self.last_activity, now, self.timeout)
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_SESSION_TIMEOUT_MINUTES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn fresh_tracker_is_invalid() {
        assert!(!SessionTracker::default().is_valid(t0()));
    }

    #[test]
    fn double_touch_stays_valid() {
        let mut s = SessionTracker::default();
        s.touch(t0());
        assert!(s.is_valid(t0()));
        s.touch(t0());
        assert!(s.is_valid(t0()));
    }

    #[test]
    fn expires_at_timeout_boundary() {
        let mut s = SessionTracker::default();
        s.touch(t0());
        let timeout = Duration::minutes(DEFAULT_SESSION_TIMEOUT_MINUTES);
        assert!(s.is_valid(t0() + timeout - Duration::milliseconds(1)));
        assert!(!s.is_valid(t0() + timeout));
    }

    #[test]
    fn touch_extends_validity() {
        let mut s = SessionTracker::new(Duration::minutes(30));
        s.touch(t0());
        s.touch(t0() + Duration::minutes(20));
        assert!(s.is_valid(t0() + Duration::minutes(45)));
    }

    proptest! {
        /// Property: validity is exactly "elapsed < timeout".
        #[test]
        fn validity_matches_elapsed(elapsed_secs in 0i64..7_200, timeout_mins in 1i64..120) {
            let timeout = Duration::minutes(timeout_mins);
            let s = SessionTracker::resume(Some(t0()), timeout);
            let now = t0() + Duration::seconds(elapsed_secs);
            prop_assert_eq!(s.is_valid(now), Duration::seconds(elapsed_secs) < timeout);
        }
    }
}
