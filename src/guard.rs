/// Attempt ledger: the counter + ban-window policy shared by the login
/// throttle and the OTP confirmation throttle
///
/// The policy itself is pure and takes an explicit `now`, so callers (and
/// tests) control the clock. Persisting the resulting counter and ban-expiry
/// values is the Account Directory's job.
use chrono::{DateTime, Duration, Utc};

/// One throttle policy instance
#[derive(Debug, Clone, Copy)]
pub struct AttemptPolicy {
    /// Failures at which the ban triggers
    pub threshold: u32,
    /// Ban window length in seconds
    pub ban_secs: i64,
}

/// Login throttle: 5 failed password checks lock sign-in for 15 minutes
pub const LOGIN_POLICY: AttemptPolicy = AttemptPolicy {
    threshold: 5,
    ban_secs: 15 * 60,
};

/// OTP confirmation throttle: 5 wrong codes lock confirmation for 5 minutes
pub const OTP_POLICY: AttemptPolicy = AttemptPolicy {
    threshold: 5,
    ban_secs: 5 * 60,
};

/// Outcome of registering a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureVerdict {
    /// Attempts remain; counter has moved to `total_attempts`
    Retry {
        attempts_left: u32,
        total_attempts: u32,
    },
    /// Threshold reached; ban window starts now
    Banned { until: DateTime<Utc> },
}

/// Active ban details returned by `check_ban`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanActive {
    pub expires_at: DateTime<Utc>,
    pub minutes_left: i64,
}

impl AttemptPolicy {
    /// Reject while a ban window is open. No counter movement while banned.
    pub fn check_ban(
        &self,
        ban_expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), BanActive> {
        match ban_expires_at {
            Some(expires_at) if expires_at > now => {
                // Ceil to whole minutes so "0 minutes left" never shows
                let secs = (expires_at - now).num_seconds();
                let minutes_left = (secs + 59) / 60;
                Err(BanActive {
                    expires_at,
                    minutes_left,
                })
            }
            _ => Ok(()),
        }
    }

    /// Register one failure on top of `attempts_before` and decide whether
    /// the ban triggers
    pub fn register_failure(&self, attempts_before: u32, now: DateTime<Utc>) -> FailureVerdict {
        let total_attempts = attempts_before + 1;

        if total_attempts >= self.threshold {
            FailureVerdict::Banned {
                until: now + Duration::seconds(self.ban_secs),
            }
        } else {
            FailureVerdict::Retry {
                attempts_left: self.threshold - total_attempts,
                total_attempts,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_no_ban_when_expiry_absent() {
        assert!(LOGIN_POLICY.check_ban(None, now()).is_ok());
    }

    #[test]
    fn test_no_ban_once_window_elapsed() {
        let t = now();
        let expired = Some(t - Duration::seconds(1));
        assert!(LOGIN_POLICY.check_ban(expired, t).is_ok());
    }

    #[test]
    fn test_active_ban_reports_remaining_minutes() {
        let t = now();
        let ban = LOGIN_POLICY
            .check_ban(Some(t + Duration::seconds(14 * 60 + 30)), t)
            .unwrap_err();

        // 14m30s rounds up to 15
        assert_eq!(ban.minutes_left, 15);
    }

    #[test]
    fn test_failures_count_down_to_ban() {
        let t = now();

        for before in 0..4 {
            match LOGIN_POLICY.register_failure(before, t) {
                FailureVerdict::Retry {
                    attempts_left,
                    total_attempts,
                } => {
                    assert_eq!(total_attempts, before + 1);
                    assert_eq!(attempts_left, 5 - total_attempts);
                }
                FailureVerdict::Banned { .. } => panic!("banned too early"),
            }
        }

        // Fifth failure triggers the ban
        match LOGIN_POLICY.register_failure(4, t) {
            FailureVerdict::Banned { until } => {
                assert_eq!(until, t + Duration::seconds(15 * 60));
            }
            FailureVerdict::Retry { .. } => panic!("expected ban at threshold"),
        }
    }

    #[test]
    fn test_otp_policy_ban_window_is_five_minutes() {
        let t = now();
        match OTP_POLICY.register_failure(4, t) {
            FailureVerdict::Banned { until } => {
                assert_eq!(until, t + Duration::seconds(5 * 60));
            }
            FailureVerdict::Retry { .. } => panic!("expected ban at threshold"),
        }
    }
}
