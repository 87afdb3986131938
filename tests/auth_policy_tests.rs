/// Tests for the auth policy arithmetic
///
/// Note: These are unit tests that verify the logic is correct.
/// Integration tests would require a running server.

#[cfg(test)]
mod tests {
    // Test numeric OTP generation
    #[test]
    fn test_otp_generation() {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let otp: String = (0..6)
            .map(|_| char::from(b'0' + rng.gen_range(0..10)))
            .collect();

        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_otps_are_not_constant() {
        use rand::Rng;
        use std::collections::HashSet;

        let mut codes = HashSet::new();
        for _ in 0..100 {
            let mut rng = rand::thread_rng();
            let otp: String = (0..6)
                .map(|_| char::from(b'0' + rng.gen_range(0..10)))
                .collect();
            codes.insert(otp);
        }

        // 100 draws from a million-code space virtually never collapse to
        // one value
        assert!(codes.len() > 1);
    }

    #[test]
    fn test_authorization_header_parsing() {
        let auth_header = "Bearer abc123token";
        let mut parts = auth_header.splitn(2, ' ');
        assert_eq!(parts.next(), Some("Bearer"));
        assert_eq!(parts.next(), Some("abc123token"));

        let admin_header = "admin abc123token";
        let mut parts = admin_header.splitn(2, ' ');
        assert_eq!(parts.next(), Some("admin"));

        let bare_token = "abc123token";
        let mut parts = bare_token.splitn(2, ' ');
        parts.next();
        assert_eq!(parts.next(), None);
    }

    #[test]
    fn test_resend_cooldown_arithmetic() {
        // A 5-minute OTP blocks resends while more than 4 minutes of
        // validity remain
        let ttl_secs: i64 = 5 * 60;
        let cooldown_secs: i64 = 60;
        let threshold_ms = (ttl_secs - cooldown_secs) * 1000;

        // 4m30s remaining: blocked, 30s to wait
        let remaining_ms = 270_000;
        assert!(remaining_ms > threshold_ms);
        let seconds_left = (remaining_ms - threshold_ms + 999) / 1000;
        assert_eq!(seconds_left, 30);

        // 3m59s remaining: resend allowed
        let remaining_ms = 239_000;
        assert!(remaining_ms <= threshold_ms);
    }

    #[test]
    fn test_ban_minutes_round_up() {
        // 14m30s of ban left reads as 15 minutes, never 0
        let secs: i64 = 14 * 60 + 30;
        assert_eq!((secs + 59) / 60, 15);

        let secs: i64 = 1;
        assert_eq!((secs + 59) / 60, 1);
    }

    #[test]
    fn test_attempts_left_never_negative() {
        let threshold: u32 = 5;
        for attempts in 0..10u32 {
            let left = threshold.saturating_sub(attempts);
            assert!(left <= 5);
        }
    }
}
