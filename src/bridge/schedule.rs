use std::time::Duration;

/// Calls per hour Untappd grants a client.
pub const UNTAPPD_CALLS_PER_HOUR: u32 = 100;

/// Minutes between polls so that one call per user per poll stays within
/// `calls_per_hour`. An empty roster is treated as a single user.
pub fn poll_interval_minutes(num_users: usize, calls_per_hour: u32) -> u64 {
    let users = num_users.max(1) as u64;
    let calls = u64::from(calls_per_hour.max(1));
    // ceil(60 / (calls / users)) == ceil(60 * users / calls)
    (60 * users).div_ceil(calls)
}

pub fn poll_interval(num_users: usize, calls_per_hour: u32) -> Duration {
    Duration::from_secs(poll_interval_minutes(num_users, calls_per_hour) * 60)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(1 => 1; "single user")]
    #[test_case(3 => 20; "three users")]
    #[test_case(7 => 9; "seven users round up")]
    #[test_case(100 => 60; "one call per user per hour")]
    #[test_case(150 => 90; "more users than calls")]
    #[test_case(0 => 1; "empty roster counts as one")]
    fn interval_for_roster(num_users: usize) -> u64 {
        poll_interval_minutes(num_users, UNTAPPD_CALLS_PER_HOUR)
    }

    #[test]
    fn interval_never_exceeds_quota() {
        for users in 1..=250usize {
            let minutes = poll_interval_minutes(users, UNTAPPD_CALLS_PER_HOUR);
            let calls_per_hour = users as f64 * 60.0 / minutes as f64;
            assert!(calls_per_hour <= f64::from(UNTAPPD_CALLS_PER_HOUR) + 1e-9);
        }
    }

    #[test]
    fn interval_as_duration() {
        assert_eq!(
            poll_interval(3, UNTAPPD_CALLS_PER_HOUR),
            Duration::from_secs(20 * 60)
        );
    }
}
