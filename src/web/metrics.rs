use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);
static POLLS_COMPLETED: AtomicU64 = AtomicU64::new(0);
static CHECKINS_ANNOUNCED: AtomicU64 = AtomicU64::new(0);
static LINES_DELIVERED: AtomicU64 = AtomicU64::new(0);
static UPSTREAM_FAILURES: AtomicU64 = AtomicU64::new(0);
static BACKFILL_RETRIES: AtomicU64 = AtomicU64::new(0);
static QUEUE_DEPTH: AtomicU64 = AtomicU64::new(0);

pub struct Metrics;

impl Metrics {
    /// Pins the uptime origin; called once at startup.
    pub fn init() {
        Lazy::force(&STARTED_AT);
    }

    pub fn poll_completed() {
        POLLS_COMPLETED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn checkin_announced() {
        CHECKINS_ANNOUNCED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn line_delivered() {
        LINES_DELIVERED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upstream_failure() {
        UPSTREAM_FAILURES.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backfill_retry() {
        BACKFILL_RETRIES.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_queue_depth(depth: u64) {
        QUEUE_DEPTH.store(depth, Ordering::Relaxed);
    }

    pub fn uptime_seconds() -> u64 {
        STARTED_AT.elapsed().as_secs()
    }
}

pub fn format_prometheus() -> String {
    format!(
        r#"# HELP bridge_uptime_seconds Number of seconds the bridge has been running
# TYPE bridge_uptime_seconds gauge
bridge_uptime_seconds {}

# HELP untappd_polls_completed_total Number of completed poll cycles over the roster
# TYPE untappd_polls_completed_total counter
untappd_polls_completed_total {}

# HELP untappd_checkins_announced_total Number of new check-ins announced
# TYPE untappd_checkins_announced_total counter
untappd_checkins_announced_total {}

# HELP untappd_upstream_failures_total Number of failed live poll requests
# TYPE untappd_upstream_failures_total counter
untappd_upstream_failures_total {}

# HELP untappd_backfill_retries_total Number of backfill requests retried after backoff
# TYPE untappd_backfill_retries_total counter
untappd_backfill_retries_total {}

# HELP irc_lines_delivered_total Number of lines handed to the irc connection
# TYPE irc_lines_delivered_total counter
irc_lines_delivered_total {}

# HELP irc_queue_depth Lines waiting in the delivery queue
# TYPE irc_queue_depth gauge
irc_queue_depth {}
"#,
        Metrics::uptime_seconds(),
        POLLS_COMPLETED.load(Ordering::Relaxed),
        CHECKINS_ANNOUNCED.load(Ordering::Relaxed),
        UPSTREAM_FAILURES.load(Ordering::Relaxed),
        BACKFILL_RETRIES.load(Ordering::Relaxed),
        LINES_DELIVERED.load(Ordering::Relaxed),
        QUEUE_DEPTH.load(Ordering::Relaxed),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_only_grow() {
        let before = POLLS_COMPLETED.load(Ordering::Relaxed);
        Metrics::poll_completed();
        Metrics::checkin_announced();
        Metrics::upstream_failure();
        assert!(POLLS_COMPLETED.load(Ordering::Relaxed) > before);
        assert!(CHECKINS_ANNOUNCED.load(Ordering::Relaxed) >= 1);
        assert!(UPSTREAM_FAILURES.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn format_prometheus_includes_all_metrics() {
        let output = format_prometheus();
        assert!(output.contains("bridge_uptime_seconds"));
        assert!(output.contains("untappd_polls_completed_total"));
        assert!(output.contains("untappd_checkins_announced_total"));
        assert!(output.contains("untappd_backfill_retries_total"));
        assert!(output.contains("irc_lines_delivered_total"));
        assert!(output.contains("irc_queue_depth"));
    }
}
