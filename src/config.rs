use std::time::Duration;

/// Upper bound SQS accepts for `MaxNumberOfMessages`.
pub const MAX_MESSAGES_LIMIT: u8 = 10;
/// Upper bound SQS accepts for `WaitTimeSeconds`.
pub const WAIT_TIME_LIMIT: u8 = 20;

pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub batch_timeout: Duration,
    pub max_messages: u8,
    pub wait_time_seconds: u8,
    pub stats_interval: Duration,
    pub receive_error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            max_messages: MAX_MESSAGES_LIMIT,
            wait_time_seconds: WAIT_TIME_LIMIT,
            stats_interval: DEFAULT_STATS_INTERVAL,
            receive_error_backoff: DEFAULT_RECEIVE_ERROR_BACKOFF,
        }
    }
}

impl WorkerConfig {
    /// Build a config, clamping the poll parameters into the ranges the
    /// queue accepts.
    pub fn new(batch_timeout: Duration, max_messages: u8, wait_time_seconds: u8) -> Self {
        Self {
            batch_timeout,
            max_messages: max_messages.clamp(1, MAX_MESSAGES_LIMIT),
            wait_time_seconds: wait_time_seconds.min(WAIT_TIME_LIMIT),
            ..Self::default()
        }
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn with_receive_error_backoff(mut self, backoff: Duration) -> Self {
        self.receive_error_backoff = backoff;
        self
    }
}

/// Fully-qualified zone name (e.g. shop.example.com.) for a registry domain.
pub fn zone_name(domain: &str) -> String {
    format!("{}.", domain.trim_end_matches('.'))
}
