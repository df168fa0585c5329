use std::{env, path::PathBuf, time::Duration};
use uuid::Uuid;

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("PARTY_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3003)
}

/// Party this process serves: `PARTY_ID`, else the first CLI argument.
pub fn party_id() -> Option<Uuid> {
    env::var("PARTY_ID")
        .ok()
        .or_else(|| env::args().nth(1))
        .and_then(|v| v.trim().parse().ok())
}

pub fn registry_url() -> String {
    env::var("REGISTRY_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string())
}

pub fn registry_timeout() -> Duration {
    let millis = env::var("REGISTRY_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(1500);
    Duration::from_millis(millis)
}

/// Local TOML registry; replaces the HTTP registry when set.
pub fn registry_file() -> Option<PathBuf> {
    env::var_os("REGISTRY_FILE")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

pub fn tick_interval() -> Duration {
    let rate = env::var("TICK_RATE")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|rate| *rate > 0)
        .unwrap_or(DEFAULT_TICK_RATE);
    Duration::from_secs_f64(1.0 / f64::from(rate))
}

pub fn end_grace() -> Duration {
    let millis = env::var("END_GRACE_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(1000);
    Duration::from_millis(millis)
}

pub const DEFAULT_TICK_RATE: u32 = 120;
pub const COMMAND_CHANNEL_CAPACITY: usize = 1024;
pub const SUBSCRIPTION_QUEUE_CAPACITY: usize = 1024;
