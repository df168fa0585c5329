use std::{
    sync::{
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

fn seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Process-unique id for log correlation (bridge connections, bus subscriptions).
///
/// Seeded from the clock once, then strictly increasing, so ids from
/// different restarts rarely collide in aggregated logs.
pub fn rand_id() -> u64 {
    static NEXT: OnceLock<AtomicU64> = OnceLock::new();
    NEXT.get_or_init(|| AtomicU64::new(seed()))
        .fetch_add(1, Ordering::Relaxed)
}
