// Engine constants (no magic values at call sites)

/// Delay between successive job status queries (1.5s)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1500;

/// Hard ceiling on a single poll's total wait (45s)
pub const DEFAULT_POLL_MAX_WAIT_MS: u64 = 45_000;

/// Request-level timeout on a submission call (10s)
pub const DEFAULT_SUBMIT_TIMEOUT_MS: u64 = 10_000;
