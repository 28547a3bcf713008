//! Crate-wide constants.

/// Canonical sample rate for decoded audio (Hz).
pub const SAMPLE_RATE: u32 = 16_000;

/// Default queue name when none is configured.
pub const DEFAULT_QUEUE: &str = "transcribe";

/// Default number of pipeline workers.
pub const DEFAULT_WORKERS: usize = 2;

/// Default upload size cap in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 200;

/// Default language when neither a hint nor a detection signal is available.
pub const DEFAULT_LANGUAGE: &str = "th";

/// Default lease time-to-live. Leases are renewed only at stage
/// boundaries, so the TTL must cover the full stage budget.
pub const DEFAULT_LEASE_TTL: &str = "10m";

/// Default per-stage execution budget.
pub const DEFAULT_STAGE_TIMEOUT: &str = "5m";

/// Default artifact retention window.
pub const DEFAULT_RETENTION_WINDOW: &str = "30d";

/// Default interval between retention sweeps.
pub const DEFAULT_SWEEP_INTERVAL: &str = "1h";

/// Default interval between orphaned-lease recovery sweeps.
pub const DEFAULT_RECOVERY_INTERVAL: &str = "10s";

/// How many times an orphaned job may be re-queued before it is failed.
pub const DEFAULT_REQUEUE_LIMIT: u32 = 2;
