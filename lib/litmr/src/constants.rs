//! Centralized environment variable names and default values for litmr runtime tuning.

// Environment variable names
pub const ENV_KEEP_INTERMEDIATES: &str = "LITMR_KEEP_INTERMEDIATES";
pub const ENV_THREADS: &str = "LITMR_THREADS";
pub const ENV_NUM_REDUCERS: &str = "LITMR_NUM_REDUCERS";
pub const ENV_LOCAL_TASKS: &str = "LITMR_LOCAL_TASKS";
pub const ENV_LOCAL_SUBTASKS: &str = "LITMR_LOCAL_SUBTASKS";
pub const ENV_SPLIT_BYTES: &str = "LITMR_SPLIT_BYTES";
pub const ENV_FLUSH_BYTES: &str = "LITMR_FLUSH_BYTES";
pub const ENV_FLUSH_INTERVAL_MS: &str = "LITMR_FLUSH_INTERVAL_MS";
pub const ENV_WRITER_QUEUE_CAP: &str = "LITMR_WRITER_QUEUE_CAP";
pub const ENV_LOCAL_BATCH_BYTES: &str = "LITMR_LOCAL_BATCH_BYTES";
pub const ENV_COMBINE: &str = "LITMR_COMBINE";
pub const ENV_COMBINE_MAX_KEYS: &str = "LITMR_COMBINE_MAX_KEYS";
pub const ENV_WORK_DIR: &str = "LITMR_WORK_DIR";
pub const ENV_BARRIER_TIMEOUT_SECS: &str = "LITMR_BARRIER_TIMEOUT_SECS";
/// Sentiment lexicon location used by the job binaries when `--lexicon` is absent
pub const ENV_LEXICON: &str = "LITMR_LEXICON";
/// Optional `word<TAB>lemma` table used by the word frequency jobs
pub const ENV_LEMMAS: &str = "LITMR_LEMMAS";

// Defaults
pub const DEFAULT_LOCAL_BATCH_BYTES: usize = 256 * 1024; // per partition, per map task
pub const DEFAULT_WRITER_QUEUE_CAP: usize = 1024;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 200;
pub const DEFAULT_FLUSH_BYTES: usize = 16 * 1024 * 1024; // 16 MiB
pub const DEFAULT_SPLIT_BYTES: u64 = 64 * 1024 * 1024; // 64 MiB input splits
pub const DEFAULT_COMBINE_MAX_KEYS: usize = 200_000;
pub const DEFAULT_WORK_DIR: &str = ".litmr_runs";
pub const DEFAULT_BARRIER_TIMEOUT_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_LEXICON: &str = "AFINN-lexicon.txt";

/// Marker written last into a stage output; its presence means the artifact is complete.
pub const SUCCESS_MARKER: &str = "_SUCCESS";
pub const STATS_FILE: &str = "_STATS.json";
