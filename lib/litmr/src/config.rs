use crate::constants::*;
use crate::slurm::SlurmEnv;
use crate::utils::{env_parse, env_var_truthy, local_run_id};
use std::path::PathBuf;
use std::time::Duration;

/// Where map and reduce work runs.
#[derive(Clone, Debug)]
pub enum Topology {
    /// Everything in this process; `tasks` logical map tasks.
    Local { tasks: usize },
    /// One process per Slurm rank; each rank runs `local_subtasks` map tasks and one reducer.
    Slurm { env: SlurmEnv, local_subtasks: usize },
}

impl Topology {
    pub fn is_slurm(&self) -> bool { matches!(self, Topology::Slurm { .. }) }

    pub fn node_id(&self) -> usize {
        match self {
            Topology::Local { .. } => 0,
            Topology::Slurm { env, .. } => env.node_id,
        }
    }
}

/// Runtime tuning for one engine instance, shared by every stage it runs.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub topology: Topology,
    /// Size of the rayon pool; `None` uses the global pool.
    pub threads: Option<usize>,
    /// Reducer partitions; defaults to the number of map tasks (local) or ranks (Slurm).
    pub num_reducers: Option<usize>,
    /// Maximum byte length of one input split.
    pub split_bytes: u64,
    pub flush_bytes: usize,
    pub flush_interval: Duration,
    pub writer_queue_cap: usize,
    pub local_batch_bytes: usize,
    /// Map-side pre-aggregation for reducers that expose a combiner.
    pub combine: bool,
    /// Distinct keys held by one map task's combine table before it spills.
    pub combine_max_keys: usize,
    pub keep_intermediates: bool,
    pub work_dir: PathBuf,
    pub barrier_timeout: Duration,
    /// Run identifier; stage work directories live under `work_dir/run_id/`.
    pub run_id: String,
}

impl EngineConfig {
    /// Local, single-process configuration with fixed defaults and no environment lookups.
    pub fn local() -> Self {
        Self {
            topology: Topology::Local { tasks: num_cpus::get().max(1) },
            threads: None,
            num_reducers: None,
            split_bytes: DEFAULT_SPLIT_BYTES,
            flush_bytes: DEFAULT_FLUSH_BYTES,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            writer_queue_cap: DEFAULT_WRITER_QUEUE_CAP,
            local_batch_bytes: DEFAULT_LOCAL_BATCH_BYTES,
            combine: true,
            combine_max_keys: DEFAULT_COMBINE_MAX_KEYS,
            keep_intermediates: false,
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            barrier_timeout: Duration::from_secs(DEFAULT_BARRIER_TIMEOUT_SECS),
            run_id: local_run_id(),
        }
    }

    pub fn from_env() -> Self {
        let mut cfg = Self::local();
        cfg.topology = match SlurmEnv::detect() {
            Ok(env) => {
                let local_subtasks = env_parse::<usize>(ENV_LOCAL_SUBTASKS)
                    .or_else(SlurmEnv::cpus_per_task)
                    .unwrap_or_else(num_cpus::get)
                    .max(1);
                cfg.run_id = env.run_id();
                Topology::Slurm { env, local_subtasks }
            }
            Err(_) => {
                let tasks = env_parse::<usize>(ENV_LOCAL_TASKS).unwrap_or_else(num_cpus::get);
                Topology::Local { tasks: tasks.max(1) }
            }
        };
        cfg.threads = env_parse::<usize>(ENV_THREADS)
            .or_else(SlurmEnv::cpus_per_task)
            .filter(|&n| n > 0);
        cfg.num_reducers = env_parse::<usize>(ENV_NUM_REDUCERS).filter(|&n| n > 0);
        if let Some(v) = env_parse::<u64>(ENV_SPLIT_BYTES).filter(|&n| n > 0) { cfg.split_bytes = v; }
        if let Some(v) = env_parse::<usize>(ENV_FLUSH_BYTES) { cfg.flush_bytes = v; }
        if let Some(v) = env_parse::<u64>(ENV_FLUSH_INTERVAL_MS) { cfg.flush_interval = Duration::from_millis(v); }
        if let Some(v) = env_parse::<usize>(ENV_WRITER_QUEUE_CAP).filter(|&n| n > 0) { cfg.writer_queue_cap = v; }
        if let Some(v) = env_parse::<usize>(ENV_LOCAL_BATCH_BYTES).filter(|&n| n > 0) { cfg.local_batch_bytes = v; }
        if std::env::var(ENV_COMBINE).is_ok() { cfg.combine = env_var_truthy(ENV_COMBINE); }
        if let Some(v) = env_parse::<usize>(ENV_COMBINE_MAX_KEYS).filter(|&n| n > 0) { cfg.combine_max_keys = v; }
        cfg.keep_intermediates = env_var_truthy(ENV_KEEP_INTERMEDIATES);
        if let Ok(v) = std::env::var(ENV_WORK_DIR) { cfg.work_dir = PathBuf::from(v); }
        if let Some(v) = env_parse::<u64>(ENV_BARRIER_TIMEOUT_SECS) { cfg.barrier_timeout = Duration::from_secs(v); }
        cfg
    }

    pub fn with_tasks(mut self, tasks: usize) -> Self {
        self.topology = Topology::Local { tasks: tasks.max(1) };
        self
    }

    pub fn with_reducers(mut self, reducers: usize) -> Self {
        self.num_reducers = Some(reducers.max(1));
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    pub fn with_split_bytes(mut self, split_bytes: u64) -> Self {
        self.split_bytes = split_bytes.max(1);
        self
    }

    pub fn with_combine(mut self, combine: bool) -> Self {
        self.combine = combine;
        self
    }

    pub fn with_combine_max_keys(mut self, max_keys: usize) -> Self {
        self.combine_max_keys = max_keys.max(1);
        self
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    pub fn with_local_batch_bytes(mut self, bytes: usize) -> Self {
        self.local_batch_bytes = bytes.max(1);
        self
    }

    pub fn stage_work_dir(&self, stage: &str) -> PathBuf {
        self.work_dir.join(&self.run_id).join(stage)
    }
}

impl Default for EngineConfig {
    fn default() -> Self { Self::local() }
}
