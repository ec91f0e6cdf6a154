use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmEnv {
    pub job_id: String,
    pub ntasks: usize,
    pub node_id: usize,
    pub node_list: String,
    /// Requeue count; part of the run id so a restarted job never sees stale barriers.
    pub restart_count: usize,
}

impl SlurmEnv {
    pub fn detect() -> Result<Self> {
        let job_id = env::var("SLURM_JOB_ID").context("SLURM_JOB_ID not set")?;
        let ntasks = env::var("SLURM_NTASKS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .or_else(|| env::var("SLURM_TASKS_PER_NODE").ok().and_then(|s| s.split(',').next().and_then(|x| x.parse::<usize>().ok())))
            .unwrap_or(1);
        let node_id = env::var("SLURM_PROCID").ok().and_then(|v| v.parse().ok()).unwrap_or(0);
        let node_list = env::var("SLURM_NODELIST").unwrap_or_else(|_| "localhost".to_string());
        let restart_count = env::var("SLURM_RESTART_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(0);
        Ok(Self { job_id, ntasks: ntasks.max(1), node_id, node_list, restart_count })
    }

    pub fn is_slurm() -> bool { env::var("SLURM_JOB_ID").is_ok() }

    pub fn cpus_per_task() -> Option<usize> {
        env::var("SLURM_CPUS_PER_TASK").ok().and_then(|v| v.parse::<usize>().ok()).filter(|&n| n > 0)
    }

    pub fn run_id(&self) -> String {
        format!("{}-r{}", self.job_id, self.restart_count)
    }
}
