use crate::api::{ExecutablePipeline, Mapper, Reducer};
use crate::config::{EngineConfig, Topology};
use crate::constants::{STATS_FILE, SUCCESS_MARKER};
use crate::error::Error;
use crate::io::{ensure_dir, for_each_line_in_split, hash_to_partition, list_input_files, open_writer, plan_splits, read_bin_line, write_success_marker, InputSplit};
use crate::sort::{external_sort_by_key, SortOutcome};
use crate::stats::{MapTaskStats, StageReport, StatsCollector};
use crate::writer::{ThreadWriter, WriterPool};
use anyhow::{anyhow, bail, Context, Result};
use memmap2::Mmap;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Clone, Debug)]
struct ReduceStats {
    reducer: usize,
    lines_in: u64,
    groups: u64,
    wall_ms: u64,
}

/// One map/shuffle/reduce stage over text inputs.
///
/// Inputs are files or directories of line records. The output directory is
/// cleared at start and, once every reducer partition is written, receives
/// `_STATS.json` and finally `_SUCCESS`.
pub struct RuntimePipeline {
    name: String,
    config: EngineConfig,
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
}

impl RuntimePipeline {
    pub fn new(config: EngineConfig) -> Self { Self { name: "stage".to_string(), config, inputs: vec![], output: None } }

    /// Stage name; selects the work directory under the run root.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    fn run<M, R>(&self, mapper: &M, reducer: &R) -> Result<StageReport>
    where
        M: Mapper + Sync,
        R: Reducer<Key = M::Key, ValueIn = M::Value> + Sync,
    {
        let cfg = &self.config;
        let output_dir = self.output.clone().context("output not set")?;
        if self.inputs.is_empty() {
            bail!("stage {} has no inputs", self.name);
        }
        for inp in &self.inputs {
            if !inp.exists() {
                return Err(Error::SourceUnavailable { path: inp.clone(), reason: "input not found".into() }.into());
            }
            if inp.starts_with(&output_dir) {
                bail!("input {} lies inside output {}", inp.display(), output_dir.display());
            }
        }

        let is_slurm = cfg.topology.is_slurm();
        let node_id = cfg.topology.node_id();
        let (ranks, local_subtasks, local_tasks) = match &cfg.topology {
            Topology::Local { tasks } => (1usize, 1usize, *tasks),
            Topology::Slurm { env, local_subtasks } => (env.ntasks.max(1), *local_subtasks, 0),
        };

        let launch_root = cfg.stage_work_dir(&self.name);
        let map_out_dir = launch_root.join("map_out");
        let sort_out_dir = launch_root.join("sort_out");

        // Prepare output and work directories (clean them before starting)
        if !is_slurm || node_id == 0 {
            if output_dir.exists() {
                fs::remove_dir_all(&output_dir).with_context(|| format!("clear output {}", output_dir.display()))?;
            }
            ensure_dir(&output_dir)?;
            ensure_dir(&map_out_dir)?;
            ensure_dir(&sort_out_dir)?;
            if is_slurm {
                write_barrier(&launch_root, "output_cleared", 0)?;
            }
        } else {
            wait_for_barrier(&launch_root, "output_cleared", 1, cfg.barrier_timeout)?;
        }

        // inputs
        let mut all_files = Vec::new();
        for inp in &self.inputs {
            all_files.append(&mut list_input_files(inp)?);
        }
        let splits = plan_splits(&all_files, cfg.split_bytes)?;

        // Determine task topology
        let global_ntasks_raw = if is_slurm { ranks * local_subtasks } else { local_tasks.max(1) };
        let global_ntasks = global_ntasks_raw.min(splits.len().max(1));

        // partition splits among logical tasks
        let mut chunks: Vec<Vec<InputSplit>> = vec![Vec::new(); global_ntasks];
        for (idx, split) in splits.iter().enumerate() {
            chunks[idx % global_ntasks].push(split.clone());
        }

        let default_reducers = if is_slurm { ranks } else { global_ntasks };
        let num_reducers = cfg.num_reducers.unwrap_or(default_reducers).max(1);

        let fd_limit = get_fd_soft_limit();
        info!(
            stage = %self.name, slurm = is_slurm, run_id = %cfg.run_id, node_id, ntasks = global_ntasks,
            splits = splits.len(), num_reducers, combine = cfg.combine,
            fd_soft_limit = fd_limit.unwrap_or(0),
            "litmr starting map phase"
        );

        let mut collector = StatsCollector::new();

        // Map phase
        let my_task_ids: Vec<usize> = if is_slurm {
            // this process's logical subtasks: ids are node_id + k * ranks
            (0..local_subtasks).map(|k| node_id + k * ranks).filter(|&id| id < global_ntasks).collect()
        } else {
            (0..global_ntasks).collect()
        };
        let map_phase_start = Instant::now();
        let (writer_pool, mut writer_joiner) =
            WriterPool::new(&map_out_dir, node_id, num_reducers, cfg.flush_bytes, cfg.flush_interval, cfg.writer_queue_cap)?;
        let map_result: Result<Vec<MapTaskStats>> = my_task_ids
            .par_iter()
            .map(|&task_id| run_map_task(task_id, &chunks[task_id], mapper, reducer, &writer_pool, cfg, num_reducers))
            .collect();
        // Ensure all writers are closed before proceeding, even when a task failed
        writer_pool.close_all();
        let join_result = writer_joiner.join_all();
        let map_stats = map_result?;
        join_result?;
        for m in writer_pool.metrics_snapshot() {
            debug!(max_queue_len = m.max_queue_len, enq_bytes = m.enq_bytes, bytes_written = m.bytes_written, write_calls = m.write_calls,
                   flush_by_size = m.flush_by_size, flush_by_timer = m.flush_by_timer, "writer partition");
        }

        if is_slurm {
            for &task_id in &my_task_ids {
                write_barrier(&launch_root, "map_done", task_id)?;
            }
            let t0 = Instant::now();
            wait_for_barrier(&launch_root, "map_done", global_ntasks, cfg.barrier_timeout)?;
            info!(phase = "barrier_map_wait", wait_ms = t0.elapsed().as_millis() as u64, "Barrier wait for map phase completed");
        }

        collector.record_map(&map_stats, map_phase_start.elapsed().as_millis() as u64);
        if let Some(m) = &collector.map {
            info!(phase = "map",
                  tasks = m.tasks, records_in = m.records_in, total_emits = m.total_emits, records_out = m.records_out,
                  total_bytes_out = m.total_bytes_out, total_flushes = m.total_flushes, combine_spills = m.combine_spills,
                  skipped = m.skipped.total(), min_task_ms = m.min_task_ms, max_task_ms = m.max_task_ms,
                  wall_ms = m.wall_ms,
                  "Map phase complete");
            if m.skipped.total() > 0 {
                info!(stage = %self.name, blank = m.skipped.blank, field_count = m.skipped.field_count,
                      missing_tab = m.skipped.missing_tab, not_numeric = m.skipped.not_numeric,
                      lexicon_miss = m.skipped.lexicon_miss, "records skipped during map");
            }
        }

        // Reducers owned by this process
        let my_reducers: Vec<usize> = (0..num_reducers).filter(|r| !is_slurm || r % ranks == node_id).collect();

        // Sort/shuffle
        let sort_phase_start = Instant::now();
        let sort_results: Vec<(SortOutcome, u64)> = my_reducers
            .par_iter()
            .map(|&r| -> Result<(SortOutcome, u64)> {
                let reducer_start = Instant::now();
                let pattern = format!("{}/task*_part{}.bin", glob::Pattern::escape(&map_out_dir.to_string_lossy()), r);
                let mut paths = glob::glob(&pattern)
                    .with_context(|| format!("glob {}", pattern))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                paths.sort();
                let outcome = external_sort_by_key(&paths, &sorted_run_path(&sort_out_dir, r))?;
                debug!(reducer = r, input_files = paths.len(), lines_in = outcome.lines_in, bytes_in = outcome.bytes_in,
                       sort_ms = outcome.sort_only_ms, io_read_ms = outcome.io_read_ms, io_write_ms = outcome.io_write_ms,
                       "sorted reducer input");
                Ok((outcome, reducer_start.elapsed().as_millis() as u64))
            })
            .collect::<Result<_>>()?;
        collector.record_sort(
            sort_results.len(),
            sort_results.iter().map(|(o, _)| o.lines_in).sum(),
            sort_results.iter().map(|(o, _)| o.bytes_in).sum(),
            sort_results.iter().map(|(_, ms)| *ms).min().unwrap_or(0),
            sort_results.iter().map(|(_, ms)| *ms).max().unwrap_or(0),
            sort_phase_start.elapsed().as_millis() as u64,
        );
        if let Some(s) = &collector.sort {
            info!(phase = "sort", reducers = s.reducers, total_lines = s.total_lines, total_bytes = s.total_bytes,
                  min_reducer_ms = s.min_reducer_ms, max_reducer_ms = s.max_reducer_ms, wall_ms = s.wall_ms,
                  "Sort phase complete");
        }

        // Reduce phase
        let reduce_phase_start = Instant::now();
        let reduce_stats: Vec<ReduceStats> = my_reducers
            .par_iter()
            .map(|&r| run_reduce_for(r, &sorted_run_path(&sort_out_dir, r), &output_dir.join(format!("part-{:05}.tsv", r)), reducer))
            .collect::<Result<_>>()?;
        for s in &reduce_stats {
            debug!(reducer = s.reducer, lines_in = s.lines_in, groups = s.groups, wall_ms = s.wall_ms, "reducer finished");
        }
        collector.record_reduce(
            reduce_stats.len(),
            reduce_stats.iter().map(|s| s.lines_in).sum(),
            reduce_stats.iter().map(|s| s.groups).sum(),
            reduce_stats.iter().map(|s| s.wall_ms).min().unwrap_or(0),
            reduce_stats.iter().map(|s| s.wall_ms).max().unwrap_or(0),
            reduce_phase_start.elapsed().as_millis() as u64,
        );
        if let Some(r) = &collector.reduce {
            info!(phase = "reduce", reducers = r.reducers, total_lines = r.total_lines, total_groups = r.total_groups,
                  min_reducer_ms = r.min_reducer_ms, max_reducer_ms = r.max_reducer_ms, wall_ms = r.wall_ms,
                  "Reduce phase complete");
        }

        let report = collector.into_report(&self.name, &cfg.run_id, node_id, num_reducers);
        let stats_name = if is_slurm { format!("_STATS-node{}.json", node_id) } else { STATS_FILE.to_string() };
        let stats_path = output_dir.join(stats_name);
        fs::write(&stats_path, serde_json::to_vec_pretty(&report)?).with_context(|| format!("write {}", stats_path.display()))?;

        // Commit
        if is_slurm {
            write_barrier(&launch_root, "reduce_done", node_id)?;
            if node_id == 0 {
                let t0 = Instant::now();
                wait_for_barrier(&launch_root, "reduce_done", ranks, cfg.barrier_timeout)?;
                info!(phase = "barrier_reduce_wait", wait_ms = t0.elapsed().as_millis() as u64, "Barrier wait for reduce phase completed");
                write_success_marker(&output_dir)?;
                if !cfg.keep_intermediates { let _ = fs::remove_dir_all(&launch_root); }
            } else {
                wait_for_path(&output_dir.join(SUCCESS_MARKER), "stage_committed", cfg.barrier_timeout)?;
            }
        } else {
            write_success_marker(&output_dir)?;
            if !cfg.keep_intermediates { let _ = fs::remove_dir_all(&launch_root); }
        }
        info!(stage = %self.name, output = %output_dir.display(), "stage committed");
        Ok(report)
    }
}

impl ExecutablePipeline for RuntimePipeline {
    fn add_input(&mut self, input_path: impl Into<PathBuf>) { self.inputs.push(input_path.into()); }

    fn add_output(&mut self, output_path: impl Into<PathBuf>) { self.output = Some(output_path.into()); }

    fn map_reduce<M, R>(&mut self, mapper: M, reducer: R) -> Result<StageReport>
    where
        M: Mapper + Send + Sync,
        R: Reducer<Key = M::Key, ValueIn = M::Value> + Send + Sync,
    {
        match self.config.threads {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build().context("build rayon pool")?;
                pool.install(|| self.run(&mapper, &reducer))
            }
            None => self.run(&mapper, &reducer),
        }
    }
}

fn sorted_run_path(sort_out_dir: &Path, r: usize) -> PathBuf { sort_out_dir.join(format!("reduce_in_part{}.bin", r)) }

fn emit_pair<K: serde::Serialize, V: serde::Serialize>(out: &mut ThreadWriter<'_>, key: &K, value: &V, num_reducers: usize) -> Result<()> {
    let key_bytes = bincode::serialize(key).context("encode key")?;
    let val_bytes = bincode::serialize(value).context("encode value")?;
    out.emit_record(hash_to_partition(&key_bytes, num_reducers), &key_bytes, &val_bytes)
}

fn spill_combined<K: serde::Serialize, V: serde::Serialize>(table: &mut HashMap<K, V>, out: &mut ThreadWriter<'_>, num_reducers: usize, stats: &mut MapTaskStats) -> Result<()> {
    for (k, v) in table.drain() {
        emit_pair(out, &k, &v, num_reducers)?;
        stats.records_out += 1;
    }
    Ok(())
}

fn run_map_task<M, R>(task_id: usize, splits: &[InputSplit], mapper: &M, reducer: &R, pool: &WriterPool, cfg: &EngineConfig, num_reducers: usize) -> Result<MapTaskStats>
where
    M: Mapper,
    R: Reducer<Key = M::Key, ValueIn = M::Value>,
{
    let task_start = Instant::now();
    debug!(task_id, splits = splits.len(), writers = num_reducers, "map task starting");
    let mut stats = MapTaskStats { task_id, splits: splits.len() as u64, ..Default::default() };
    let mut out = pool.make_thread_writer(cfg.local_batch_bytes);
    let combiner = if cfg.combine { reducer.combiner() } else { None };
    let mut table: HashMap<M::Key, M::Value> = HashMap::new();

    for split in splits {
        for_each_line_in_split(split, |line| {
            stats.records_in += 1;
            let pairs = match mapper.do_map(line) {
                Ok(pairs) => pairs,
                Err(skip) => {
                    stats.skipped.record(skip);
                    debug!(task_id, reason = %skip, record = line, "record skipped");
                    return Ok(());
                }
            };
            stats.total_emits += pairs.len() as u64;
            for (k, v) in pairs {
                match combiner {
                    Some(merge) => {
                        if let Some(slot) = table.get_mut(&k) {
                            *slot = merge(slot.clone(), v);
                        } else {
                            table.insert(k, v);
                        }
                        if table.len() >= cfg.combine_max_keys {
                            spill_combined(&mut table, &mut out, num_reducers, &mut stats)?;
                            stats.combine_spills += 1;
                        }
                    }
                    None => {
                        emit_pair(&mut out, &k, &v, num_reducers)?;
                        stats.records_out += 1;
                    }
                }
            }
            Ok(())
        })
        .with_context(|| format!("map task {} over {}", task_id, split.path.display()))?;
    }
    spill_combined(&mut table, &mut out, num_reducers, &mut stats)?;
    out.flush_all()?;
    let (flushes, bytes_sent) = out.stats();
    stats.total_flushes = flushes;
    stats.total_bytes_out = bytes_sent;
    stats.wall_ms = task_start.elapsed().as_millis() as u64;
    Ok(stats)
}

/// Values of one key in a sorted run, decoded lazily so a key's multiset is never buffered by the engine.
struct GroupValues<'a, V> {
    bytes: &'a [u8],
    off: usize,
    key: &'a [u8],
    lines: u64,
    err: Option<anyhow::Error>,
    _marker: PhantomData<V>,
}

impl<'a, V> GroupValues<'a, V> {
    /// Steps past whatever the reducer left unread.
    fn skip_rest(&mut self) {
        while let Some((k, _v, next)) = read_bin_line(self.bytes, self.off) {
            if k != self.key { break; }
            self.off = next;
            self.lines += 1;
        }
    }
}

impl<'a, V: DeserializeOwned> Iterator for GroupValues<'a, V> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        if self.err.is_some() { return None; }
        let (k, v, next) = read_bin_line(self.bytes, self.off)?;
        if k != self.key { return None; }
        match bincode::deserialize(v) {
            Ok(value) => {
                self.off = next;
                self.lines += 1;
                Some(value)
            }
            Err(e) => {
                self.err = Some(anyhow!("bad value record at byte {}: {}", self.off, e));
                None
            }
        }
    }
}

fn run_reduce_for<R: Reducer>(r: usize, in_path: &Path, out_path: &Path, reducer: &R) -> Result<ReduceStats> {
    let reducer_start = Instant::now();
    let mut out_writer = open_writer(out_path)?;
    let file = fs::File::open(in_path).with_context(|| format!("open {}", in_path.display()))?;
    let len = file.metadata().with_context(|| format!("stat {}", in_path.display()))?.len();

    let mut lines_in: u64 = 0;
    let mut groups: u64 = 0;
    if len > 0 {
        let map = unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", in_path.display()))?;
        let bytes = &map[..];
        let mut off = 0usize;
        while let Some((k, _v, _next)) = read_bin_line(bytes, off) {
            let key: R::Key = bincode::deserialize(k).with_context(|| format!("bad key record in {} at byte {}", in_path.display(), off))?;
            let mut values = GroupValues::<R::ValueIn> { bytes, off, key: k, lines: 0, err: None, _marker: PhantomData };
            let out = reducer.do_reduce(&key, values.by_ref());
            if let Some(e) = values.err.take() {
                return Err(e.context(format!("reduce input {}", in_path.display())));
            }
            values.skip_rest();
            off = values.off;
            lines_in += values.lines;
            writeln!(out_writer, "{}\t{}", key, out).with_context(|| format!("write {}", out_path.display()))?;
            groups += 1;
        }
        if off != bytes.len() {
            bail!("truncated record in {} at byte {}", in_path.display(), off);
        }
    }
    out_writer.flush().with_context(|| format!("flush {}", out_path.display()))?;
    Ok(ReduceStats { reducer: r, lines_in, groups, wall_ms: reducer_start.elapsed().as_millis() as u64 })
}

fn write_barrier(root: &Path, phase: &str, id: usize) -> Result<()> {
    let p = root.join(format!("barrier_{}_{}", phase, id));
    fs::write(&p, b"ok").with_context(|| format!("barrier write {}", p.display()))
}

fn wait_for_barrier(root: &Path, phase: &str, expected: usize, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    loop {
        let done = (0..expected).filter(|i| root.join(format!("barrier_{}_{}", phase, i)).exists()).count();
        if done >= expected { return Ok(()); }
        if start.elapsed() > timeout {
            return Err(Error::BarrierTimeout { phase: phase.to_string(), done, expected }.into());
        }
        thread::sleep(Duration::from_millis(500));
    }
}

fn wait_for_path(path: &Path, phase: &str, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() > timeout {
            return Err(Error::BarrierTimeout { phase: phase.to_string(), done: 0, expected: 1 }.into());
        }
        thread::sleep(Duration::from_millis(500));
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn get_fd_soft_limit() -> Option<u64> {
    use libc::{getrlimit, rlimit, RLIMIT_NOFILE};
    let mut lim = rlimit { rlim_cur: 0, rlim_max: 0 };
    let rc = unsafe { getrlimit(RLIMIT_NOFILE, &mut lim as *mut rlimit) };
    if rc == 0 { Some(lim.rlim_cur as u64) } else { None }
}

#[cfg(not(target_os = "linux"))]
fn get_fd_soft_limit() -> Option<u64> { None }
