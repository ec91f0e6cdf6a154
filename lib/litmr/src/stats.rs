use crate::api::Skip;
use serde::Serialize;

#[derive(Default, Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SkipCounters {
    pub blank: u64,
    pub field_count: u64,
    pub missing_tab: u64,
    pub not_numeric: u64,
    pub lexicon_miss: u64,
}

impl SkipCounters {
    pub fn record(&mut self, skip: Skip) {
        let slot = match skip {
            Skip::Blank => &mut self.blank,
            Skip::FieldCount => &mut self.field_count,
            Skip::MissingTab => &mut self.missing_tab,
            Skip::NotNumeric => &mut self.not_numeric,
            Skip::LexiconMiss => &mut self.lexicon_miss,
        };
        *slot += 1;
    }

    pub fn merge(&mut self, other: &SkipCounters) {
        self.blank += other.blank;
        self.field_count += other.field_count;
        self.missing_tab += other.missing_tab;
        self.not_numeric += other.not_numeric;
        self.lexicon_miss += other.lexicon_miss;
    }

    pub fn total(&self) -> u64 {
        self.blank + self.field_count + self.missing_tab + self.not_numeric + self.lexicon_miss
    }
}

/// Per map task counters, collected by the runtime and folded into [`MapStats`].
#[derive(Default, Clone, Debug)]
pub struct MapTaskStats {
    pub task_id: usize,
    pub splits: u64,
    pub records_in: u64,
    pub total_emits: u64,
    pub records_out: u64,
    pub total_bytes_out: u64,
    pub total_flushes: u64,
    pub combine_spills: u64,
    pub skipped: SkipCounters,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct MapStats {
    pub tasks: usize,
    pub records_in: u64,
    pub total_emits: u64,
    /// Records handed to the shuffle after map-side combining.
    pub records_out: u64,
    pub total_bytes_out: u64,
    pub total_flushes: u64,
    pub combine_spills: u64,
    pub skipped: SkipCounters,
    pub min_task_ms: u64,
    pub max_task_ms: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct SortStatsAgg {
    pub reducers: usize,
    pub total_lines: u64,
    pub total_bytes: u64,
    pub min_reducer_ms: u64,
    pub max_reducer_ms: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct ReduceStatsAgg {
    pub reducers: usize,
    pub total_lines: u64,
    pub total_groups: u64,
    pub min_reducer_ms: u64,
    pub max_reducer_ms: u64,
    pub wall_ms: u64,
}

/// Everything one stage run measured, written next to its output as `_STATS.json`.
#[derive(Default, Clone, Debug, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub run_id: String,
    pub node_id: usize,
    pub num_reducers: usize,
    pub map: MapStats,
    pub sort: SortStatsAgg,
    pub reduce: ReduceStatsAgg,
}

#[derive(Default)]
pub struct StatsCollector {
    pub map: Option<MapStats>,
    pub sort: Option<SortStatsAgg>,
    pub reduce: Option<ReduceStatsAgg>,
}

impl StatsCollector {
    pub fn new() -> Self { Self::default() }

    pub fn record_map(&mut self, per_task: &[MapTaskStats], wall_ms: u64) {
        let mut skipped = SkipCounters::default();
        for t in per_task { skipped.merge(&t.skipped); }
        self.map = Some(MapStats {
            tasks: per_task.len(),
            records_in: per_task.iter().map(|t| t.records_in).sum(),
            total_emits: per_task.iter().map(|t| t.total_emits).sum(),
            records_out: per_task.iter().map(|t| t.records_out).sum(),
            total_bytes_out: per_task.iter().map(|t| t.total_bytes_out).sum(),
            total_flushes: per_task.iter().map(|t| t.total_flushes).sum(),
            combine_spills: per_task.iter().map(|t| t.combine_spills).sum(),
            skipped,
            min_task_ms: per_task.iter().map(|t| t.wall_ms).min().unwrap_or(0),
            max_task_ms: per_task.iter().map(|t| t.wall_ms).max().unwrap_or(0),
            wall_ms,
        });
    }

    pub fn record_sort(&mut self, reducers: usize, lines: u64, bytes: u64, min_ms: u64, max_ms: u64, wall_ms: u64) {
        self.sort = Some(SortStatsAgg { reducers, total_lines: lines, total_bytes: bytes, min_reducer_ms: min_ms, max_reducer_ms: max_ms, wall_ms });
    }

    pub fn record_reduce(&mut self, reducers: usize, lines: u64, groups: u64, min_ms: u64, max_ms: u64, wall_ms: u64) {
        self.reduce = Some(ReduceStatsAgg { reducers, total_lines: lines, total_groups: groups, min_reducer_ms: min_ms, max_reducer_ms: max_ms, wall_ms });
    }

    pub fn into_report(self, stage: &str, run_id: &str, node_id: usize, num_reducers: usize) -> StageReport {
        StageReport {
            stage: stage.to_string(),
            run_id: run_id.to_string(),
            node_id,
            num_reducers,
            map: self.map.unwrap_or_default(),
            sort: self.sort.unwrap_or_default(),
            reduce: self.reduce.unwrap_or_default(),
        }
    }
}
