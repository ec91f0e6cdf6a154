//! Chained stage topology.
//!
//! A [`Pipeline`] is an ordered list of [`StageSpec`]s. Each stage reads fully
//! committed artifacts (external inputs or outputs of stages declared before
//! it) and writes one artifact of its own. The whole graph is validated before
//! anything runs.

use crate::config::EngineConfig;
use crate::error::Error;
use crate::io::{ensure_dir, is_committed, list_input_files, open_writer, read_lines, write_success_marker};
use crate::stages::{run_stage, ArtifactFormat, Collaborators, Reserializer, StageKind};
use crate::stats::StageReport;
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub enum StageInput {
    /// A dataset produced outside the pipeline.
    External { path: PathBuf, format: ArtifactFormat },
    /// The output artifact of an earlier stage, by stage name.
    Stage(String),
}

#[derive(Clone, Debug)]
pub struct StageSpec {
    pub name: String,
    pub kind: StageKind,
    pub inputs: Vec<StageInput>,
    pub output: PathBuf,
}

impl StageSpec {
    pub fn new(name: impl Into<String>, kind: StageKind, output: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), kind, inputs: Vec::new(), output: output.into() }
    }

    pub fn reads_external(mut self, path: impl Into<PathBuf>, format: ArtifactFormat) -> Self {
        self.inputs.push(StageInput::External { path: path.into(), format });
        self
    }

    pub fn reads_stage(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(StageInput::Stage(name.into()));
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineOptions {
    /// Skip stages whose output is already committed, unless something upstream ran again.
    pub resume: bool,
}

#[derive(Debug)]
pub enum StageStatus {
    Ran(StageReport),
    /// Output was already committed and nothing upstream changed.
    Reused,
}

#[derive(Debug)]
pub struct StageOutcome {
    pub name: String,
    pub output: PathBuf,
    pub status: StageStatus,
}

#[derive(Debug, Default)]
pub struct PipelineReport {
    pub stages: Vec<StageOutcome>,
}

impl PipelineReport {
    pub fn stage(&self, name: &str) -> Option<&StageOutcome> { self.stages.iter().find(|s| s.name == name) }
}

struct ResolvedInput {
    path: PathBuf,
    upstream: Option<usize>,
    handoff: Option<Reserializer>,
}

struct ResolvedStage<'a> {
    spec: &'a StageSpec,
    inputs: Vec<ResolvedInput>,
}

#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    stages: Vec<StageSpec>,
}

impl Pipeline {
    pub fn new() -> Self { Self::default() }

    pub fn stage(mut self, spec: StageSpec) -> Self {
        self.stages.push(spec);
        self
    }

    pub fn stages(&self) -> &[StageSpec] { &self.stages }

    /// The full analysis chain over a catalog file, with artifacts under `out_root`:
    /// normalize -> wordfreq -> {sentiment, bigram_prep -> bigrams}, and trends over
    /// sentiment and wordfreq.
    pub fn standard(catalog: impl Into<PathBuf>, out_root: impl AsRef<Path>) -> Self {
        let root = out_root.as_ref();
        Self::new()
            .stage(StageSpec::new("normalize", StageKind::Normalize, root.join("normalized")).reads_external(catalog, ArtifactFormat::Catalog))
            .stage(StageSpec::new("wordfreq", StageKind::WordFrequency, root.join("wordfreq")).reads_stage("normalize"))
            .stage(StageSpec::new("sentiment", StageKind::Sentiment, root.join("sentiment")).reads_stage("wordfreq"))
            .stage(StageSpec::new("bigram_prep", StageKind::BigramPrep, root.join("bigram_prep")).reads_stage("wordfreq"))
            .stage(StageSpec::new("bigrams", StageKind::Bigrams, root.join("bigrams")).reads_stage("bigram_prep"))
            .stage(StageSpec::new("trends", StageKind::Trends, root.join("trends")).reads_stage("sentiment").reads_stage("wordfreq"))
    }

    /// Checks the graph without running it.
    pub fn validate(&self, collaborators: &Collaborators) -> Result<(), Error> {
        self.resolve(collaborators).map(|_| ())
    }

    fn resolve(&self, collaborators: &Collaborators) -> Result<Vec<ResolvedStage<'_>>, Error> {
        if self.stages.is_empty() {
            return Err(Error::Pipeline("pipeline has no stages".into()));
        }
        let mut by_name: HashMap<&str, usize> = HashMap::new();
        let mut outputs: HashSet<&Path> = HashSet::new();
        let mut resolved = Vec::with_capacity(self.stages.len());

        for (idx, spec) in self.stages.iter().enumerate() {
            if by_name.contains_key(spec.name.as_str()) {
                return Err(Error::Pipeline(format!("duplicate stage name '{}'", spec.name)));
            }
            if !outputs.insert(spec.output.as_path()) {
                return Err(Error::Pipeline(format!("stage '{}' writes {} which another stage already writes", spec.name, spec.output.display())));
            }
            if spec.inputs.is_empty() {
                return Err(Error::Pipeline(format!("stage '{}' declares no inputs", spec.name)));
            }
            if spec.kind == StageKind::Sentiment && collaborators.lexicon.is_none() {
                return Err(Error::Pipeline(format!("stage '{}' needs a sentiment lexicon", spec.name)));
            }

            let mut inputs = Vec::with_capacity(spec.inputs.len());
            for input in &spec.inputs {
                let (path, upstream, format) = match input {
                    StageInput::External { path, format } => (path.clone(), None, *format),
                    StageInput::Stage(name) => {
                        let &up = by_name.get(name.as_str()).ok_or_else(|| {
                            Error::Pipeline(format!("stage '{}' reads '{}', which is not declared before it", spec.name, name))
                        })?;
                        let upstream_spec = &self.stages[up];
                        (upstream_spec.output.clone(), Some(up), upstream_spec.kind.produces())
                    }
                };
                let handoff = spec
                    .kind
                    .handoff(format)
                    .map_err(|e| match e {
                        Error::Pipeline(msg) => Error::Pipeline(format!("stage '{}': {}", spec.name, msg)),
                        other => other,
                    })?;
                inputs.push(ResolvedInput { path, upstream, handoff });
            }
            by_name.insert(spec.name.as_str(), idx);
            resolved.push(ResolvedStage { spec, inputs });
        }

        // Outputs are cleared when a stage starts, so none may alias a declared input.
        for stage in &resolved {
            for input in stage.inputs.iter().filter(|i| i.upstream.is_none()) {
                if let Some(owner) = self.stages.iter().find(|s| input.path.starts_with(&s.output) || s.output.starts_with(&input.path)) {
                    return Err(Error::Pipeline(format!(
                        "external input {} overlaps the output of stage '{}'",
                        input.path.display(),
                        owner.name
                    )));
                }
            }
        }
        Ok(resolved)
    }

    pub fn run(&self, config: &EngineConfig, collaborators: &Collaborators, options: PipelineOptions) -> Result<PipelineReport> {
        let resolved = self.resolve(collaborators)?;
        let mut reran = vec![false; resolved.len()];
        let mut report = PipelineReport::default();
        let pipeline_start = Instant::now();

        for (idx, stage) in resolved.iter().enumerate() {
            let spec = stage.spec;
            let upstream_reran = stage.inputs.iter().filter_map(|i| i.upstream).any(|up| reran[up]);
            if options.resume && !upstream_reran && is_committed(&spec.output) {
                info!(stage = %spec.name, output = %spec.output.display(), "stage output already committed; reusing");
                report.stages.push(StageOutcome { name: spec.name.clone(), output: spec.output.clone(), status: StageStatus::Reused });
                continue;
            }

            // A stage only starts once every declared input is fully present.
            for input in &stage.inputs {
                match input.upstream {
                    Some(_) if !is_committed(&input.path) => {
                        return Err(Error::Pipeline(format!("stage '{}': upstream artifact {} is not committed", spec.name, input.path.display())).into());
                    }
                    None if !input.path.exists() => {
                        return Err(Error::SourceUnavailable { path: input.path.clone(), reason: format!("input of stage '{}' not found", spec.name) }.into());
                    }
                    _ => {}
                }
            }

            let handoff_root = config.stage_work_dir(&spec.name);
            let mut stage_inputs = Vec::with_capacity(stage.inputs.len());
            for (n, input) in stage.inputs.iter().enumerate() {
                match input.handoff {
                    None => stage_inputs.push(input.path.clone()),
                    Some(rewrite) => {
                        let dst = handoff_root.join(format!("handoff_{}", n));
                        materialize_handoff(&input.path, &dst, rewrite, config)
                            .with_context(|| format!("re-serialise {} for stage '{}'", input.path.display(), spec.name))?;
                        stage_inputs.push(dst);
                    }
                }
            }

            info!(stage = %spec.name, kind = %spec.kind, inputs = stage_inputs.len(), "starting stage");
            let stage_report = run_stage(spec.kind, &spec.name, &stage_inputs, &spec.output, config, collaborators)
                .with_context(|| format!("stage '{}' failed", spec.name))?;
            reran[idx] = true;
            report.stages.push(StageOutcome { name: spec.name.clone(), output: spec.output.clone(), status: StageStatus::Ran(stage_report) });
        }

        info!(stages = report.stages.len(), wall_ms = pipeline_start.elapsed().as_millis() as u64, "pipeline complete");
        Ok(report)
    }
}

/// Writes a complete re-serialised copy of `src` into `dst`, marking it committed.
/// Under a multi-rank topology rank 0 writes and the others wait for the marker.
fn materialize_handoff(src: &Path, dst: &Path, rewrite: Reserializer, config: &EngineConfig) -> Result<()> {
    if config.topology.node_id() != 0 {
        let start = Instant::now();
        while !is_committed(dst) {
            if start.elapsed() > config.barrier_timeout {
                return Err(Error::BarrierTimeout { phase: "handoff".into(), done: 0, expected: 1 }.into());
            }
            std::thread::sleep(Duration::from_millis(500));
        }
        return Ok(());
    }

    if dst.exists() {
        fs::remove_dir_all(dst).with_context(|| format!("clear {}", dst.display()))?;
    }
    ensure_dir(dst)?;
    let mut written = 0u64;
    let mut dropped = 0u64;
    for (i, file) in list_input_files(src)?.iter().enumerate() {
        let out_path = dst.join(format!("part-{:05}.tsv", i));
        let mut out = open_writer(&out_path)?;
        for line in read_lines(file)? {
            let line = line?;
            match rewrite(&line) {
                Some(rewritten) => {
                    writeln!(out, "{}", rewritten).with_context(|| format!("write {}", out_path.display()))?;
                    written += 1;
                }
                None => dropped += 1,
            }
        }
        out.flush().with_context(|| format!("flush {}", out_path.display()))?;
    }
    write_success_marker(dst)?;
    debug!(src = %src.display(), dst = %dst.display(), written, dropped, "handoff materialised");
    Ok(())
}
