pub mod api;
pub mod config;
pub mod constants;
pub mod emitters;
pub mod error;
pub mod io;
pub mod key;
pub mod lemma;
pub mod lexicon;
pub mod normalize;
pub mod pipeline;
pub mod reduce;
pub mod runtime;
pub mod slurm;
pub mod sort;
pub mod stages;
pub mod stats;
pub mod utils;
pub mod writer;

pub use api::{ExecutablePipeline, MapOutcome, Mapper, Reducer, Skip};
pub use config::{EngineConfig, Topology};
pub use error::Error;
pub use key::Key;
pub use lemma::{IdentityLemmatizer, Lemmatizer, TableLemmatizer};
pub use lexicon::Lexicon;
pub use pipeline::{Pipeline, PipelineOptions, PipelineReport, StageInput, StageOutcome, StageSpec, StageStatus};
pub use reduce::{JoinReducer, SumReducer};
pub use runtime::RuntimePipeline;
pub use stages::{run_stage, ArtifactFormat, Collaborators, StageKind};
pub use stats::StageReport;
