//! The core pipeline (spec.md §2, §4): event demultiplexer, translators,
//! fan-in merger, eligibility filter, rebase stage, and merge stage, wired
//! per repository by [`orchestrator::spawn_repo_pipeline`].

pub mod config;
pub mod demux;
pub mod eligibility;
pub mod error;
pub mod merge_fan_in;
pub mod merge_stage;
pub mod orchestrator;
pub mod rebase_stage;
pub mod repo;
pub mod translate;

pub use config::PipelineConfig;
pub use demux::Demux;
pub use error::{PipelineError, RebaseError};
pub use rebase_stage::RebaseResult;
pub use repo::RepoDescriptor;
