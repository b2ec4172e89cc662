//! Everything spec.md groups under "the Repository Cache and Worker
//! Registry" (§4.G, §4.H): a shared mainline clone per repository, a
//! serialized per-branch rebase actor, and the `git` subprocess driver
//! both are built on.

pub mod cache;
pub mod error;
pub mod git_cli;
pub mod rebaser;
pub mod worker;

pub use cache::Cache;
pub use error::VcsError;
pub use worker::{RebaseSignal, WorkerHandle};
