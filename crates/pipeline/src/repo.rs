//! The Repository descriptor (spec.md §3): identity, mainline branch name,
//! and a handle to its Cache. Created at startup; immutable thereafter
//! except the Cache handle, which is assigned once and read-only after.

use std::sync::Arc;

use forge::RepoId;
use vcs::Cache;

pub struct RepoDescriptor {
    pub id: RepoId,
    pub mainline: String,
    pub cache: Arc<Cache>,
}
