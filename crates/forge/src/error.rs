use thiserror::Error;

/// Error kinds per spec.md §7. Variant names match the abstract kinds the
/// spec names so callers (the pipeline crate) can match on them without
/// string comparison.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// Recovered locally by the caller: drop the current event/candidate.
    #[error("transient forge error: {0}")]
    Transient(String),

    /// Aborts the process: unable to resolve the authenticated user, or any
    /// other failure that must happen before the pipeline can start.
    #[error("fatal forge error at startup: {0}")]
    FatalAtStartup(String),

    /// The forge rejected a merge request outright.
    #[error("merge rejected: {0}")]
    MergeRejected(String),
}

impl ForgeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ForgeError::Transient(_))
    }
}
