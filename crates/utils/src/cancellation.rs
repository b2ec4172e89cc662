//! Re-exported so callers depend on `utils::CancellationToken` rather than
//! reaching into `tokio_util` directly; keeps the dependency centralized in
//! case the cancellation primitive ever needs to grow workspace-specific
//! behavior (it hasn't so far).

pub use tokio_util::sync::CancellationToken;
