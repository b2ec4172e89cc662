//! Cross-cutting concerns shared by every crate in the workspace: process
//! invocation, logging setup, and the cancellation-token plumbing used by
//! long-lived actors.

pub mod cancellation;
pub mod logging;
pub mod shell;

pub use cancellation::CancellationToken;
