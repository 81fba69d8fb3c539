//! Error types for kache-util.

/// Errors produced by utility functions.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// A command failed to execute (not a nonzero exit — that is not an error).
    #[error("cannot execute command: {source}")]
    CommandExec { source: std::io::Error },
}
