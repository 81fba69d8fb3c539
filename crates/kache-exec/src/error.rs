//! Error types for kache-exec.

/// Errors produced while rendering and rewriting nodes.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// A node's renderer subprocess could not be spawned.
    #[error("cannot invoke renderer for {dir}: {source}")]
    Spawn {
        dir: String,
        source: kache_util::UtilError,
    },

    /// A node's renderer subprocess exited nonzero.
    #[error("renderer failed for {dir}: {stderr}")]
    RenderFailed { dir: String, stderr: String },

    /// A per-node temporary directory or artifact file could not be created.
    #[error("cannot create temporary output for {dir}: {source}")]
    TempDir {
        dir: String,
        source: std::io::Error,
    },

    /// The node's manifest could not be rewritten in place.
    #[error("cannot rewrite manifest at {path}: {source}")]
    Rewrite {
        path: String,
        source: kache_manifest::ManifestError,
    },

    /// The node's manifest could not be rewritten in place (I/O failure).
    #[error("cannot write manifest at {path}: {source}")]
    RewriteIo {
        path: String,
        source: std::io::Error,
    },

    /// The input graph contains a cycle: no node ever became ready and the
    /// run would otherwise hang.
    #[error("dependency graph contains a cycle; {remaining} node(s) never became ready")]
    Cycle { remaining: usize },

    /// One or more nodes failed during the run.
    #[error("{count} node(s) failed during execution")]
    AggregateFailure { count: usize },
}
