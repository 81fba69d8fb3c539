//! Error types for kache-graph.

/// Errors produced by the target lister, ignore filter, and dependency analyzer.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A filesystem operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Symlink resolution or absolutization failed for a required path.
    #[error("failed to canonicalize {path}: {source}")]
    Canonicalize {
        path: String,
        source: std::io::Error,
    },

    /// A manifest could not be parsed.
    #[error("{0}")]
    Manifest(#[from] kache_manifest::ManifestError),

    /// The `.kacheignore` pattern file could not be compiled.
    #[error("invalid ignore pattern file {path}: {source}")]
    IgnorePattern { path: String, source: ignore::Error },

    /// One or more manifests failed to analyze and `ignoreErrors` was not set.
    #[error("{count} error(s) occurred while analyzing manifests")]
    AnalysisFailed { count: usize },
}
