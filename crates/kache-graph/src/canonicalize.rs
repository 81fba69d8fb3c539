//! Symlink-resolving absolute path canonicalization, parallelized over a
//! bounded worker pool.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::GraphError;

/// Resolve all symlinks on `path` and make it absolute.
///
/// # Errors
/// Returns an error if any path component does not exist or symlink
/// resolution loops.
pub fn canonicalize(path: &Path) -> Result<PathBuf, GraphError> {
    std::fs::canonicalize(path).map_err(|source| GraphError::Canonicalize {
        path: path.display().to_string(),
        source,
    })
}

/// Like [`canonicalize`], but returns `None` instead of an error.
///
/// Used when resolving a manifest's own resource references: a reference to
/// a sibling that does not exist is not an error, it is simply absent from
/// the dependency graph.
pub fn canonicalize_or_none(path: &Path) -> Option<PathBuf> {
    std::fs::canonicalize(path).ok()
}

/// Canonicalize every path in `paths`, preserving index order, using up to
/// `workers` threads.
///
/// # Errors
/// Returns the first error encountered. The implementation does not abandon
/// work on other items once an error occurs, but the aggregate result is not
/// consumed in that case.
pub fn canonicalize_many(paths: &[PathBuf], workers: usize) -> Result<Vec<PathBuf>, GraphError> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|source| GraphError::Io {
            path: "canonicalizer thread pool".to_owned(),
            source: std::io::Error::other(source.to_string()),
        })?;

    pool.install(|| {
        paths
            .par_iter()
            .map(|p| canonicalize(p))
            .collect::<Result<Vec<_>, _>>()
    })
}
