//! Recursive walk collecting recognized manifest basenames under a root.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::GraphError;

/// Walk `root` recursively and collect every regular file whose basename is
/// one of the three recognized manifest basenames. Directories are
/// descended unconditionally. The result is sorted ascending.
///
/// # Errors
/// Returns an error if the walk hits a permission-denied directory or a
/// directory that vanishes mid-walk.
pub fn list_targets(root: &Path) -> Result<Vec<PathBuf>, GraphError> {
    let mut results = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| root.display().to_string());
            GraphError::Io {
                path,
                source: std::io::Error::other(err.to_string()),
            }
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };

        if kache_manifest::is_recognized_basename(name) {
            results.push(entry.into_path());
        }
    }

    results.sort();
    Ok(results)
}
