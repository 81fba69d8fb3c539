//! Filters a target list against an optional `.kacheignore` pattern file.

use std::path::{Path, PathBuf};

use ignore::gitignore::GitignoreBuilder;

use crate::error::GraphError;

/// Drop every target matched by the gitignore-style patterns in
/// `pattern_file`. A missing or absent pattern file is not an error: the
/// input is returned unchanged.
///
/// # Errors
/// Returns an error if `pattern_file` exists but contains a pattern that
/// cannot be compiled.
pub fn filter(pattern_file: Option<&Path>, targets: Vec<PathBuf>) -> Result<Vec<PathBuf>, GraphError> {
    let Some(pattern_file) = pattern_file else {
        return Ok(targets);
    };

    if !pattern_file.is_file() {
        return Ok(targets);
    }

    let base = pattern_file.parent().unwrap_or_else(|| Path::new("."));
    let mut builder = GitignoreBuilder::new(base);
    if let Some(err) = builder.add(pattern_file) {
        return Err(GraphError::IgnorePattern {
            path: pattern_file.display().to_string(),
            source: err,
        });
    }
    let matcher = builder
        .build()
        .map_err(|source| GraphError::IgnorePattern {
            path: pattern_file.display().to_string(),
            source,
        })?;

    Ok(targets
        .into_iter()
        .filter(|target| !matcher.matched(target, false).is_ignore())
        .collect())
}
