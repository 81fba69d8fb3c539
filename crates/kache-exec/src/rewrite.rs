//! Rewrites a node's manifest to point at its rendered artifact.

use std::path::Path;

use kache_manifest::RewrittenManifest;

use crate::error::ExecError;

/// Overwrite `manifest_path` with a minimal manifest whose single resource
/// reference is `artifact_path`, expressed relative to `node_dir`.
///
/// # Errors
/// Returns an error if the manifest cannot be serialized or written.
pub fn rewrite(manifest_path: &Path, node_dir: &Path, artifact_path: &Path) -> Result<(), ExecError> {
    let relative = pathdiff::diff_paths(artifact_path, node_dir).unwrap_or_else(|| artifact_path.to_path_buf());
    let relative = relative.to_string_lossy().into_owned();

    let manifest = RewrittenManifest::new(relative);
    let yaml = manifest
        .to_yaml()
        .map_err(|source| ExecError::Rewrite {
            path: manifest_path.display().to_string(),
            source,
        })?;

    std::fs::write(manifest_path, yaml).map_err(|source| ExecError::RewriteIo {
        path: manifest_path.display().to_string(),
        source,
    })
}
