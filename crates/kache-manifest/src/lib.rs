#![forbid(unsafe_code)]
//! The `Kustomization` manifest data model: parsing, basename recognition,
//! and the rewritten stub manifest the executor writes after rendering.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// The `kind` value a manifest must declare to be treated as a Kustomization.
pub const RECOGNIZED_KIND: &str = "Kustomization";

/// The API version written into rewritten manifests.
pub const API_VERSION: &str = "kustomize.config.k8s.io/v1beta1";

/// Basenames the target lister and analyzer recognize as overlay manifests.
pub const RECOGNIZED_BASENAMES: &[&str] =
    &["kustomization.yaml", "kustomization.yml", "Kustomization"];

/// Returns `true` if `name` is one of the three recognized manifest basenames.
pub fn is_recognized_basename(name: &str) -> bool {
    RECOGNIZED_BASENAMES.contains(&name)
}

/// The subset of a `kustomization.yaml` document this crate cares about.
///
/// Unknown fields (patches, generators, namespace, ...) are ignored rather
/// than rejected — overlays legitimately use many fields this tool never
/// needs to understand.
#[derive(Debug, Clone, Deserialize)]
struct RawKustomization {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    resources: Vec<String>,
    /// Legacy field name, superseded by `resources` but still honored.
    #[serde(default)]
    bases: Vec<String>,
}

/// A parsed manifest: whether it declares the recognized kind, and the raw
/// (unresolved) resource references in declaration order — `resources`
/// followed by the legacy `bases`.
#[derive(Debug, Clone)]
pub struct ParsedManifest {
    pub kind_recognized: bool,
    pub references: Vec<String>,
}

/// Parse a manifest from its raw YAML content.
///
/// # Errors
/// Returns an error if `content` is not valid YAML. A recognized-but-wrong
/// `kind` is not an error — see [`ParsedManifest::kind_recognized`].
pub fn parse(content: &str, path_for_errors: &str) -> Result<ParsedManifest, ManifestError> {
    let raw: RawKustomization =
        serde_yaml::from_str(content).map_err(|source| ManifestError::Parse {
            path: path_for_errors.to_owned(),
            source,
        })?;

    let kind_recognized = raw.kind.as_deref() == Some(RECOGNIZED_KIND);
    let mut references = raw.resources;
    references.extend(raw.bases);

    Ok(ParsedManifest {
        kind_recognized,
        references,
    })
}

/// Read and parse a manifest from disk.
///
/// # Errors
/// Returns an error if the file cannot be read or is not valid YAML.
pub fn parse_path(path: &Path) -> Result<ParsedManifest, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse(&content, &path.display().to_string())
}

/// The minimal manifest the executor writes in place of a rendered node's
/// original manifest: `kind`/`apiVersion` identify the overlay format, and
/// the single resource reference points at the rendered artifact.
#[derive(Debug, Clone, Serialize)]
pub struct RewrittenManifest {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    resources: Vec<String>,
}

impl RewrittenManifest {
    /// Build a rewritten manifest pointing at `artifact_relative_path`
    /// (expressed relative to the node's own directory).
    pub fn new(artifact_relative_path: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.to_owned(),
            kind: RECOGNIZED_KIND.to_owned(),
            resources: vec![artifact_relative_path.into()],
        }
    }

    /// Serialize to the exact YAML form spec'd for rewritten manifests.
    ///
    /// # Errors
    /// Returns an error if serialization fails (should not happen for this
    /// fixed shape, but the encoder is fallible).
    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        serde_yaml::to_string(self).map_err(|source| ManifestError::Serialize { source })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid manifest at {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("cannot serialize manifest: {source}")]
    Serialize { source: serde_yaml::Error },
}
