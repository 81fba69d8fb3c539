//! The analyzer's published node representation.

use std::path::PathBuf;

use serde::Serialize;

/// One manifest discovered by the analyzer, with its resolved edges.
///
/// Field names are renamed to match the tool's external JSON contract.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    #[serde(rename = "AbsDirPath")]
    pub dir: PathBuf,

    #[serde(rename = "KustomizePath")]
    pub manifest_path: PathBuf,

    #[serde(rename = "DependedBy")]
    pub depended_by: Vec<PathBuf>,

    #[serde(rename = "Dependencies")]
    pub dependencies: Vec<PathBuf>,
}
