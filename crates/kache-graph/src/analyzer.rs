//! Builds the node graph from a list of discovered manifest paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender};
use rayon::prelude::*;

use crate::canonicalize::{canonicalize_many, canonicalize_or_none};
use crate::concurrent_set::ConcurrentSet;
use crate::error::GraphError;
use crate::node::Node;

/// Severity policy for per-manifest failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzerOptions {
    /// When `true`, a manifest that fails to parse marks its node invalid
    /// and the run continues; when `false`, each such failure is fatal.
    pub ignore_errors: bool,
}

/// A node under construction during a `run`. Its `dependencies` field is
/// written only by the worker owning this node (the one parsing its
/// manifest); its `depended_by` set is written by arbitrary workers that
/// discover a reference pointing at it, so it is a [`ConcurrentSet`].
struct Building {
    manifest_path: PathBuf,
    dependencies: Mutex<Vec<PathBuf>>,
    depended_by: ConcurrentSet<PathBuf>,
    invalid: AtomicBool,
}

/// Discovers the dependency graph among a set of manifest paths.
pub struct DependencyAnalyzer {
    targets: Vec<PathBuf>,
    options: AnalyzerOptions,
    error_tx: Sender<GraphError>,
}

impl DependencyAnalyzer {
    /// Construct an analyzer over `targets`, returning it paired with the
    /// receiving half of its observable error channel (capacity 1; the
    /// sending half is dropped, closing the channel, when [`Self::run`]
    /// returns).
    pub fn new(targets: Vec<PathBuf>, options: AnalyzerOptions) -> (Self, Receiver<GraphError>) {
        let (error_tx, error_rx) = bounded(1);
        (
            Self {
                targets,
                options,
                error_tx,
            },
            error_rx,
        )
    }

    /// Build the graph using up to `workers` threads.
    ///
    /// # Errors
    /// Returns an error if canonicalizing the input paths fails, or if
    /// `ignoreErrors` is `false` and any manifest failed to parse.
    pub fn run(self, workers: usize) -> Result<Vec<Node>, GraphError> {
        if self.targets.is_empty() {
            return Ok(Vec::new());
        }

        let manifest_paths = canonicalize_many(&self.targets, workers)?;

        let mut building: HashMap<PathBuf, Building> = HashMap::with_capacity(manifest_paths.len());
        for manifest_path in &manifest_paths {
            let dir = manifest_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| manifest_path.clone());
            building.insert(
                dir,
                Building {
                    manifest_path: manifest_path.clone(),
                    dependencies: Mutex::new(Vec::new()),
                    depended_by: ConcurrentSet::new(),
                    invalid: AtomicBool::new(false),
                },
            );
        }

        let fatal_count = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()
            .map_err(|source| GraphError::Io {
                path: "analyzer thread pool".to_owned(),
                source: std::io::Error::other(source.to_string()),
            })?;

        pool.install(|| {
            building.par_iter().for_each(|(dir, node)| {
                self.analyze_one(dir, node, &building, &fatal_count);
            });
        });

        let fatal_count = fatal_count.load(Ordering::SeqCst);
        if fatal_count > 0 && !self.options.ignore_errors {
            return Err(GraphError::AnalysisFailed { count: fatal_count });
        }

        Ok(snapshot(&building))
    }

    fn analyze_one(
        &self,
        dir: &Path,
        node: &Building,
        building: &HashMap<PathBuf, Building>,
        fatal_count: &AtomicUsize,
    ) {
        let parsed = match kache_manifest::parse_path(&node.manifest_path) {
            Ok(parsed) => parsed,
            Err(err) => {
                node.invalid.store(true, Ordering::SeqCst);
                if !self.options.ignore_errors {
                    fatal_count.fetch_add(1, Ordering::SeqCst);
                }
                let _ = self.error_tx.try_send(GraphError::Manifest(err));
                return;
            }
        };

        if !parsed.kind_recognized {
            // Not a Kustomization document: excluded from the graph, but this
            // is never an error, independent of `ignoreErrors`.
            node.invalid.store(true, Ordering::SeqCst);
            return;
        }

        let mut dependencies = node.dependencies.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for reference in &parsed.references {
            if is_remote(reference) {
                continue;
            }
            let candidate = dir.join(reference);
            let Some(resolved) = canonicalize_or_none(&candidate) else {
                continue;
            };
            if let Some(target) = building.get(&resolved) {
                if !dependencies.contains(&resolved) {
                    dependencies.push(resolved.clone());
                }
                target.depended_by.add(dir.to_path_buf());
            }
        }
    }
}

/// `true` if `reference` names a remote resource the analyzer must not try
/// to resolve locally.
fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Drain `building` into a sorted, self-consistent snapshot: invalid nodes
/// are dropped, and every remaining node's edges are filtered to reference
/// only dirs that survived.
fn snapshot(building: &HashMap<PathBuf, Building>) -> Vec<Node> {
    let valid_dirs: std::collections::HashSet<&PathBuf> = building
        .iter()
        .filter(|(_, node)| !node.invalid.load(Ordering::SeqCst))
        .map(|(dir, _)| dir)
        .collect();

    let mut nodes: Vec<Node> = building
        .iter()
        .filter(|(dir, _)| valid_dirs.contains(dir))
        .map(|(dir, node)| {
            let dependencies = node
                .dependencies
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .filter(|d| valid_dirs.contains(d))
                .cloned()
                .collect();
            let depended_by = node
                .depended_by
                .snapshot()
                .into_iter()
                .filter(|d| valid_dirs.contains(d))
                .collect();
            Node {
                dir: dir.clone(),
                manifest_path: node.manifest_path.clone(),
                depended_by,
                dependencies,
            }
        })
        .collect();

    nodes.sort_by(|a, b| a.dir.cmp(&b.dir));
    nodes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, resources: &[&str]) {
        std::fs::create_dir_all(dir).unwrap();
        let list = resources
            .iter()
            .map(|r| format!("  - {r}\n"))
            .collect::<String>();
        let content = format!("kind: Kustomization\nresources:\n{list}");
        std::fs::write(dir.join("kustomization.yaml"), content).unwrap();
    }

    #[test]
    fn linear_chain_wires_dependencies() {
        let tmp = tempfile::tempdir().unwrap();
        let parent = tmp.path().join("parent");
        let child = tmp.path().join("child");
        write_manifest(&parent, &["../child"]);
        write_manifest(&child, &[]);

        let targets = vec![
            parent.join("kustomization.yaml"),
            child.join("kustomization.yaml"),
        ];
        let (analyzer, _rx) = DependencyAnalyzer::new(targets, AnalyzerOptions::default());
        let nodes = analyzer.run(2).unwrap();

        assert_eq!(nodes.len(), 2);
        let parent_node = nodes.iter().find(|n| n.dir == parent.canonicalize().unwrap()).unwrap();
        let child_node = nodes.iter().find(|n| n.dir == child.canonicalize().unwrap()).unwrap();
        assert_eq!(parent_node.dependencies, vec![child.canonicalize().unwrap()]);
        assert_eq!(child_node.depended_by, vec![parent.canonicalize().unwrap()]);
    }

    #[test]
    fn duplicate_reference_via_resources_and_legacy_bases_is_collapsed() {
        let tmp = tempfile::tempdir().unwrap();
        let parent = tmp.path().join("parent");
        let child = tmp.path().join("child");
        std::fs::create_dir_all(&parent).unwrap();
        write_manifest(&child, &[]);
        std::fs::write(
            parent.join("kustomization.yaml"),
            "kind: Kustomization\nresources:\n  - ../child\nbases:\n  - ../child\n",
        )
        .unwrap();

        let targets = vec![
            parent.join("kustomization.yaml"),
            child.join("kustomization.yaml"),
        ];
        let (analyzer, _rx) = DependencyAnalyzer::new(targets, AnalyzerOptions::default());
        let nodes = analyzer.run(2).unwrap();

        let parent_node = nodes.iter().find(|n| n.dir == parent.canonicalize().unwrap()).unwrap();
        assert_eq!(parent_node.dependencies, vec![child.canonicalize().unwrap()]);
    }

    #[test]
    fn missing_sibling_reference_is_silently_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let parent = tmp.path().join("parent");
        write_manifest(&parent, &["../nonexistent"]);

        let targets = vec![parent.join("kustomization.yaml")];
        let (analyzer, _rx) = DependencyAnalyzer::new(targets, AnalyzerOptions::default());
        let nodes = analyzer.run(1).unwrap();

        assert_eq!(nodes.len(), 1);
        assert!(nodes.first().unwrap().dependencies.is_empty());
    }

    #[test]
    fn remote_reference_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let parent = tmp.path().join("parent");
        write_manifest(&parent, &["https://example.com/manifest.yaml"]);

        let targets = vec![parent.join("kustomization.yaml")];
        let (analyzer, _rx) = DependencyAnalyzer::new(targets, AnalyzerOptions::default());
        let nodes = analyzer.run(1).unwrap();

        assert!(nodes.first().unwrap().dependencies.is_empty());
    }

    #[test]
    fn wrong_kind_is_excluded_without_error_even_without_ignore_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("bad");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("kustomization.yaml"), "kind: ConfigMap\n").unwrap();

        let targets = vec![dir.join("kustomization.yaml")];
        let (analyzer, _rx) = DependencyAnalyzer::new(targets, AnalyzerOptions { ignore_errors: false });
        let nodes = analyzer.run(1).unwrap();

        assert!(nodes.is_empty());
    }

    #[test]
    fn parse_failure_is_fatal_without_ignore_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("broken");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("kustomization.yaml"), "kind: [not\n  valid").unwrap();

        let targets = vec![dir.join("kustomization.yaml")];
        let (analyzer, _rx) = DependencyAnalyzer::new(targets, AnalyzerOptions { ignore_errors: false });
        let result = analyzer.run(1);

        assert!(result.is_err());
    }

    #[test]
    fn parse_failure_is_tolerated_with_ignore_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("broken");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("kustomization.yaml"), "kind: [not\n  valid").unwrap();

        let targets = vec![dir.join("kustomization.yaml")];
        let (analyzer, _rx) = DependencyAnalyzer::new(targets, AnalyzerOptions { ignore_errors: true });
        let nodes = analyzer.run(1).unwrap();

        assert!(nodes.is_empty());
    }

    #[test]
    fn empty_target_list_returns_empty_graph() {
        let (analyzer, _rx) = DependencyAnalyzer::new(Vec::new(), AnalyzerOptions::default());
        let nodes = analyzer.run(1).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn error_channel_closes_when_run_returns() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("ok");
        write_manifest(&dir, &[]);

        let targets = vec![dir.join("kustomization.yaml")];
        let (analyzer, rx) = DependencyAnalyzer::new(targets, AnalyzerOptions::default());
        analyzer.run(1).unwrap();

        // The sender was dropped when `run` returned, so recv observes a
        // disconnected channel rather than blocking.
        assert!(rx.recv().is_err());
    }
}
