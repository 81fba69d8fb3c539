#![forbid(unsafe_code)]
//! Discovery side of the pipeline: find manifests under a root, filter them
//! against an ignore file, and resolve the dependency graph among them.

pub mod analyzer;
pub mod canonicalize;
pub mod concurrent_set;
pub mod error;
pub mod ignorefile;
pub mod lister;
pub mod node;

pub use analyzer::{AnalyzerOptions, DependencyAnalyzer};
pub use canonicalize::{canonicalize, canonicalize_many, canonicalize_or_none};
pub use concurrent_set::ConcurrentSet;
pub use error::GraphError;
pub use ignorefile::filter;
pub use lister::list_targets;
pub use node::Node;
