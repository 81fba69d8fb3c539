//! The executor's internal, mutable node representation.

use std::path::PathBuf;

use kache_graph::ConcurrentSet;

/// One node under execution. `dependencies` starts populated from the
/// analyzer's edge and shrinks as sibling renders complete; `depended_by`
/// is read-only for the lifetime of a run, the analyzer having already
/// computed it.
pub(crate) struct ExecNode {
    pub manifest_path: PathBuf,
    pub dependencies: ConcurrentSet<PathBuf>,
    pub depended_by: Vec<PathBuf>,
}
