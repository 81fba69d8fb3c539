//! A single node depending on two independent siblings: both must render
//! before the parent, in either order.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::process::Command;

use kache_exec::{ExecutorOptions, TopologicalExecutor};
use kache_graph::Node;

fn write_kustomization(dir: &Path) {
    std::fs::create_dir_all(dir).expect("create node dir");
    std::fs::write(dir.join("kustomization.yaml"), "kind: Kustomization\nresources: []\n")
        .expect("write manifest");
}

fn stub_renderer(dir: &Path, _extra_args: &[String]) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg("echo 'kind: List'");
    cmd.current_dir(dir);
    cmd
}

fn node(dir: &Path, deps: Vec<&Path>, depended_by: Vec<&Path>) -> Node {
    Node {
        dir: dir.to_path_buf(),
        manifest_path: dir.join("kustomization.yaml"),
        dependencies: deps.into_iter().map(Path::to_path_buf).collect(),
        depended_by: depended_by.into_iter().map(Path::to_path_buf).collect(),
    }
}

#[test]
fn both_dependencies_render_before_the_dependent() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let x = root.join("x");
    let y = root.join("y");

    write_kustomization(&root);
    write_kustomization(&x);
    write_kustomization(&y);

    let nodes = vec![
        node(&root, vec![&x, &y], vec![]),
        node(&x, vec![], vec![&root]),
        node(&y, vec![], vec![&root]),
    ];

    let (executor, _rx) =
        TopologicalExecutor::with_command_builder(nodes, ExecutorOptions::default(), Box::new(stub_renderer));
    executor.run(4).expect("run succeeds");

    for dir in [&root, &x, &y] {
        let rewritten = std::fs::read_to_string(dir.join("kustomization.yaml")).unwrap();
        assert!(rewritten.contains("kind: Kustomization"));
    }
}
