//! Subprocess invocation for a single node's render step.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ExecError;

/// Builds the renderer invocation for a node. Production code always uses
/// [`default_command`]; tests substitute a stand-in binary so they don't
/// depend on a real `kustomize` install.
pub type CommandBuilder = dyn Fn(&Path, &[String]) -> Command + Send + Sync;

/// `kustomize build <forwarded opts>`, run with `dir` as the working
/// directory.
pub fn default_command(dir: &Path, extra_args: &[String]) -> Command {
    let mut cmd = Command::new("kustomize");
    cmd.arg("build");
    cmd.args(extra_args);
    cmd.current_dir(dir);
    cmd
}

/// Render one node: invoke the renderer via `command_builder`, capture its
/// standard output into a file under `tempdir`, and return that file's path.
/// Standard error is captured in memory and folded into the error on
/// nonzero exit.
///
/// # Errors
/// Returns an error if the subprocess cannot be spawned, exits nonzero, or
/// the artifact file cannot be written.
pub fn render(
    dir: &Path,
    tempdir: &Path,
    extra_args: &[String],
    command_builder: &CommandBuilder,
) -> Result<PathBuf, ExecError> {
    let mut cmd = command_builder(dir, extra_args);
    let output = kache_util::run_command(&mut cmd).map_err(|source| ExecError::Spawn {
        dir: dir.display().to_string(),
        source,
    })?;

    if !output.success {
        return Err(ExecError::RenderFailed {
            dir: dir.display().to_string(),
            stderr: output.stderr,
        });
    }

    let artifact_path = tempdir.join("rendered.yaml");
    std::fs::write(&artifact_path, output.stdout).map_err(|source| ExecError::TempDir {
        dir: dir.display().to_string(),
        source,
    })?;

    Ok(artifact_path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stub_ok(dir: &Path, _extra_args: &[String]) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo 'kind: List'").current_dir(dir);
        cmd
    }

    fn stub_fail(dir: &Path, _extra_args: &[String]) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo boom >&2; exit 3").current_dir(dir);
        cmd
    }

    #[test]
    fn successful_render_writes_artifact_file() {
        let node_dir = tempfile::tempdir().unwrap();
        let tempdir = tempfile::tempdir().unwrap();
        let artifact = render(node_dir.path(), tempdir.path(), &[], &stub_ok).unwrap();
        let contents = std::fs::read_to_string(&artifact).unwrap();
        assert!(contents.contains("kind: List"));
    }

    #[test]
    fn nonzero_exit_is_a_render_failure_including_stderr() {
        let node_dir = tempfile::tempdir().unwrap();
        let tempdir = tempfile::tempdir().unwrap();
        let result = render(node_dir.path(), tempdir.path(), &[], &stub_fail);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        fn stub_missing(dir: &Path, _extra_args: &[String]) -> Command {
            let mut cmd = Command::new("definitely_not_a_real_binary_987");
            cmd.current_dir(dir);
            cmd
        }
        let node_dir = tempfile::tempdir().unwrap();
        let tempdir = tempfile::tempdir().unwrap();
        let result = render(node_dir.path(), tempdir.path(), &[], &stub_missing);
        assert!(result.is_err());
    }
}
