pub mod seq2seq;
pub mod summarizer;
pub mod transcriber;
pub mod whisper;

use std::{path::Path, process::Output};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bundle does not provide executable '{0}'")]
    MissingExecutable(String),
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("{0} produced no output")]
    EmptyOutput(String),
}

/// Turns a finished child process into its stdout, or an error carrying its
/// stderr when it exited unsuccessfully.
fn stdout_of(program: &Path, output: Output) -> Result<String, RunnerError> {
    if !output.status.success() {
        return Err(RunnerError::Exit {
            program: program.display().to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(all(test, unix))]
pub(crate) mod testing {
    use std::{os::unix::fs::PermissionsExt, path::Path};

    use crate::cache::{BundleSpec, ReadyHandle};

    /// Lays out a ready bundle under `root` with the given shell scripts as
    /// its executables and placeholder data files.
    pub(crate) fn script_bundle(root: &Path, scripts: &[(&str, &str)], files: &[&str]) -> ReadyHandle {
        for (name, body) in scripts {
            let path = root.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        for file in files {
            std::fs::write(root.join(file), b"weights").unwrap();
        }

        BundleSpec {
            logical_name: "test-bundle".into(),
            bucket: "models".into(),
            prefix: "test-bundle/".into(),
            local_root: root.to_path_buf(),
            manifest: files.iter().map(Into::into).collect(),
            executables: scripts.iter().map(|(name, _)| name.into()).collect(),
        }
        .handle()
    }
}
