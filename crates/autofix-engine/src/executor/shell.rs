//! Shell-backed command runner

use super::{CommandOutput, CommandRunner};
use crate::error::CommandError;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Runs commands through `sh -c`
///
/// The child is killed when cancelled or when the caller's timeout drops the
/// future.
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    shell: String,
}

impl ShellCommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another POSIX shell, e.g. `bash`
    #[must_use]
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::with_shell("sh")
    }
}

#[async_trait::async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str, cancel: &CancellationToken) -> Result<CommandOutput, CommandError> {
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::Spawn(e.to_string()))?;

        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CommandError::Cancelled),
            out = child.wait_with_output() => out.map_err(|e| CommandError::Spawn(e.to_string()))?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            Err(CommandError::Failed {
                exit_code: output.status.code(),
                stderr,
            })
        }
    }
}
