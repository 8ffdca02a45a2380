//! Bounded, cancellable external-process calls.
//!
//! Every subprocess the tool runs (the deep-scan tool, the analysis agent) goes
//! through [`run`]: stdin is fed while output is collected, and the
//! child is killed if the timeout fires or the run is cancelled.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ProcessError;

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Locates `program` the way a shell would. Paths containing a separator are
/// checked as given.
pub fn which(program: impl AsRef<Path>) -> Option<PathBuf> {
    let program = program.as_ref();
    if program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Runs `program` to completion, bounded by `timeout` and `cancel`.
///
/// A non-zero exit is an error unless the child still produced stdout, which
/// is how scanners report partial results.
pub async fn run<I, S>(
    program: &Path,
    args: I,
    stdin: Option<&[u8]>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.display().to_string();

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ProcessError::NotFound(name.clone()),
        _ => ProcessError::Spawn {
            program: name.clone(),
            source,
        },
    })?;

    // Written concurrently with draining stdout, children may echo stdin.
    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        let input = input.to_vec();
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(&input).await {
                debug!("child closed stdin early: {e}");
            }
            let _ = pipe.shutdown().await;
        });
    }

    debug!("spawned {name} (timeout {timeout:?})");

    // Dropping the future on timeout or cancel drops the child, which kills it.
    let output = tokio::select! {
        res = tokio::time::timeout(timeout, child.wait_with_output()) => match res {
            Ok(output) => output?,
            Err(_elapsed) => return Err(ProcessError::Timeout { program: name, timeout }),
        },
        _ = cancel.cancelled() => return Err(ProcessError::Cancelled),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() && stdout.trim().is_empty() {
        return Err(ProcessError::NonZeroExit {
            program: name,
            code: output.status.code(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(ProcessOutput { stdout, stderr })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
