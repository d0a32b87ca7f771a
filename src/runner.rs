use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::CommandLine;
use crate::error::{DeployerError, Result};

/// Read size for relaying the child's error stream.
pub const RELAY_CHUNK: usize = 512;

/// Runner responsible for launching the provisioning command.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion and return its exit code.
    async fn run(&self, command: &CommandLine) -> Result<i32>;
}

/// Launches commands through the platform shell and relays their stderr to
/// our stdout.
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &CommandLine) -> Result<i32> {
        if let Some(program) = command.program() {
            resolve_runner(program)?;
        }
        let mut stdout = tokio::io::stdout();
        execute(command, &mut stdout).await
    }
}

/// Locate `runner` on `PATH`.
pub fn resolve_runner(runner: &str) -> Result<PathBuf> {
    which::which(runner).map_err(|err| {
        debug!(runner, error = %err, "runner lookup failed");
        DeployerError::RunnerMissing {
            runner: runner.to_string(),
        }
    })
}

/// Warn when `runner` cannot be found; used where a missing runner is not yet fatal.
pub fn check_runner(runner: &str) {
    if resolve_runner(runner).is_err() {
        warn!(
            "{runner} not found on PATH; the command will fail if launched from this environment."
        );
    }
}

/// Spawn `command` through the shell with stderr piped, copy everything it
/// writes there into `sink`, and return the child's exit code.
pub async fn execute<W>(command: &CommandLine, sink: &mut W) -> Result<i32>
where
    W: AsyncWrite + Unpin + Send,
{
    let line = command.to_shell_string();
    let mut child = shell(&line)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(DeployerError::Launch)?;
    debug!(pid = ?child.id(), command = %line, "spawned runner");

    let relayed = match child.stderr.take() {
        Some(mut stderr) => relay(&mut stderr, sink).await?,
        None => 0,
    };
    let status = child.wait().await?;
    let code = exit_code(status);
    debug!(relayed, code, "runner exited");
    Ok(code)
}

/// Copy `reader` into `writer` chunk by chunk, flushing after every write,
/// until the reader reports end of stream. Returns the number of bytes copied.
pub async fn relay<R, W>(reader: &mut R, writer: &mut W) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = [0u8; RELAY_CHUNK];
    let mut total = 0u64;
    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            return Ok(total);
        }
        writer.write_all(&buf[..read]).await?;
        writer.flush().await?;
        total += read as u64;
    }
}

#[cfg(unix)]
fn shell(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

#[cfg(windows)]
fn shell(line: &str) -> Command {
    // `line` is already quoted for cmd; pass it through untouched.
    let mut command = Command::new("cmd");
    command.arg("/C").raw_arg(line);
    command
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relay_copies_everything_across_chunks() {
        let input: Vec<u8> = (0..RELAY_CHUNK * 3 + 17).map(|i| (i % 251) as u8).collect();
        let mut reader = input.as_slice();
        let mut output = Vec::new();
        let copied = relay(&mut reader, &mut output).await.unwrap();
        assert_eq!(copied, input.len() as u64);
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn relay_of_empty_stream_is_noop() {
        let mut reader: &[u8] = &[];
        let mut output = Vec::new();
        assert_eq!(relay(&mut reader, &mut output).await.unwrap(), 0);
        assert!(output.is_empty());
    }

    #[test]
    fn unknown_runner_is_missing() {
        let err = resolve_runner("autoinstaller-no-such-runner-binary").unwrap_err();
        assert!(matches!(err, DeployerError::RunnerMissing { .. }), "{err}");
    }
}
