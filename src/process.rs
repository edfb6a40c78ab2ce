//! Launching the binary under test.

use crate::error::ProcessError;
use crate::schema::{SuiteConfig, TestOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Output captured from a finished process.
///
/// The exit status is deliberately absent: fixtures assert on text and
/// files only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    pub stdout: String,
    pub stderr: String,
}

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Kill the child if the future driving it is dropped.
    pub kill_on_drop: bool,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            kill_on_drop: true,
        }
    }

    /// Build the invocation for running `bin_name` against a fixture.
    ///
    /// Layout: `[launcher...] <bin_path> [default flags] <fixture args...>`.
    /// Binaries listed in `default_flags_exempt` get no default flags.
    pub fn for_fixture(
        bin_path: &Path,
        bin_name: &str,
        options: &TestOptions,
        config: &SuiteConfig,
    ) -> Self {
        let mut args = Vec::new();
        let program = match config.launcher.split_first() {
            Some((launcher, launcher_args)) => {
                args.extend(launcher_args.iter().cloned());
                args.push(bin_path.display().to_string());
                PathBuf::from(launcher)
            }
            None => bin_path.to_path_buf(),
        };

        if !config.default_flags_exempt.iter().any(|b| b == bin_name) {
            for default in &config.default_flags {
                args.push(default.flag.clone());
                if !default.values.is_empty() {
                    args.push(default.values.join(","));
                }
            }
        }

        args.extend(options.args.iter().cloned());

        Self {
            program,
            args,
            kill_on_drop: config.kill_on_timeout,
        }
    }

    /// Every element double-quoted and space separated, for diagnostics.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .map(|arg| format!("\"{arg}\""))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Run `invocation` inside `cwd` and wait for it to finish.
///
/// `stdin` is written and then closed when non-empty; otherwise the child
/// gets no input at all. Both output streams are drained concurrently, each
/// in arrival order.
pub async fn run(
    invocation: &Invocation,
    cwd: &Path,
    stdin: &str,
) -> Result<ProcessResult, ProcessError> {
    let command_line = invocation.command_line();
    let io_err = |source| ProcessError::Io {
        command_line: command_line.clone(),
        source,
    };

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(invocation.kill_on_drop);

    if stdin.is_empty() {
        cmd.stdin(Stdio::null());
    } else {
        cmd.stdin(Stdio::piped());
    }

    tracing::debug!(command = %command_line, cwd = %cwd.display(), "spawning");
    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        command_line: command_line.clone(),
        source,
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let input = child.stdin.take();

    let write_stdin = async {
        if let Some(mut pipe) = input {
            // A child that exits without reading its input closes the pipe
            // early; that is its business, not a harness failure.
            match pipe.write_all(stdin.as_bytes()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
                Err(source) => {
                    return Err(ProcessError::Stdin {
                        command_line: command_line.clone(),
                        source,
                    });
                }
            }
            drop(pipe);
        }
        Ok(())
    };

    let (stdin_result, stdout, stderr) =
        tokio::join!(write_stdin, read_stream(stdout), read_stream(stderr));
    stdin_result?;
    let stdout = stdout.map_err(io_err)?;
    let stderr = stderr.map_err(io_err)?;

    let status = child.wait().await.map_err(io_err)?;
    tracing::debug!(command = %command_line, %status, "process exited");

    Ok(ProcessResult { stdout, stderr })
}

/// Accumulate a stream chunk by chunk until EOF.
async fn read_stream<R>(stream: Option<R>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return Ok(String::new());
    };

    let mut bytes = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
