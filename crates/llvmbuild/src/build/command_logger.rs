//! Command execution with log capture
//!
//! This module runs one external command and streams its combined output,
//! line by line, to the log under the prefix of the build it belongs to.

use camino::Utf8Path;
use std::collections::{BTreeMap, VecDeque};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::Result;

/// Callback for log lines
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Number of trailing output lines kept for the build report
pub const OUTPUT_TAIL_LINES: usize = 20;

/// Exit status and trailing output of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub status: ExitStatus,
    /// Last lines of combined stdout and stderr
    pub tail: Vec<String>,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Run a command in `cwd` with `env` overriding the inherited environment.
///
/// The working directory is created if it does not exist. Each output line
/// is logged as `[<prefix>] <line>` and passed to `log_callback`. A non-zero
/// exit is not an error here; callers inspect the returned outcome.
pub async fn run_command_with_logging(
    command: &mut Command,
    cwd: &Utf8Path,
    env: &BTreeMap<String, String>,
    prefix: &str,
    log_callback: Option<LogCallback>,
) -> Result<CommandOutcome> {
    std::fs::create_dir_all(cwd)?;

    command
        .current_dir(cwd)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!("[{}] Running {:?} in {}", prefix, command.as_std(), cwd);

    let mut child = command.spawn().map_err(|e| {
        crate::Error::build(
            format!("[{}] Failed to start {:?}", prefix, command.as_std().get_program()),
            e.to_string(),
        )
    })?;

    let tail = Arc::new(Mutex::new(VecDeque::with_capacity(OUTPUT_TAIL_LINES)));

    let stdout_handle = child.stdout.take().map(|stdout| {
        tokio::spawn(forward_lines(
            stdout,
            prefix.to_string(),
            Arc::clone(&tail),
            log_callback.clone(),
        ))
    });
    let stderr_handle = child.stderr.take().map(|stderr| {
        tokio::spawn(forward_lines(
            stderr,
            prefix.to_string(),
            Arc::clone(&tail),
            log_callback.clone(),
        ))
    });

    let status = child.wait().await.map_err(|e| {
        crate::Error::build(format!("[{}] Failed to wait for command", prefix), e.to_string())
    })?;

    // Output may still be buffered after the child exits
    if let Some(handle) = stdout_handle {
        let _ = handle.await;
    }
    if let Some(handle) = stderr_handle {
        let _ = handle.await;
    }

    let tail = tail
        .lock()
        .map(|lines| lines.iter().cloned().collect())
        .unwrap_or_default();

    Ok(CommandOutcome { status, tail })
}

async fn forward_lines<R>(
    reader: R,
    prefix: String,
    tail: Arc<Mutex<VecDeque<String>>>,
    log_callback: Option<LogCallback>,
) where
    R: AsyncRead + Unpin,
{
    // Output is not always UTF-8; invalid bytes are replaced, never fatal
    let mut segments = BufReader::new(reader).split(b'\n');
    while let Ok(Some(segment)) = segments.next_segment().await {
        let line = String::from_utf8_lossy(&segment).trim_end_matches('\r').to_string();
        tracing::info!(target: "build_output", "[{}] {}", prefix, line);

        if let Some(ref callback) = log_callback {
            callback(&line);
        }

        if let Ok(mut tail) = tail.lock() {
            if tail.len() == OUTPUT_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_streams_combined_output() {
        let temp = tempfile::tempdir().unwrap();
        let cwd = Utf8Path::from_path(temp.path()).unwrap().join("work");

        let seen = Arc::new(AtomicUsize::new(0));
        let callback: LogCallback = {
            let seen = Arc::clone(&seen);
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        };

        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2; pwd"]);
        let outcome = run_command_with_logging(&mut cmd, &cwd, &BTreeMap::new(), "test", Some(callback))
            .await
            .unwrap();

        assert!(outcome.success());
        assert!(cwd.is_dir(), "working directory should be created");
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert!(outcome.tail.contains(&"out".to_string()));
        assert!(outcome.tail.contains(&"err".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_utf8_output_is_drained() {
        let temp = tempfile::tempdir().unwrap();
        let cwd = Utf8Path::from_path(temp.path()).unwrap();

        // Enough trailing output to fill the pipe if nobody reads it
        let mut cmd = Command::new("sh");
        cmd.args([
            "-c",
            "printf 'cc: warning \\377 latin1\\n'; sleep 0.2; i=0; while [ $i -lt 20000 ]; do echo line $i; i=$((i+1)); done; exit 0",
        ]);
        let outcome = run_command_with_logging(&mut cmd, cwd, &BTreeMap::new(), "test", None)
            .await
            .unwrap();

        assert!(outcome.success(), "command should finish normally: {:?}", outcome.status);
        assert_eq!(outcome.tail.len(), OUTPUT_TAIL_LINES);
        assert_eq!(outcome.tail.last().map(String::as_str), Some("line 19999"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_replaced() {
        let temp = tempfile::tempdir().unwrap();
        let cwd = Utf8Path::from_path(temp.path()).unwrap();

        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf 'bad \\377 byte\\nnext\\n'"]);
        let outcome = run_command_with_logging(&mut cmd, cwd, &BTreeMap::new(), "test", None)
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.tail, vec!["bad \u{fffd} byte", "next"]);
    }

    #[tokio::test]
    async fn test_reports_exit_status() {
        let temp = tempfile::tempdir().unwrap();
        let cwd = Utf8Path::from_path(temp.path()).unwrap();

        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo failing; exit 3"]);
        let outcome = run_command_with_logging(&mut cmd, cwd, &BTreeMap::new(), "test", None)
            .await
            .unwrap();

        assert!(!outcome.success());
        assert_eq!(outcome.code(), Some(3));
        assert_eq!(outcome.tail, vec!["failing"]);
    }

    #[tokio::test]
    async fn test_environment_overrides() {
        let temp = tempfile::tempdir().unwrap();
        let cwd = Utf8Path::from_path(temp.path()).unwrap();

        let env = BTreeMap::from([("LLVMBUILD_PROBE".to_string(), "42".to_string())]);
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo $LLVMBUILD_PROBE; test -n \"$PATH\" && echo inherited"]);
        let outcome = run_command_with_logging(&mut cmd, cwd, &env, "test", None)
            .await
            .unwrap();

        assert_eq!(outcome.tail, vec!["42", "inherited"]);
    }

    #[tokio::test]
    async fn test_tail_is_bounded() {
        let temp = tempfile::tempdir().unwrap();
        let cwd = Utf8Path::from_path(temp.path()).unwrap();

        let mut cmd = Command::new("sh");
        cmd.args(["-c", "i=0; while [ $i -lt 50 ]; do echo line$i; i=$((i+1)); done"]);
        let outcome = run_command_with_logging(&mut cmd, cwd, &BTreeMap::new(), "test", None)
            .await
            .unwrap();

        assert_eq!(outcome.tail.len(), OUTPUT_TAIL_LINES);
        assert_eq!(outcome.tail.last().unwrap(), "line49");
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let cwd = Utf8Path::from_path(temp.path()).unwrap();

        let mut cmd = Command::new("/nonexistent/program");
        let result = run_command_with_logging(&mut cmd, cwd, &BTreeMap::new(), "test", None).await;
        assert!(result.is_err());
    }
}
