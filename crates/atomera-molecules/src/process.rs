//! Subprocess execution shared by the tool runners.

use atomera_jobs::StageFailure;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Exit code the kernel OOM killer leaves behind (128 + SIGKILL).
const OOM_KILLED_EXIT: i32 = 137;

/// Run `command` to completion and classify a non-zero exit as a [`StageFailure`].
///
/// The child is killed if the calling task is dropped (stage timeout).
pub async fn run_tool(tool: &str, command: &mut Command) -> Result<Output, StageFailure> {
    command.kill_on_drop(true);
    debug!("Spawning {}: {:?}", tool, command.as_std());

    let output = command.output().await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            StageFailure::tool_crash(format!("{} executable not found", tool))
        }
        _ => StageFailure::tool_crash(format!("failed to start {}: {}", tool, e)),
    })?;

    if output.status.success() {
        return Ok(output);
    }
    Err(classify_failure(tool, output.status.code(), &String::from_utf8_lossy(&output.stderr)))
}

pub fn classify_failure(tool: &str, code: Option<i32>, stderr: &str) -> StageFailure {
    let tail = last_line(stderr);
    let lowered = stderr.to_ascii_lowercase();
    if code == Some(OOM_KILLED_EXIT)
        || lowered.contains("out of memory")
        || lowered.contains("outofmemoryerror")
    {
        return StageFailure::resource_exhausted(format!("{} ran out of memory: {}", tool, tail));
    }
    match code {
        Some(code) => StageFailure::tool_crash(format!("{} exited with status {}: {}", tool, code, tail)),
        None => StageFailure::tool_crash(format!("{} was terminated by a signal: {}", tool, tail)),
    }
}

fn last_line(stderr: &str) -> &str {
    stderr.lines().rev().find(|l| !l.trim().is_empty()).map(str::trim).unwrap_or("no output")
}

/// ENOSPC on Linux and macOS.
const NO_SPACE_LEFT: i32 = 28;

/// Map an IO error on a work directory to a failure.
pub fn io_failure(context: &str, e: std::io::Error) -> StageFailure {
    if e.raw_os_error() == Some(NO_SPACE_LEFT) {
        return StageFailure::resource_exhausted(format!("{}: {}", context, e));
    }
    StageFailure::tool_crash(format!("{}: {}", context, e))
}
