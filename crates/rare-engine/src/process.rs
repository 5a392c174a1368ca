use std::path::Path;
use std::process::Command;

use rare_core::errors::ErrorInfo;
use rare_core::RareError;
use tracing::debug;

const STDERR_TAIL_LINES: usize = 20;

/// Runs `argv` to completion and returns its captured stdout.
///
/// Spawn failures and non-zero exit statuses are reported through `family`,
/// so callers decide whether a failure is a step or an analysis error.
pub fn run_command(
    argv: &[String],
    cwd: Option<&Path>,
    family: fn(ErrorInfo) -> RareError,
) -> Result<String, RareError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(RareError::Config(ErrorInfo::new(
            "command-empty",
            "command line must contain at least the program name",
        )));
    };
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    debug!(program = %program, args = ?args, cwd = ?cwd, "spawning external command");

    let output = command.output().map_err(|err| {
        family(
            ErrorInfo::new("command-spawn", err.to_string())
                .with_context("program", program.clone())
                .with_hint("check that the executable is installed and on PATH"),
        )
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        let status = output
            .status
            .code()
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".into());
        return Err(family(
            ErrorInfo::new("command-exit", format!("{program} exited unsuccessfully"))
                .with_context("status", status)
                .with_context("stderr", tail),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
