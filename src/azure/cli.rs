//! Azure CLI command execution.
//!
//! Provides utilities for running Azure CLI commands and parsing their output.

use super::AzResult;
use colored::Colorize;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use tokio::process::Command;

/// Upper bound on captured stdout; larger answers are treated as an error.
const MAX_OUTPUT_BYTES: usize = 50_000_000;

/// Regex for splitting command strings while preserving quoted substrings.
static COMMAND_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_command_regex() -> &'static Regex {
    COMMAND_REGEX.get_or_init(|| {
        Regex::new(r#"'([^']*)'\s*|\"([^\"]*)\"\s*|([^'\s]*)\s*"#).expect("Invalid Regex")
    })
}

/// Run a shell command and return its stdout.
///
/// The command string is split on spaces, with quoted substrings preserved. The child
/// process is killed if the returned future is dropped, so callers bound it with a timeout.
pub async fn run(cmd: &str) -> AzResult<String> {
    log::debug!("run({cmd})", cmd = cmd.on_blue());

    let cmds: Vec<&str> = split_and_strip(cmd);
    log::trace!("split cmds={:?}", cmds);

    let program = cmds.first().ok_or("Empty command")?;
    let mut command = Command::new(program);
    command.args(cmds.iter().skip(1)).kill_on_drop(true);

    let output = command.output().await.map_err(|e| {
        log::error!("Command execution failed: {}", e);
        format!("Failed to execute command: {}", e)
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        log::trace!(
            "code={code:?}, status={status}\n┎######\nstderr=\n{stderr}\n┖######",
            code = output.status.code(),
            status = output.status,
            stderr = stderr.red()
        );
        log::warn!(
            "{failed} to run {cmd}",
            failed = "failed".on_red(),
            cmd = cmd.on_blue()
        );
        return Err(format!("ERROR running: {stderr}").into());
    }

    log::debug!("Success cmd: {cmd} stdout.len()={}", output.stdout.len());
    if output.stdout.len() > MAX_OUTPUT_BYTES {
        return Err(format!(
            "Response too large: {} bytes for command: {:?}",
            output.stdout.len(),
            cmds
        )
        .into());
    }

    let stdout = String::from_utf8(output.stdout).map_err(|e| format!("Invalid UTF-8: {}", e))?;
    Ok(stdout)
}

/// Run a command and deserialize its JSON output, reporting the failing JSON path.
pub async fn run_json<T: DeserializeOwned>(cmd: &str) -> AzResult<T> {
    let output = run(cmd).await?;
    parse_json(&output).map_err(|e| {
        log::trace!("OUTPUT START:\n\n{}\n\nOUTPUT END\n", output);
        format!("Error parsing output of '{cmd}': {e}").into()
    })
}

/// Deserialize JSON with the path of the offending field in the error message.
pub fn parse_json<T: DeserializeOwned>(json: &str) -> Result<T, String> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| format!("path={} error={}", e.path(), e.inner()))
}

/// Split a command string on spaces, preserving quoted substrings.
fn split_and_strip(input: &str) -> Vec<&str> {
    get_command_regex()
        .find_iter(input)
        .map(|m| m.as_str().trim().trim_matches('\'').trim_matches('"'))
        .collect()
}
