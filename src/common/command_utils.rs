use crate::error::{ChartifyError, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Execute a command and return its raw output
pub fn execute_command(cmd: &str, args: &[&str], cwd: Option<&Path>) -> Result<Output> {
    let mut command = Command::new(cmd);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    log::debug!("Running {} {}", cmd, args.join(" "));
    let output = command.output()?;
    Ok(output)
}

/// Execute a command, failing with [`ChartifyError::CommandFailed`] on a
/// non-zero exit. Returns stdout.
pub fn run_checked(cmd: &str, args: &[&str], cwd: Option<&Path>) -> Result<String> {
    let output = execute_command(cmd, args, cwd)?;
    if !output.status.success() {
        return Err(ChartifyError::CommandFailed {
            command: format!("{} {}", cmd, args.join(" ")),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Check if a command is available in PATH
pub fn is_command_available(cmd: &str) -> bool {
    Command::new(cmd)
        .arg("version")
        .output()
        .is_ok()
}
