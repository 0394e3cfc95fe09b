//! External command execution for extension generators.

use crate::log;
use anyhow::{Context, Result, bail};
use regex::Regex;
use std::{
    borrow::Cow,
    ffi::OsString,
    path::Path,
    process::{Command, Output},
    sync::LazyLock,
};

/// Run `cmd[0]` with the remaining elements as arguments.
///
/// Fails with the command's stderr when it exits unsuccessfully; on success
/// its stderr (usually warnings) is logged under the program name.
pub fn exec(root: Option<&Path>, cmd: &[OsString]) -> Result<Output> {
    let (name, mut command) = prepare(root, cmd)?;

    let output = command
        .output()
        .with_context(|| format!("Failed to execute `{name}`"))?;

    log_output(&name, &output)?;
    Ok(output)
}

/// Prepare a Command from components.
fn prepare(root: Option<&Path>, cmd: &[OsString]) -> Result<(String, Command)> {
    let Some((program, args)) = cmd.split_first() else {
        bail!("Empty command");
    };
    let name = Path::new(program)
        .file_name()
        .unwrap_or(program)
        .to_string_lossy()
        .into_owned();

    let mut command = Command::new(program);
    command.args(args);

    if let Some(dir) = root {
        command.current_dir(dir);
    }

    Ok((name, command))
}

fn strip_ansi(s: &str) -> Cow<'_, str> {
    static RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ANSI pattern"));
    RE.replace_all(s, "")
}

fn log_output(name: &str, output: &Output) -> Result<()> {
    if !output.status.success() {
        bail!(format_error(name, output));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<_> = stderr
        .lines()
        .map(strip_ansi)
        .filter(|line| !line.trim().is_empty())
        .collect();
    if !lines.is_empty() {
        log!(name; "{}", lines.join("\n"));
    }

    Ok(())
}

fn format_error(name: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let mut msg = format!("Command `{name}` failed with {}", output.status);
    for (label, text) in [("Stderr", stderr.trim()), ("Stdout", stdout.trim())] {
        if !text.is_empty() {
            msg.push_str(&format!("\n{label}:\n{}", strip_ansi(text)));
        }
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_prepare_empty() {
        assert!(prepare(None, &[]).is_err());
    }

    #[test]
    fn test_prepare_name_is_file_name() {
        let (name, _) = prepare(None, &os(&["/usr/bin/lessc", "a.less"])).unwrap();
        assert_eq!(name, "lessc");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = exec(Some(dir.path()), &os(&["sh", "-c", "pwd"])).unwrap();
        assert!(!output.stdout.is_empty());

        let err = exec(None, &os(&["sh", "-c", "echo broken >&2; exit 3"])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Command `sh` failed"));
        assert!(msg.contains("broken"));
    }

    #[test]
    fn test_missing_program() {
        let err = exec(None, &os(&["definitely-not-a-real-program-xyz"])).unwrap_err();
        assert!(err.to_string().contains("Failed to execute"));
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_ansi("\x1b[1;32mGreen Bold\x1b[0m"), "Green Bold");
        assert_eq!(strip_ansi("Plain text"), "Plain text");
    }
}
