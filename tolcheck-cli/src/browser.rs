//! Opening files and URLs with the platform's default handler.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use anyhow::Context;

/// The program that hands a URL or file to the default application.
#[must_use]
pub fn opener_program() -> &'static str {
    if cfg!(windows) {
        "cmd"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

fn missing_opener(program: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "'{program}' was not found on PATH, so the browser cannot be opened. \
         Install it or start with --no-browser and open the address yourself."
    )
}

/// Locate the opener on the process search path.
///
/// # Errors
///
/// Returns an error naming the program when it is not on `PATH`.
pub fn find_opener() -> anyhow::Result<PathBuf> {
    let program = opener_program();
    which::which(program).map_err(|_| missing_opener(program))
}

/// Locate the opener on an explicit search path.
///
/// # Errors
///
/// Returns an error naming the program when it is not found.
pub fn find_opener_in(search_path: &OsStr, cwd: &Path) -> anyhow::Result<PathBuf> {
    let program = opener_program();
    which::which_in(program, Some(search_path), cwd).map_err(|_| missing_opener(program))
}

/// Open `target` (a URL or a file path) without waiting for the viewer.
///
/// # Errors
///
/// Returns an error if the opener is missing or cannot be started.
pub fn open(target: &OsStr) -> anyhow::Result<()> {
    let opener = find_opener()?;
    let mut command = Command::new(&opener);
    if cfg!(windows) {
        // `start` takes the window title as its first quoted argument
        command.args(["/C", "start", ""]);
    }
    command.arg(target);
    spawn_reaped(&mut command).with_context(|| format!("Failed to run {}", opener.display()))?;
    Ok(())
}

/// Start `command` with null stdio and wait for it on a helper thread.
fn spawn_reaped(command: &mut Command) -> std::io::Result<JoinHandle<std::io::Result<ExitStatus>>> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(thread::spawn(move || child.wait()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_missing_opener_names_program() {
        let empty = TempDir::new().unwrap();
        let err = find_opener_in(empty.path().as_os_str(), empty.path()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(opener_program()));
        assert!(msg.contains("--no-browser"));
    }

    #[cfg(unix)]
    #[test]
    fn test_opener_found_on_search_path() {
        use std::os::unix::fs::PermissionsExt;

        let bin = TempDir::new().unwrap();
        let opener = bin.path().join(opener_program());
        std::fs::write(&opener, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&opener, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = find_opener_in(bin.path().as_os_str(), bin.path()).unwrap();
        assert_eq!(found, opener);
    }

    #[cfg(unix)]
    #[test]
    fn test_spawned_opener_is_reaped() {
        let reaper = spawn_reaped(Command::new("sh").args(["-c", "exit 3"])).unwrap();
        let status = reaper.join().unwrap().unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
