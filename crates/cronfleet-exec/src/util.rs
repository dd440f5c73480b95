use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tempfile::TempPath;
use tokio::process::{Child, Command};
use tracing::debug;

/// How long a terminated group gets to exit before it is force-killed.
pub(crate) const KILL_GRACE: Duration = Duration::from_secs(2);

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        const HOME_VAR: &str = "USERPROFILE";
        const SCRIPT_SUFFIX: &str = ".bat";

        fn script_bytes(command: &str) -> Vec<u8> {
            let body = format!("@echo off\r\n{}", normalize_line_endings(command));
            let (bytes, _, _) = encoding_rs::GBK.encode(&body);
            bytes.into_owned()
        }

        fn native_line_endings(unix: String) -> String {
            unix.replace('\n', "\r\n")
        }

        pub(crate) fn script_command(script: &TempPath) -> Command {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(script.as_os_str());
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
            cmd
        }

        /// Decodes captured console bytes (GBK code page, UTF-8 fallback).
        pub(crate) fn decode_console(bytes: &[u8]) -> String {
            let (text, _, had_errors) = encoding_rs::GBK.decode(bytes);
            if had_errors {
                String::from_utf8_lossy(bytes).into_owned()
            } else {
                text.into_owned()
            }
        }

        /// Terminates the child's process tree: kill, [`KILL_GRACE`], then `taskkill /T /F`.
        pub(crate) async fn kill_group(child: &mut Child) {
            let Some(pid) = child.id() else {
                return;
            };
            let _ = child.start_kill();
            if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
                return;
            }
            debug!(target: "cronfleet.exec.shell", pid, "grace elapsed; taskkill tree");
            let _ = Command::new("taskkill")
                .args(["/T", "/F", "/PID", &pid.to_string()])
                .status()
                .await;
            let _ = child.wait().await;
        }

        /// Best-effort tree kill for a script that already exited.
        pub(crate) async fn kill_lingering(pid: u32) {
            let _ = Command::new("taskkill")
                .args(["/T", "/F", "/PID", &pid.to_string()])
                .status()
                .await;
        }
    } else {
        const HOME_VAR: &str = "HOME";
        const SCRIPT_SUFFIX: &str = ".sh";

        fn script_bytes(command: &str) -> Vec<u8> {
            normalize_line_endings(command).into_bytes()
        }

        fn native_line_endings(unix: String) -> String {
            unix
        }

        pub(crate) fn script_command(script: &TempPath) -> Command {
            let mut cmd = Command::new("/bin/bash");
            cmd.arg(script.as_os_str());
            // own group, so termination reaches everything the script forked
            cmd.process_group(0);
            cmd
        }

        pub(crate) fn decode_console(bytes: &[u8]) -> String {
            String::from_utf8_lossy(bytes).into_owned()
        }

        /// Terminates the child's whole process group: SIGTERM, [`KILL_GRACE`], then SIGKILL.
        pub(crate) async fn kill_group(child: &mut Child) {
            let Some(pid) = child.id() else {
                return;
            };
            let pgid = -(pid as libc::pid_t);

            // SAFETY: signal delivery to a group this process created; ESRCH is harmless.
            unsafe {
                libc::kill(pgid, libc::SIGTERM);
            }
            match tokio::time::timeout(KILL_GRACE, child.wait()).await {
                Ok(_) => debug!(target: "cronfleet.exec.shell", pid, "group leader exited on SIGTERM"),
                Err(_) => debug!(target: "cronfleet.exec.shell", pid, "grace elapsed; sending SIGKILL"),
            }
            // stragglers may still hold the output pipes open
            unsafe {
                libc::kill(pgid, libc::SIGKILL);
            }
            let _ = child.wait().await;
        }

        /// Kills what is left of a group whose leader was already reaped.
        ///
        /// The group id stays reserved while any member is alive, so it cannot name a stranger.
        pub(crate) async fn kill_lingering(pid: u32) {
            let pgid = -(pid as libc::pid_t);
            // SAFETY: see `kill_group`.
            unsafe {
                libc::kill(pgid, libc::SIGKILL);
            }
        }
    }
}

/// Working directory for scripts: the agent user's home, or the temp dir.
pub(crate) fn work_dir() -> PathBuf {
    std::env::var_os(HOME_VAR)
        .map(PathBuf::from)
        .filter(|p| p.is_dir())
        .unwrap_or_else(std::env::temp_dir)
}

fn script_prefix() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("cronfleet_{secs}_")
}

/// Writes `command` into a fresh temp script; the file is removed when the returned path drops.
pub(crate) fn write_script(command: &str) -> io::Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix(&script_prefix())
        .suffix(SCRIPT_SUFFIX)
        .tempfile()?;
    file.write_all(&script_bytes(command))?;
    file.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(file.into_temp_path())
}

/// Line endings native to the script interpreter.
pub(crate) fn normalize_line_endings(s: &str) -> String {
    native_line_endings(s.replace("\r\n", "\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn crlf_becomes_lf() {
        assert_eq!(normalize_line_endings("a\r\nb\nc"), "a\nb\nc");
    }

    #[cfg(unix)]
    #[test]
    fn script_is_private_and_removed_on_drop() {
        use std::os::unix::fs::PermissionsExt;

        let path = write_script("echo hi\r\n").unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o700);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "echo hi\n");

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("cronfleet_"));
        assert!(name.ends_with(".sh"));

        let owned = path.to_path_buf();
        drop(path);
        assert!(!owned.exists());
    }
}
