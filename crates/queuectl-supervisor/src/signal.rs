//! Platform signaling, isolated behind a small interface (spec.md §9): "send
//! graceful terminate", "check process alive", "force-kill". The claim/retry
//! protocol above this module is platform-agnostic; only this file knows
//! about Unix signals.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// Whether a process with the given PID currently exists.
///
/// Sends signal 0, which performs no action but still reports
/// `ESRCH` if the process is gone.
pub fn is_alive(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Ask a process to terminate gracefully (`SIGTERM`).
pub fn terminate(pid: u32) -> bool {
    matches!(
        signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM),
        Ok(())
    )
}

/// Kill a process unconditionally (`SIGKILL`).
pub fn force_kill(pid: u32) -> bool {
    matches!(
        signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL),
        Ok(())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};
    use std::time::Duration;

    #[test]
    fn is_alive_is_true_for_a_running_process_and_false_after_reaping() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id();

        assert!(is_alive(pid));

        child.kill().unwrap();
        child.wait().unwrap();

        assert!(!is_alive(pid));
    }

    #[test]
    fn terminate_sends_sigterm_and_process_exits() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id();

        assert!(terminate(pid));
        let status = child.wait().unwrap();
        assert!(!status.success());
        assert!(!is_alive(pid));
    }

    #[test]
    fn force_kill_terminates_a_process_ignoring_sigterm() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; sleep 30")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id();
        std::thread::sleep(Duration::from_millis(100));

        assert!(terminate(pid));
        std::thread::sleep(Duration::from_millis(100));
        assert!(is_alive(pid), "SIGTERM should have been trapped");

        assert!(force_kill(pid));
        let status = child.wait().unwrap();
        assert!(!status.success());
        assert!(!is_alive(pid));
    }

    #[test]
    fn operations_on_a_nonexistent_pid_report_failure() {
        // PID 1 belongs to init/systemd in any realistic sandbox; an unprivileged
        // process can observe it but cannot signal it, so use a PID that almost
        // certainly doesn't exist instead.
        let bogus_pid = 999_999;
        assert!(!is_alive(bogus_pid));
        assert!(!terminate(bogus_pid));
        assert!(!force_kill(bogus_pid));
    }
}
