//! Liveness probing for debuggee processes.

use std::path::PathBuf;

/// Returns `true` when a process with `pid` appears alive on this platform.
///
/// The playbook interpreter only runs on POSIX control nodes, so the
/// fallback path is a plain `kill -0` probe when `/proc` is unavailable.
pub fn pid_is_alive(pid: u32) -> bool {
	#[cfg(unix)]
	{
		if pid == 0 {
			return false;
		}

		if PathBuf::from("/proc").join(pid.to_string()).exists() {
			return true;
		}

		std::process::Command::new("kill")
			.arg("-0")
			.arg(pid.to_string())
			.status()
			.map(|status| status.success())
			.unwrap_or(pid == std::process::id())
	}

	#[cfg(not(unix))]
	{
		pid == std::process::id()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[cfg(unix)]
	#[test]
	fn current_process_is_alive() {
		assert!(pid_is_alive(std::process::id()));
	}

	#[cfg(unix)]
	#[test]
	fn pid_zero_is_never_alive() {
		assert!(!pid_is_alive(0));
	}

	#[cfg(unix)]
	#[test]
	fn exited_child_is_not_alive() {
		let mut child = std::process::Command::new("true")
			.spawn()
			.expect("spawn true");
		let pid = child.id();
		child.wait().expect("wait for child");
		assert!(!pid_is_alive(pid));
	}
}
