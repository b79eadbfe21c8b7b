//! Debuggee process acquisition: launch and attach.
//!
//! Launching spawns the interpreter on the playbook and waits for it to
//! publish its debug endpoint; attaching locates the endpoint of an
//! already-running debuggee by pid. Both paths end with a connected TCP
//! stream ready to be wrapped by the transport bridge.

use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

use crate::config::{AttachConfig, ConsoleTarget, LaunchConfig};
use crate::error::{DebugError, Result};

/// Environment variable telling the debuggee where to write its log.
const LOG_FILE_ENV: &str = "ANSIBUG_LOG_FILE";
/// Environment variable selecting the debuggee's log verbosity.
const LOG_LEVEL_ENV: &str = "ANSIBUG_LOG_LEVEL";

/// How often the launcher polls for the debuggee's endpoint file.
const ENDPOINT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How many polls before giving up on a freshly spawned debuggee.
const ENDPOINT_POLL_ATTEMPTS: u32 = 50;
/// How long a debuggee gets to exit after being asked to.
pub(crate) const GRACEFUL_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle on the debuggee process owned by one session.
#[derive(Debug)]
pub struct DebuggeeProcess {
	pid: u32,
	/// Present only for launched debuggees; attached ones stay unowned.
	child: Option<Child>,
}

impl DebuggeeProcess {
	pub fn pid(&self) -> u32 {
		self.pid
	}

	/// True when this session spawned the process itself.
	pub fn is_launched(&self) -> bool {
		self.child.is_some()
	}

	pub fn is_alive(&mut self) -> bool {
		match self.child.as_mut() {
			Some(child) => matches!(child.try_wait(), Ok(None)),
			None => adbg_runtime::pid_is_alive(self.pid),
		}
	}

	/// Force-kills a launched debuggee immediately. Attached debuggees are
	/// left running.
	pub async fn kill(&mut self) {
		if let Some(mut child) = self.child.take() {
			let _ = child.kill().await;
		}
	}

	/// Reaps a launched debuggee: a bounded wait for voluntary exit, then
	/// a forced kill. Attached debuggees are left running.
	pub async fn reap(&mut self) {
		let Some(mut child) = self.child.take() else {
			return;
		};

		match tokio::time::timeout(GRACEFUL_EXIT_TIMEOUT, child.wait()).await {
			Ok(Ok(status)) => {
				debug!(target: "adbg.launch", pid = self.pid, %status, "debuggee exited");
			}
			Ok(Err(err)) => {
				warn!(target: "adbg.launch", pid = self.pid, error = %err, "failed to reap debuggee");
			}
			Err(_) => {
				warn!(target: "adbg.launch", pid = self.pid, "debuggee did not exit in time, killing");
				let _ = child.kill().await;
			}
		}
	}
}

/// Everything a successful launch hands to the session.
#[derive(Debug)]
pub struct LaunchOutcome {
	pub process: DebuggeeProcess,
	pub stream: TcpStream,
	/// Piped standard streams, present for the integrated console target.
	pub stdout: Option<ChildStdout>,
	pub stderr: Option<ChildStderr>,
}

/// Argument vector passed to the interpreter: the playbook path followed
/// verbatim by the configured argument list.
pub(crate) fn interpreter_args(config: &LaunchConfig) -> Vec<std::ffi::OsString> {
	let mut args = Vec::with_capacity(1 + config.args.len());
	args.push(config.playbook.clone().into_os_string());
	args.extend(config.args.iter().map(std::ffi::OsString::from));
	args
}

/// Spawns the interpreter for `config` and connects to its debug endpoint.
pub async fn launch(config: &LaunchConfig) -> Result<LaunchOutcome> {
	if !config.cwd.is_dir() {
		return Err(DebugError::Launch(format!(
			"working directory {} does not exist",
			config.cwd.display()
		)));
	}

	let playbook = if config.playbook.is_absolute() {
		config.playbook.clone()
	} else {
		config.cwd.join(&config.playbook)
	};
	let readable = std::fs::metadata(&playbook)
		.map(|meta| meta.is_file())
		.unwrap_or(false);
	if !readable {
		return Err(DebugError::Launch(format!(
			"playbook {} is not a readable file",
			playbook.display()
		)));
	}

	let mut command = Command::new(&config.interpreter);
	command
		.args(interpreter_args(config))
		.current_dir(&config.cwd)
		.stdin(Stdio::null())
		.kill_on_drop(true);

	// Debuggee-internal logging travels out of band; the argv stays
	// exactly `<playbook> <args...>`.
	if let Some(log_file) = &config.log_file {
		command
			.env(LOG_FILE_ENV, log_file)
			.env(LOG_LEVEL_ENV, config.log_level.as_str());
	}

	match config.console {
		ConsoleTarget::Integrated => {
			command.stdout(Stdio::piped()).stderr(Stdio::piped());
		}
		ConsoleTarget::External => {
			command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
		}
	}

	let mut child = command.spawn().map_err(|err| {
		DebugError::Launch(format!(
			"failed to start {}: {err}",
			config.interpreter.display()
		))
	})?;

	let Some(pid) = child.id() else {
		return Err(DebugError::Launch(
			"debuggee exited immediately after spawn".to_string(),
		));
	};

	debug!(
		target: "adbg.launch",
		pid,
		interpreter = %config.interpreter.display(),
		playbook = %playbook.display(),
		"spawned debuggee, waiting for its endpoint"
	);

	let stdout = child.stdout.take();
	let stderr = child.stderr.take();

	match wait_for_debug_endpoint(&mut child, pid).await {
		Ok(stream) => Ok(LaunchOutcome {
			process: DebuggeeProcess {
				pid,
				child: Some(child),
			},
			stream,
			stdout,
			stderr,
		}),
		Err(err) => {
			let _ = child.kill().await;
			Err(err)
		}
	}
}

/// Polls for the endpoint file of a freshly spawned debuggee, bailing out
/// early when the process dies before publishing it.
async fn wait_for_debug_endpoint(child: &mut Child, pid: u32) -> Result<TcpStream> {
	let mut last_error = String::from("endpoint was never published");

	for _ in 0..ENDPOINT_POLL_ATTEMPTS {
		if let Ok(Some(status)) = child.try_wait() {
			return Err(DebugError::Launch(format!(
				"debuggee exited before its debug endpoint became available (status: {status})"
			)));
		}

		match adbg_runtime::read_endpoint(pid) {
			Ok(addr) => match adbg_runtime::connect(&addr).await {
				Ok(stream) => return Ok(stream),
				Err(err) => last_error = err.to_string(),
			},
			Err(err) => last_error = err.to_string(),
		}

		tokio::time::sleep(ENDPOINT_POLL_INTERVAL).await;
	}

	Err(DebugError::Launch(format!(
		"debuggee started but its debug endpoint never became reachable. Last error: {last_error}"
	)))
}

/// Connects to the debug endpoint of an already-running debuggee.
pub async fn attach(config: &AttachConfig) -> Result<(DebuggeeProcess, TcpStream)> {
	let pid = config.process_id;
	if !adbg_runtime::pid_is_alive(pid) {
		return Err(DebugError::Attach(format!(
			"no live debuggee process with id {pid}"
		)));
	}

	let addr = adbg_runtime::wait_for_endpoint(pid, 3, ENDPOINT_POLL_INTERVAL)
		.await
		.map_err(|err| DebugError::Attach(err.to_string()))?;

	let stream = adbg_runtime::connect(&addr)
		.await
		.map_err(|err| DebugError::Attach(err.to_string()))?;

	debug!(target: "adbg.launch", pid, %addr, "attached to running debuggee");

	Ok((DebuggeeProcess { pid, child: None }, stream))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::LogLevel;
	use std::path::PathBuf;

	fn launch_config(playbook: &str, args: &[&str]) -> LaunchConfig {
		LaunchConfig {
			playbook: PathBuf::from(playbook),
			args: args.iter().map(|a| a.to_string()).collect(),
			cwd: PathBuf::from("/tmp"),
			console: ConsoleTarget::Integrated,
			interpreter: PathBuf::from("ansible-playbook"),
			log_file: None,
			log_level: LogLevel::Info,
		}
	}

	#[test]
	fn interpreter_args_keep_editor_order() {
		let config = launch_config("site.yml", &["-i", "hosts.ini", "--check"]);
		let args = interpreter_args(&config);
		let args: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();
		assert_eq!(args, ["site.yml", "-i", "hosts.ini", "--check"]);
	}

	#[test]
	fn interpreter_args_without_extras_is_just_the_playbook() {
		let config = launch_config("deploy.yml", &[]);
		let args = interpreter_args(&config);
		assert_eq!(args.len(), 1);
		assert_eq!(args[0], "deploy.yml");
	}

	#[tokio::test]
	async fn launch_rejects_missing_working_directory() {
		let mut config = launch_config("site.yml", &[]);
		config.cwd = PathBuf::from("/definitely/not/a/dir");

		let err = launch(&config).await.unwrap_err();
		assert!(matches!(err, DebugError::Launch(ref m) if m.contains("working directory")));
	}

	#[tokio::test]
	async fn launch_rejects_unreadable_playbook() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = launch_config("missing.yml", &[]);
		config.cwd = dir.path().to_path_buf();

		let err = launch(&config).await.unwrap_err();
		assert!(matches!(err, DebugError::Launch(ref m) if m.contains("playbook")));
	}

	#[tokio::test]
	async fn launch_detects_early_debuggee_exit() {
		let dir = tempfile::tempdir().unwrap();
		let playbook = dir.path().join("site.yml");
		std::fs::write(&playbook, "exit 3\n").unwrap();

		let mut config = launch_config("site.yml", &[]);
		config.cwd = dir.path().to_path_buf();
		config.interpreter = PathBuf::from("/bin/sh");

		let err = launch(&config).await.unwrap_err();
		assert!(
			matches!(err, DebugError::Launch(ref m) if m.contains("exited before")),
			"unexpected error: {err}"
		);
	}

	#[tokio::test]
	async fn attach_to_dead_pid_fails() {
		// Spawn and reap a process so the pid is known to be dead.
		let mut child = std::process::Command::new("true").spawn().unwrap();
		let pid = child.id();
		child.wait().unwrap();

		let err = attach(&AttachConfig { process_id: pid }).await.unwrap_err();
		assert!(matches!(err, DebugError::Attach(ref m) if m.contains("no live debuggee")));
	}
}
