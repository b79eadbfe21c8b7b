//! Session configuration resolution and validation.
//!
//! The editor hands over a raw JSON object with a `request` discriminator;
//! this module resolves any `${command:...}` placeholders through the
//! resolver registry and validates the result into a typed
//! [`SessionConfig`]. Resolution never retries: a bad field is surfaced
//! once as a configuration error for the user to fix.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DebugError, Result};
use crate::variables::{self, ResolverRegistry};

/// Interpreter spawned for launch requests unless overridden.
pub const DEFAULT_INTERPRETER: &str = "ansible-playbook";

/// Where the spawned debuggee's standard streams surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleTarget {
	/// Piped into the session and republished as output events.
	#[default]
	Integrated,
	/// Inherited from the host process.
	External,
}

impl ConsoleTarget {
	fn parse(value: &str) -> Result<Self> {
		match value {
			"integrated" => Ok(Self::Integrated),
			"external" => Ok(Self::External),
			other => Err(DebugError::Configuration(format!(
				"unknown console target {other:?} (expected \"integrated\" or \"external\")"
			))),
		}
	}
}

/// Verbosity of the debuggee's own log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
	#[default]
	Info,
	Debug,
	Warning,
	Error,
}

impl LogLevel {
	fn parse(value: &str) -> Result<Self> {
		match value {
			"info" => Ok(Self::Info),
			"debug" => Ok(Self::Debug),
			"warning" => Ok(Self::Warning),
			"error" => Ok(Self::Error),
			other => Err(DebugError::Configuration(format!(
				"unknown log level {other:?}"
			))),
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Info => "info",
			Self::Debug => "debug",
			Self::Warning => "warning",
			Self::Error => "error",
		}
	}
}

/// Validated configuration for launching a new debuggee.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
	pub playbook: PathBuf,
	/// Appended verbatim after the playbook path when spawning.
	pub args: Vec<String>,
	pub cwd: PathBuf,
	pub console: ConsoleTarget,
	pub interpreter: PathBuf,
	pub log_file: Option<PathBuf>,
	/// Only takes effect when `log_file` is set.
	pub log_level: LogLevel,
}

/// Validated configuration for attaching to a running debuggee.
#[derive(Debug, Clone)]
pub struct AttachConfig {
	pub process_id: u32,
}

/// The two ways a session can be bound to a debuggee.
#[derive(Debug, Clone)]
pub enum SessionConfig {
	Launch(LaunchConfig),
	Attach(AttachConfig),
}

impl SessionConfig {
	pub fn is_launch(&self) -> bool {
		matches!(self, Self::Launch(_))
	}
}

/// Raw editor-supplied configuration before resolution.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSessionConfig {
	request: Option<String>,
	playbook: Option<String>,
	args: Vec<String>,
	cwd: Option<String>,
	console: Option<String>,
	interpreter: Option<String>,
	log_file: Option<String>,
	log_level: Option<String>,
	process_id: Option<Value>,
}

/// Resolves and validates a raw configuration object.
///
/// `workspace_root` supplies the default working directory for launch
/// requests. Placeholder fields are resolved through `registry`, which may
/// prompt the user; that is the only side effect here.
pub async fn resolve(
	raw: Value,
	registry: &ResolverRegistry,
	workspace_root: &Path,
) -> Result<SessionConfig> {
	let raw: RawSessionConfig = serde_json::from_value(raw)
		.map_err(|err| DebugError::Configuration(format!("malformed configuration: {err}")))?;

	match raw.request.as_deref() {
		Some("launch") => resolve_launch(raw, registry, workspace_root).await,
		Some("attach") => resolve_attach(raw, registry).await,
		Some(other) => Err(DebugError::Configuration(format!(
			"unknown request kind {other:?} (expected \"launch\" or \"attach\")"
		))),
		None => Err(DebugError::Configuration(
			"configuration is missing the `request` field".to_string(),
		)),
	}
}

async fn resolve_launch(
	raw: RawSessionConfig,
	registry: &ResolverRegistry,
	workspace_root: &Path,
) -> Result<SessionConfig> {
	let playbook = resolve_field(raw.playbook, registry).await?.ok_or_else(|| {
		DebugError::Configuration("`playbook` is required for a launch request".to_string())
	})?;

	let console = match raw.console.as_deref() {
		Some(value) => ConsoleTarget::parse(value)?,
		None => ConsoleTarget::default(),
	};

	// A log level without a log file is accepted and simply has no effect.
	let log_level = match raw.log_level.as_deref() {
		Some(value) => LogLevel::parse(value)?,
		None => LogLevel::default(),
	};

	let cwd = raw
		.cwd
		.map(PathBuf::from)
		.unwrap_or_else(|| workspace_root.to_path_buf());

	Ok(SessionConfig::Launch(LaunchConfig {
		playbook: PathBuf::from(playbook),
		args: raw.args,
		cwd,
		console,
		interpreter: raw
			.interpreter
			.map(PathBuf::from)
			.unwrap_or_else(|| PathBuf::from(DEFAULT_INTERPRETER)),
		log_file: raw.log_file.map(PathBuf::from),
		log_level,
	}))
}

async fn resolve_attach(raw: RawSessionConfig, registry: &ResolverRegistry) -> Result<SessionConfig> {
	let process_id = match raw.process_id {
		Some(Value::Number(number)) => number.as_u64().and_then(|pid| u32::try_from(pid).ok()),
		Some(Value::String(text)) => resolve_field(Some(text), registry)
			.await?
			.and_then(|text| text.trim().parse::<u32>().ok()),
		Some(_) => None,
		None => {
			return Err(DebugError::Configuration(
				"`processId` is required for an attach request".to_string(),
			));
		}
	};

	match process_id {
		Some(process_id) => Ok(SessionConfig::Attach(AttachConfig { process_id })),
		None => Err(DebugError::Configuration(
			"`processId` must be a process id, as a number or numeric string".to_string(),
		)),
	}
}

/// Resolves one string field, substituting `${command:Name}` placeholders
/// through the registry and passing literals through untouched.
async fn resolve_field(
	value: Option<String>,
	registry: &ResolverRegistry,
) -> Result<Option<String>> {
	let Some(value) = value else {
		return Ok(None);
	};

	match variables::command_placeholder(&value) {
		Some(name) => registry.resolve(name).await.map(Some),
		None => Ok(Some(value)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::variables::{PICK_PLAYBOOK, PICK_PROCESS, ResolverFuture, VariableResolver};
	use serde_json::json;
	use std::sync::Arc;

	fn registry_with(name: &str, value: &'static str) -> ResolverRegistry {
		let mut registry = ResolverRegistry::new();
		let resolver: Arc<dyn VariableResolver> = Arc::new(move || {
			Box::pin(async move { Ok(value.to_string()) }) as ResolverFuture<'static>
		});
		registry.register(name, resolver);
		registry
	}

	fn root() -> PathBuf {
		PathBuf::from("/workspace")
	}

	async fn resolve_ok(raw: Value) -> SessionConfig {
		resolve(raw, &ResolverRegistry::new(), &root()).await.unwrap()
	}

	async fn resolve_err(raw: Value) -> DebugError {
		resolve(raw, &ResolverRegistry::new(), &root()).await.unwrap_err()
	}

	#[tokio::test]
	async fn launch_defaults_are_applied() {
		let config = resolve_ok(json!({"request": "launch", "playbook": "site.yml"})).await;

		let SessionConfig::Launch(launch) = config else {
			panic!("expected launch config");
		};
		assert_eq!(launch.playbook, PathBuf::from("site.yml"));
		assert!(launch.args.is_empty());
		assert_eq!(launch.cwd, root());
		assert_eq!(launch.console, ConsoleTarget::Integrated);
		assert_eq!(launch.interpreter, PathBuf::from(DEFAULT_INTERPRETER));
		assert!(launch.log_file.is_none());
	}

	#[tokio::test]
	async fn launch_without_playbook_is_rejected() {
		let err = resolve_err(json!({"request": "launch"})).await;
		assert!(matches!(err, DebugError::Configuration(ref m) if m.contains("playbook")));
	}

	#[tokio::test]
	async fn playbook_placeholder_is_resolved() {
		let registry = registry_with(PICK_PLAYBOOK, "picked/deploy.yml");
		let config = resolve(
			json!({"request": "launch", "playbook": "${command:PickAnsiblePlaybook}"}),
			&registry,
			&root(),
		)
		.await
		.unwrap();

		let SessionConfig::Launch(launch) = config else {
			panic!("expected launch config");
		};
		assert_eq!(launch.playbook, PathBuf::from("picked/deploy.yml"));
	}

	#[tokio::test]
	async fn unknown_console_target_is_rejected() {
		let err = resolve_err(json!({
			"request": "launch",
			"playbook": "site.yml",
			"console": "detached"
		}))
		.await;
		assert!(matches!(err, DebugError::Configuration(ref m) if m.contains("console")));
	}

	#[tokio::test]
	async fn log_level_without_log_file_is_accepted() {
		let config = resolve_ok(json!({
			"request": "launch",
			"playbook": "site.yml",
			"logLevel": "debug"
		}))
		.await;

		let SessionConfig::Launch(launch) = config else {
			panic!("expected launch config");
		};
		assert_eq!(launch.log_level, LogLevel::Debug);
		assert!(launch.log_file.is_none());
	}

	#[tokio::test]
	async fn unknown_log_level_is_rejected() {
		let err = resolve_err(json!({
			"request": "launch",
			"playbook": "site.yml",
			"logLevel": "trace"
		}))
		.await;
		assert!(matches!(err, DebugError::Configuration(_)));
	}

	#[tokio::test]
	async fn attach_accepts_numeric_and_string_pids() {
		let config = resolve_ok(json!({"request": "attach", "processId": 4242})).await;
		let SessionConfig::Attach(attach) = config else {
			panic!("expected attach config");
		};
		assert_eq!(attach.process_id, 4242);

		let config = resolve_ok(json!({"request": "attach", "processId": "998"})).await;
		let SessionConfig::Attach(attach) = config else {
			panic!("expected attach config");
		};
		assert_eq!(attach.process_id, 998);
	}

	#[tokio::test]
	async fn attach_pid_placeholder_is_resolved() {
		let registry = registry_with(PICK_PROCESS, "31337");
		let config = resolve(
			json!({"request": "attach", "processId": "${command:PickAnsibleProcess}"}),
			&registry,
			&root(),
		)
		.await
		.unwrap();

		let SessionConfig::Attach(attach) = config else {
			panic!("expected attach config");
		};
		assert_eq!(attach.process_id, 31337);
	}

	#[tokio::test]
	async fn attach_rejects_missing_or_garbage_pid() {
		let err = resolve_err(json!({"request": "attach"})).await;
		assert!(matches!(err, DebugError::Configuration(ref m) if m.contains("processId")));

		let err = resolve_err(json!({"request": "attach", "processId": "not-a-pid"})).await;
		assert!(matches!(err, DebugError::Configuration(_)));
	}

	#[tokio::test]
	async fn unknown_request_kind_is_rejected() {
		let err = resolve_err(json!({"request": "restart"})).await;
		assert!(matches!(err, DebugError::Configuration(ref m) if m.contains("restart")));

		let err = resolve_err(json!({})).await;
		assert!(matches!(err, DebugError::Configuration(ref m) if m.contains("request")));
	}
}
