//! Debug session lifecycle and run control.
//!
//! A [`DebugSession`] sequences configuration, debuggee acquisition, the
//! protocol handshake, breakpoint flushing, and termination, and owns its
//! transport, process handle, and breakpoint map exclusively. Editor-facing
//! output is a stream of [`SessionEvent`]s; debuggee events arrive on the
//! connection's inbound stream and are folded into the state machine by a
//! background pump task.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use adbg_protocol::requests::commands;
use adbg_protocol::{
	Capabilities, ContinuedEventBody, DisconnectArguments, EvaluateArguments,
	EvaluateResponseBody, Event, ExitedEventBody, InitializeArguments, OutputEventBody,
	RunControlArguments, StoppedEventBody, events::names,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::breakpoints::{BreakpointSpec, BreakpointSynchronizer, SessionBreakpoint};
use crate::config::{self, SessionConfig};
use crate::connection::{Connection, ConnectionEvent};
use crate::error::{DebugError, Result};
use crate::launcher::{self, DebuggeeProcess};
use crate::variables::ResolverRegistry;

/// How long the debuggee gets to complete the protocol handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a graceful disconnect request may take before it is abandoned.
const GRACEFUL_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Session identifier, unique within one editor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Lifecycle states of a debug session. `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Created,
	Configuring,
	Launching,
	Attaching,
	Initializing,
	Running,
	Stopped,
	Terminating,
	Terminated,
}

impl SessionState {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Terminated)
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Created => "created",
			Self::Configuring => "configuring",
			Self::Launching => "launching",
			Self::Attaching => "attaching",
			Self::Initializing => "initializing",
			Self::Running => "running",
			Self::Stopped => "stopped",
			Self::Terminating => "terminating",
			Self::Terminated => "terminated",
		};
		f.write_str(name)
	}
}

/// Editor-facing notifications produced by a session.
#[derive(Debug)]
pub enum SessionEvent {
	StateChanged {
		from: SessionState,
		to: SessionState,
	},
	/// The debuggee paused (breakpoint hit, step done, manual pause).
	Stopped {
		reason: String,
		description: Option<String>,
		hit_breakpoint_ids: Vec<i64>,
	},
	/// Execution resumed, by editor command or by the debuggee itself.
	Continued,
	/// A line of debuggee output (console streams or protocol output).
	Output {
		category: Option<String>,
		output: String,
	},
	/// The debuggee re-verified a breakpoint after loading more script.
	BreakpointChanged(SessionBreakpoint),
	/// Terminal notification; nothing follows it.
	Terminated { exit_code: Option<i64> },
}

/// One end-to-end debugging interaction, bound to one debuggee process.
pub struct DebugSession {
	id: SessionId,
	state: RwLock<SessionState>,
	events: mpsc::UnboundedSender<SessionEvent>,
	config: RwLock<Option<SessionConfig>>,
	connection: RwLock<Option<Arc<Connection>>>,
	breakpoints: BreakpointSynchronizer,
	process: tokio::sync::Mutex<Option<DebuggeeProcess>>,
	capabilities: RwLock<Capabilities>,
	stopped_thread: Mutex<Option<i64>>,
	exit_code: Mutex<Option<i64>>,
	finalized: AtomicBool,
}

impl DebugSession {
	/// Creates a session in the `Created` state.
	///
	/// Breakpoints may be set immediately; they are queued and pushed to
	/// the debuggee once a started session reaches its configuration-done
	/// point.
	pub fn new(id: SessionId) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let session = Arc::new(Self {
			id,
			state: RwLock::new(SessionState::Created),
			events: events_tx,
			config: RwLock::new(None),
			connection: RwLock::new(None),
			breakpoints: BreakpointSynchronizer::new(),
			process: tokio::sync::Mutex::new(None),
			capabilities: RwLock::new(Capabilities::default()),
			stopped_thread: Mutex::new(None),
			exit_code: Mutex::new(None),
			finalized: AtomicBool::new(false),
		});
		(session, events_rx)
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn state(&self) -> SessionState {
		*self.state.read()
	}

	/// Capabilities negotiated with the debuggee during the handshake.
	pub fn capabilities(&self) -> Capabilities {
		self.capabilities.read().clone()
	}

	/// The resolved configuration, available once `start` passed
	/// configuration resolution.
	pub fn config(&self) -> Option<SessionConfig> {
		self.config.read().clone()
	}

	/// Drives the session from `Created` to `Running`.
	///
	/// Any configuration, launch/attach, or handshake failure moves the
	/// session directly to `Terminated` and is returned to the caller
	/// exactly once; nothing here retries.
	pub async fn start(
		self: &Arc<Self>,
		raw: Value,
		resolvers: &ResolverRegistry,
		workspace_root: &Path,
	) -> Result<()> {
		self.require(SessionState::Created)?;

		self.transition(SessionState::Configuring);
		let session_config = match config::resolve(raw, resolvers, workspace_root).await {
			Ok(session_config) => session_config,
			Err(err) => return self.abort_startup(err).await,
		};
		*self.config.write() = Some(session_config.clone());

		let (stream, stdout, stderr) = match session_config {
			SessionConfig::Launch(launch_config) => {
				self.transition(SessionState::Launching);
				match launcher::launch(&launch_config).await {
					Ok(outcome) => {
						*self.process.lock().await = Some(outcome.process);
						(outcome.stream, outcome.stdout, outcome.stderr)
					}
					Err(err) => return self.abort_startup(err).await,
				}
			}
			SessionConfig::Attach(attach_config) => {
				self.transition(SessionState::Attaching);
				match launcher::attach(&attach_config).await {
					Ok((process, stream)) => {
						*self.process.lock().await = Some(process);
						(stream, None, None)
					}
					Err(err) => return self.abort_startup(err).await,
				}
			}
		};

		let (connection, mut inbound) = Connection::establish(stream);
		*self.connection.write() = Some(Arc::clone(&connection));
		self.breakpoints.bind(Arc::clone(&connection));

		self.transition(SessionState::Initializing);
		if let Err(err) = self.initialize(&connection, &mut inbound).await {
			return self.abort_startup(err).await;
		}

		self.transition(SessionState::Running);
		info!(target: "adbg.session", session = %self.id, "session is running");

		if let Some(stdout) = stdout {
			self.spawn_output_pump(stdout, "stdout");
		}
		if let Some(stderr) = stderr {
			self.spawn_output_pump(stderr, "stderr");
		}
		tokio::spawn(event_pump(Arc::clone(self), inbound));

		Ok(())
	}

	/// Replaces the breakpoint set for one script file.
	pub async fn set_breakpoints(
		&self,
		path: &Path,
		specs: Vec<BreakpointSpec>,
	) -> Result<Vec<SessionBreakpoint>> {
		if self.state().is_terminal() {
			return Err(DebugError::InvalidState(self.state().to_string()));
		}
		self.breakpoints.set_file_breakpoints(path, specs).await
	}

	/// Current breakpoint entities for one script file.
	pub fn breakpoints_for(&self, path: &Path) -> Vec<SessionBreakpoint> {
		self.breakpoints.snapshot(path)
	}

	/// Resumes a stopped debuggee.
	pub async fn resume(&self) -> Result<()> {
		self.run_control(commands::CONTINUE).await
	}

	/// Steps over the current task.
	pub async fn step_over(&self) -> Result<()> {
		self.run_control(commands::NEXT).await
	}

	/// Steps into the current task's included scope.
	pub async fn step_in(&self) -> Result<()> {
		self.run_control(commands::STEP_IN).await
	}

	/// Steps out of the current scope.
	pub async fn step_out(&self) -> Result<()> {
		self.run_control(commands::STEP_OUT).await
	}

	/// Asks a running debuggee to pause; the state flips on its stop event.
	pub async fn pause(&self) -> Result<()> {
		self.require(SessionState::Running)?;
		let connection = self.connection()?;
		let arguments = serde_json::to_value(RunControlArguments {
			thread_id: self.current_thread(),
		})?;
		connection.send(commands::PAUSE, Some(arguments)).await?;
		Ok(())
	}

	/// Evaluates an expression in the debuggee while stopped.
	pub async fn evaluate(&self, expression: &str) -> Result<String> {
		self.require(SessionState::Stopped)?;
		let connection = self.connection()?;
		let arguments = serde_json::to_value(EvaluateArguments {
			expression: expression.to_string(),
			frame_id: None,
			context: Some("repl".to_string()),
		})?;
		let response = connection.send(commands::EVALUATE, Some(arguments)).await?;
		let body: EvaluateResponseBody = response
			.body
			.map(serde_json::from_value)
			.transpose()?
			.unwrap_or_default();
		Ok(body.result)
	}

	/// Ends the session: graceful disconnect under a bounded timeout,
	/// forced kill for launched debuggees that outlive it. Attached
	/// debuggees are left running; only the transport is closed.
	pub async fn terminate(&self) -> Result<()> {
		if self.state().is_terminal() {
			return Ok(());
		}
		self.transition(SessionState::Terminating);

		let connection = self.connection.read().clone();
		let launched = {
			self.process
				.lock()
				.await
				.as_ref()
				.map(|process| process.is_launched())
				.unwrap_or(false)
		};

		if let Some(connection) = &connection {
			if !connection.is_closed() {
				let arguments = serde_json::to_value(DisconnectArguments {
					terminate_debuggee: Some(launched),
				})?;
				let graceful = tokio::time::timeout(
					GRACEFUL_DISCONNECT_TIMEOUT,
					connection.send(commands::DISCONNECT, Some(arguments)),
				)
				.await;
				match graceful {
					Ok(Ok(_)) => {
						debug!(target: "adbg.session", session = %self.id, "debuggee acknowledged disconnect")
					}
					Ok(Err(err)) => {
						debug!(target: "adbg.session", session = %self.id, error = %err, "disconnect request failed")
					}
					Err(_) => {
						warn!(target: "adbg.session", session = %self.id, "disconnect request timed out")
					}
				}
			}
		}

		if self.finalized.swap(true, Ordering::SeqCst) {
			// The event pump finalized concurrently (transport loss).
			return Ok(());
		}

		if let Some(connection) = connection {
			connection.close().await;
		}
		if let Some(mut process) = self.process.lock().await.take() {
			process.reap().await;
		}

		self.transition(SessionState::Terminated);
		self.emit(SessionEvent::Terminated {
			exit_code: *self.exit_code.lock(),
		});
		Ok(())
	}

	/// Performs the protocol handshake and the initial breakpoint flush.
	async fn initialize(
		&self,
		connection: &Arc<Connection>,
		inbound: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
	) -> Result<()> {
		let arguments = serde_json::to_value(InitializeArguments::default())?;
		let response = connection.send(commands::INITIALIZE, Some(arguments)).await?;
		let capabilities: Capabilities = response
			.body
			.map(serde_json::from_value)
			.transpose()?
			.unwrap_or_default();
		debug!(target: "adbg.session", session = %self.id, ?capabilities, "handshake complete");
		*self.capabilities.write() = capabilities.clone();

		self.wait_for_initialized(inbound).await?;

		// Most debuggees reject breakpoint requests until initialization
		// completes; this is the point where queued changes drain.
		self.breakpoints.flush().await?;

		if capabilities.supports_configuration_done_request {
			connection.send(commands::CONFIGURATION_DONE, None).await?;
		}

		Ok(())
	}

	/// Waits for the debuggee's `initialized` event, forwarding any output
	/// that arrives first.
	async fn wait_for_initialized(
		&self,
		inbound: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
	) -> Result<()> {
		loop {
			let item = tokio::time::timeout(HANDSHAKE_TIMEOUT, inbound.recv())
				.await
				.map_err(|_| {
					DebugError::Protocol(
						"debuggee did not send the initialized event in time".to_string(),
					)
				})?;

			match item {
				Some(ConnectionEvent::Event(event)) if event.event == names::INITIALIZED => {
					return Ok(());
				}
				Some(ConnectionEvent::Event(event)) if event.event == names::OUTPUT => {
					if let Some(body) = decode_event::<OutputEventBody>(&event.event, event.body) {
						self.emit(SessionEvent::Output {
							category: body.category,
							output: body.output,
						});
					}
				}
				Some(ConnectionEvent::Event(event)) => {
					debug!(
						target: "adbg.session",
						session = %self.id,
						event = %event.event,
						"ignoring event before initialized"
					);
				}
				Some(ConnectionEvent::Disconnected) | None => {
					return Err(DebugError::TransportClosed);
				}
			}
		}
	}

	/// Fails session startup: the session moves directly to `Terminated`
	/// and the originating error is handed back to the editor.
	async fn abort_startup(&self, err: DebugError) -> Result<()> {
		warn!(target: "adbg.session", session = %self.id, error = %err, "session startup failed");

		self.finalized.store(true, Ordering::SeqCst);
		let connection = self.connection.read().clone();
		if let Some(connection) = connection {
			connection.close().await;
		}
		if let Some(mut process) = self.process.lock().await.take() {
			process.kill().await;
		}

		self.transition(SessionState::Terminated);
		self.emit(SessionEvent::Terminated { exit_code: None });
		Err(err)
	}

	/// Handles one debuggee event from the inbound stream.
	async fn handle_debuggee_event(&self, event: Event) {
		match event.event.as_str() {
			names::STOPPED => {
				let Some(body) = decode_event::<StoppedEventBody>(&event.event, event.body) else {
					return;
				};
				if let Some(thread_id) = body.thread_id {
					*self.stopped_thread.lock() = Some(thread_id);
				}
				if self.state() == SessionState::Running {
					self.transition(SessionState::Stopped);
					self.emit(SessionEvent::Stopped {
						reason: body.reason,
						description: body.description,
						hit_breakpoint_ids: body.hit_breakpoint_ids.unwrap_or_default(),
					});
				}
			}
			names::CONTINUED => {
				let _ = decode_event::<ContinuedEventBody>(&event.event, event.body);
				if self.state() == SessionState::Stopped {
					self.transition(SessionState::Running);
					self.emit(SessionEvent::Continued);
				}
			}
			names::OUTPUT => {
				if let Some(body) = decode_event::<OutputEventBody>(&event.event, event.body) {
					self.emit(SessionEvent::Output {
						category: body.category,
						output: body.output,
					});
				}
			}
			names::EXITED => {
				if let Some(body) = decode_event::<ExitedEventBody>(&event.event, event.body) {
					*self.exit_code.lock() = Some(body.exit_code);
				}
			}
			names::TERMINATED => {
				self.finalize().await;
			}
			names::BREAKPOINT => {
				if let Some(body) = decode_event::<adbg_protocol::BreakpointEventBody>(
					&event.event,
					event.body,
				) {
					if let Some(changed) = self.breakpoints.apply_runtime_update(&body.breakpoint)
					{
						self.emit(SessionEvent::BreakpointChanged(changed));
					}
				}
			}
			other => {
				debug!(target: "adbg.session", session = %self.id, event = other, "unhandled event");
			}
		}
	}

	/// Tears the session down after the debuggee or transport is gone.
	/// Idempotent; the losing caller of the `finalized` race is a no-op.
	async fn finalize(&self) {
		if self.finalized.swap(true, Ordering::SeqCst) {
			return;
		}

		if !self.state().is_terminal() {
			self.transition(SessionState::Terminating);
		}
		let connection = self.connection.read().clone();
		if let Some(connection) = connection {
			connection.close().await;
		}
		if let Some(mut process) = self.process.lock().await.take() {
			// The debuggee is already gone or going; no grace period.
			process.kill().await;
		}

		self.transition(SessionState::Terminated);
		self.emit(SessionEvent::Terminated {
			exit_code: *self.exit_code.lock(),
		});
	}

	async fn run_control(&self, command: &'static str) -> Result<()> {
		self.require(SessionState::Stopped)?;
		let connection = self.connection()?;
		let arguments = serde_json::to_value(RunControlArguments {
			thread_id: self.current_thread(),
		})?;
		connection.send(command, Some(arguments)).await?;
		self.transition(SessionState::Running);
		self.emit(SessionEvent::Continued);
		Ok(())
	}

	fn current_thread(&self) -> i64 {
		(*self.stopped_thread.lock()).unwrap_or(1)
	}

	fn connection(&self) -> Result<Arc<Connection>> {
		self.connection
			.read()
			.clone()
			.ok_or(DebugError::TransportClosed)
	}

	fn require(&self, expected: SessionState) -> Result<()> {
		let state = self.state();
		if state == expected {
			Ok(())
		} else {
			Err(DebugError::InvalidState(state.to_string()))
		}
	}

	/// Moves to `to` unless the session is already terminated.
	fn transition(&self, to: SessionState) {
		let from = {
			let mut state = self.state.write();
			let from = *state;
			if from == SessionState::Terminated || from == to {
				return;
			}
			*state = to;
			from
		};
		debug!(target: "adbg.session", session = %self.id, %from, %to, "state transition");
		self.emit(SessionEvent::StateChanged { from, to });
	}

	fn emit(&self, event: SessionEvent) {
		let _ = self.events.send(event);
	}

	fn spawn_output_pump<R>(&self, stream: R, category: &'static str)
	where
		R: AsyncRead + Unpin + Send + 'static,
	{
		let events = self.events.clone();
		tokio::spawn(async move {
			let mut lines = BufReader::new(stream).lines();
			while let Ok(Some(line)) = lines.next_line().await {
				let _ = events.send(SessionEvent::Output {
					category: Some(category.to_string()),
					output: line,
				});
			}
		});
	}
}

/// Folds the connection's inbound stream into the session until the
/// transport is gone.
async fn event_pump(
	session: Arc<DebugSession>,
	mut inbound: mpsc::UnboundedReceiver<ConnectionEvent>,
) {
	while let Some(item) = inbound.recv().await {
		match item {
			ConnectionEvent::Event(event) => session.handle_debuggee_event(event).await,
			ConnectionEvent::Disconnected => {
				session.finalize().await;
				break;
			}
		}
	}
}

fn decode_event<T: serde::de::DeserializeOwned>(event: &str, body: Option<Value>) -> Option<T> {
	let value = body.unwrap_or_else(|| Value::Object(Default::default()));
	match serde_json::from_value(value) {
		Ok(parsed) => Some(parsed),
		Err(err) => {
			warn!(target: "adbg.session", event, error = %err, "malformed event body");
			None
		}
	}
}
