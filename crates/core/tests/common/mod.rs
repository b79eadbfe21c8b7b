//! Shared fixture: a scripted fake debuggee speaking the framed protocol.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use adbg::session::{DebugSession, SessionEvent, SessionState};
use adbg::transport::{FrameReader, write_frame};
use adbg_protocol::{Breakpoint, Event, ProtocolMessage, Request, Response};
use serde_json::{Value, json};
use tokio::net::{TcpListener, tcp};
use tokio::sync::mpsc::UnboundedReceiver;

pub const WAIT: Duration = Duration::from_secs(5);

/// The debuggee side of a session, driven explicitly by each test.
pub struct FakeDebuggee {
	reader: FrameReader<tcp::OwnedReadHalf>,
	writer: tcp::OwnedWriteHalf,
	next_seq: u64,
}

impl FakeDebuggee {
	/// Waits for the core to connect to `listener`.
	pub async fn accept(listener: &TcpListener) -> Self {
		let (stream, _addr) = tokio::time::timeout(WAIT, listener.accept())
			.await
			.expect("core did not connect in time")
			.expect("accept failed");
		let (read_half, write_half) = stream.into_split();
		Self {
			reader: FrameReader::new(read_half),
			writer: write_half,
			next_seq: 1,
		}
	}

	/// Reads the next request, panicking on anything else.
	pub async fn expect_request(&mut self, command: &str) -> Request {
		let message = tokio::time::timeout(WAIT, self.reader.read_frame())
			.await
			.expect("no frame arrived in time")
			.expect("transport failed")
			.expect("stream closed while expecting a request");
		match message {
			ProtocolMessage::Request(request) => {
				assert_eq!(request.command, command, "unexpected command");
				request
			}
			other => panic!("expected {command} request, got {other:?}"),
		}
	}

	pub async fn respond(&mut self, request: &Request, body: Option<Value>) {
		let seq = self.bump_seq();
		let message = ProtocolMessage::Response(Response {
			seq,
			request_seq: request.seq,
			success: true,
			command: request.command.clone(),
			message: None,
			body,
		});
		write_frame(&mut self.writer, &message).await.expect("write response");
	}

	pub async fn fail(&mut self, request: &Request, detail: &str) {
		let seq = self.bump_seq();
		let message = ProtocolMessage::Response(Response {
			seq,
			request_seq: request.seq,
			success: false,
			command: request.command.clone(),
			message: Some(detail.to_string()),
			body: None,
		});
		write_frame(&mut self.writer, &message).await.expect("write response");
	}

	pub async fn emit(&mut self, event: &str, body: Option<Value>) {
		let seq = self.bump_seq();
		let message = ProtocolMessage::Event(Event {
			seq,
			event: event.to_string(),
			body,
		});
		write_frame(&mut self.writer, &message).await.expect("write event");
	}

	/// Answers the initialize request and announces readiness.
	pub async fn handshake(&mut self, supports_configuration_done: bool) {
		let request = self.expect_request("initialize").await;
		self.respond(
			&request,
			Some(json!({
				"supportsConfigurationDoneRequest": supports_configuration_done,
				"supportsConditionalBreakpoints": true,
			})),
		)
		.await;
		self.emit("initialized", None).await;
	}

	pub async fn expect_configuration_done(&mut self) {
		let request = self.expect_request("configurationDone").await;
		self.respond(&request, None).await;
	}

	/// Answers a setBreakpoints request by verifying every entry in order,
	/// assigning runtime ids starting at `first_id`. Returns the raw
	/// request arguments for further assertions.
	pub async fn verify_breakpoints(&mut self, first_id: i64) -> Value {
		let request = self.expect_request("setBreakpoints").await;
		let arguments = request.arguments.clone().expect("setBreakpoints arguments");
		let requested = arguments["breakpoints"]
			.as_array()
			.expect("breakpoints array")
			.clone();

		let verified: Vec<Breakpoint> = requested
			.iter()
			.enumerate()
			.map(|(index, bp)| Breakpoint {
				id: Some(first_id + index as i64),
				verified: true,
				message: None,
				source: None,
				line: bp["line"].as_u64().map(|line| line as u32),
			})
			.collect();

		self.respond(&request, Some(json!({ "breakpoints": verified }))).await;
		arguments
	}

	fn bump_seq(&mut self) -> u64 {
		let seq = self.next_seq;
		self.next_seq += 1;
		seq
	}
}

/// A launchable fake-debuggee setup: a listener the debuggee-side script
/// advertises through the endpoint file the core polls after spawning.
pub struct LaunchFixture {
	pub dir: tempfile::TempDir,
	pub listener: TcpListener,
	pub playbook: PathBuf,
}

impl LaunchFixture {
	pub async fn new() -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
		let port = listener.local_addr().unwrap().port();

		let dir = tempfile::tempdir().expect("tempdir");
		let playbook = dir.path().join("site.yml");
		// Stand-in interpreter script: publish the endpoint the way a real
		// debuggee does, emit one line of output, then idle.
		let script = format!(
			"echo \"127.0.0.1:{port}\" > \"${{TMPDIR:-/tmp}}/ANSIBUG-$$\"\n\
			 echo \"PLAY [all]\"\n\
			 sleep 30\n"
		);
		std::fs::write(&playbook, script).expect("write playbook script");

		Self {
			dir,
			listener,
			playbook,
		}
	}

	/// Launch configuration running the playbook script under `/bin/sh`.
	pub fn raw_config(&self) -> Value {
		json!({
			"request": "launch",
			"playbook": "site.yml",
			"cwd": self.dir.path(),
			"interpreter": "/bin/sh",
		})
	}
}

/// Polls until the session reaches `target` or the wait budget runs out.
pub async fn wait_for_state(session: &Arc<DebugSession>, target: SessionState) {
	tokio::time::timeout(WAIT, async {
		loop {
			if session.state() == target {
				return;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.unwrap_or_else(|_| {
		panic!(
			"session never reached {target}, still {}",
			session.state()
		)
	});
}

/// Receives events until `predicate` matches one, within the wait budget.
pub async fn wait_for_event<F>(
	events: &mut UnboundedReceiver<SessionEvent>,
	predicate: F,
) -> SessionEvent
where
	F: Fn(&SessionEvent) -> bool,
{
	tokio::time::timeout(WAIT, async {
		loop {
			let event = events.recv().await.expect("event stream ended");
			if predicate(&event) {
				return event;
			}
		}
	})
	.await
	.expect("expected event never arrived")
}
