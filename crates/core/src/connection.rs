//! Request/response correlation layer on top of the framed transport.
//!
//! A [`Connection`] owns the duplex channel to one debuggee. Outgoing
//! requests get a unique sequence number and a oneshot slot; a background
//! reader task decodes frames and either completes the matching slot
//! (responses) or forwards the message on the event stream (events).
//!
//! Per-direction ordering holds because all writes go through one writer
//! lock in issuance order and the reader dispatches frames as they arrive.
//! Once the transport is lost every pending and future `send` fails with
//! [`DebugError::TransportClosed`] and the event stream yields a single
//! terminal [`ConnectionEvent::Disconnected`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use adbg_protocol::{Event, ProtocolMessage, Request, Response};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{DebugError, Result};
use crate::transport::{FrameReader, write_frame};

/// Item on a connection's inbound stream.
#[derive(Debug)]
pub enum ConnectionEvent {
	/// An asynchronous event from the debuggee.
	Event(Event),
	/// The transport is gone. Emitted exactly once, always last.
	Disconnected,
}

type PendingMap = HashMap<u64, oneshot::Sender<Result<Response>>>;

/// Correlated bidirectional channel to one debuggee.
pub struct Connection {
	next_seq: AtomicU64,
	/// Pending request slots; `None` once the transport is closed.
	pending: Mutex<Option<PendingMap>>,
	writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
	/// Event stream sender; dropped on disconnect so the stream ends.
	events: Mutex<Option<mpsc::UnboundedSender<ConnectionEvent>>>,
}

impl Connection {
	/// Wraps a connected byte stream, spawning the reader task.
	pub fn establish<S>(stream: S) -> (Arc<Self>, mpsc::UnboundedReceiver<ConnectionEvent>)
	where
		S: AsyncRead + AsyncWrite + Send + 'static,
	{
		let (read_half, write_half) = tokio::io::split(stream);
		let (events_tx, events_rx) = mpsc::unbounded_channel();

		let connection = Arc::new(Self {
			next_seq: AtomicU64::new(1),
			pending: Mutex::new(Some(HashMap::new())),
			writer: tokio::sync::Mutex::new(Box::new(write_half) as Box<dyn AsyncWrite + Send + Unpin>),
			events: Mutex::new(Some(events_tx)),
		});

		tokio::spawn(read_loop(Arc::clone(&connection), FrameReader::new(read_half)));

		(connection, events_rx)
	}

	/// Sends a request and awaits the correlated response.
	///
	/// Responses may complete out of order relative to other requests;
	/// correlation is by sequence number. A response with `success: false`
	/// is surfaced as a [`DebugError::Protocol`] carrying the debuggee's
	/// message.
	pub async fn send(&self, command: &str, arguments: Option<Value>) -> Result<Response> {
		let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();

		{
			let mut pending = self.pending.lock();
			match pending.as_mut() {
				Some(map) => {
					map.insert(seq, tx);
				}
				None => return Err(DebugError::TransportClosed),
			}
		}

		let message = ProtocolMessage::Request(Request {
			seq,
			command: command.to_string(),
			arguments,
		});

		let write_result = {
			let mut writer = self.writer.lock().await;
			write_frame(&mut *writer, &message).await
		};

		if let Err(err) = write_result {
			warn!(target: "adbg.transport", error = %err, command, "request write failed");
			self.disconnect();
			return Err(DebugError::TransportClosed);
		}

		let response = rx.await.map_err(|_| DebugError::TransportClosed)??;
		if !response.success {
			let detail = response
				.message
				.unwrap_or_else(|| format!("{command} request failed"));
			return Err(DebugError::Protocol(detail));
		}

		Ok(response)
	}

	/// True once the transport has been lost or closed.
	pub fn is_closed(&self) -> bool {
		self.pending.lock().is_none()
	}

	/// Shuts the channel down, cancelling all in-flight requests.
	pub async fn close(&self) {
		{
			let mut writer = self.writer.lock().await;
			let _ = writer.shutdown().await;
		}
		self.disconnect();
	}

	/// Completes the pending slot matching `response`.
	fn complete(&self, response: Response) {
		let slot = {
			let mut pending = self.pending.lock();
			pending
				.as_mut()
				.and_then(|map| map.remove(&response.request_seq))
		};

		match slot {
			Some(tx) => {
				let _ = tx.send(Ok(response));
			}
			None => {
				warn!(
					target: "adbg.transport",
					request_seq = response.request_seq,
					command = %response.command,
					"response does not match any pending request"
				);
			}
		}
	}

	fn forward(&self, event: Event) {
		let events = self.events.lock();
		if let Some(tx) = events.as_ref() {
			let _ = tx.send(ConnectionEvent::Event(event));
		}
	}

	/// Marks the transport closed: drains pending requests with
	/// `TransportClosed` and emits the terminal `Disconnected` item.
	/// Safe to call more than once; only the first call has any effect.
	fn disconnect(&self) {
		let drained = { self.pending.lock().take() };
		let Some(drained) = drained else {
			return;
		};

		debug!(target: "adbg.transport", pending = drained.len(), "transport disconnected");
		for (_, tx) in drained {
			let _ = tx.send(Err(DebugError::TransportClosed));
		}

		if let Some(tx) = self.events.lock().take() {
			let _ = tx.send(ConnectionEvent::Disconnected);
		}
	}
}

async fn read_loop<R>(connection: Arc<Connection>, mut reader: FrameReader<R>)
where
	R: AsyncRead + Unpin,
{
	loop {
		match reader.read_frame().await {
			Ok(Some(ProtocolMessage::Response(response))) => connection.complete(response),
			Ok(Some(ProtocolMessage::Event(event))) => connection.forward(event),
			Ok(Some(ProtocolMessage::Request(request))) => {
				// Reverse requests are not part of this channel's contract.
				warn!(
					target: "adbg.transport",
					command = %request.command,
					"ignoring unexpected request from debuggee"
				);
			}
			Ok(None) => break,
			Err(err) => {
				warn!(target: "adbg.transport", error = %err, "transport read failed");
				break;
			}
		}
	}

	connection.disconnect();
}
