//! Protocol message envelope shared by both directions of the channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminated union of protocol messages.
///
/// Every frame on the wire is one of these, distinguished by the `type`
/// field: requests carry a command to execute, responses correlate back to
/// a request via `request_seq`, and events are unsolicited notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProtocolMessage {
	Request(Request),
	Response(Response),
	Event(Event),
}

impl ProtocolMessage {
	/// Sequence number of the message, regardless of kind.
	pub fn seq(&self) -> u64 {
		match self {
			Self::Request(m) => m.seq,
			Self::Response(m) => m.seq,
			Self::Event(m) => m.seq,
		}
	}
}

/// A command sent to the peer, answered by exactly one [`Response`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	pub seq: u64,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub arguments: Option<Value>,
}

/// The answer to a [`Request`], correlated by `request_seq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	pub seq: u64,
	pub request_seq: u64,
	pub success: bool,
	pub command: String,
	/// Human-readable failure detail, only meaningful when `success` is false.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub body: Option<Value>,
}

/// An unsolicited notification from the peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
	pub seq: u64,
	pub event: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub body: Option<Value>,
}
