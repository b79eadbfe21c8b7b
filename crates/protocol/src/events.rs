//! Body payloads for the asynchronous events the debuggee emits.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Breakpoint;

/// Event names emitted by the debuggee.
pub mod names {
	pub const INITIALIZED: &str = "initialized";
	pub const STOPPED: &str = "stopped";
	pub const CONTINUED: &str = "continued";
	pub const EXITED: &str = "exited";
	pub const TERMINATED: &str = "terminated";
	pub const OUTPUT: &str = "output";
	pub const BREAKPOINT: &str = "breakpoint";
}

/// Body of a `stopped` event.
///
/// `reason` is left as a string: debuggees are free to invent reasons
/// beyond the well-known `breakpoint`/`step`/`pause` set and the client
/// must not reject them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
	pub reason: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub thread_id: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub hit_breakpoint_ids: Option<Vec<i64>>,
}

/// Body of a `continued` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuedEventBody {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub thread_id: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub all_threads_continued: Option<bool>,
}

/// Body of an `exited` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitedEventBody {
	pub exit_code: i64,
}

/// Body of a `terminated` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminatedEventBody {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub restart: Option<Value>,
}

/// Body of an `output` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEventBody {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	pub output: String,
}

/// Body of a `breakpoint` event, sent when the debuggee re-verifies a
/// breakpoint after loading more of the script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointEventBody {
	pub reason: String,
	pub breakpoint: Breakpoint,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn stopped_body_parses_wire_shape() {
		let body: StoppedEventBody = serde_json::from_value(json!({
			"reason": "breakpoint",
			"threadId": 1,
			"hitBreakpointIds": [4]
		}))
		.unwrap();
		assert_eq!(body.reason, "breakpoint");
		assert_eq!(body.thread_id, Some(1));
		assert_eq!(body.hit_breakpoint_ids, Some(vec![4]));
	}

	#[test]
	fn exited_body_requires_exit_code() {
		let body: ExitedEventBody = serde_json::from_value(json!({"exitCode": 2})).unwrap();
		assert_eq!(body.exit_code, 2);
		assert!(serde_json::from_value::<ExitedEventBody>(json!({})).is_err());
	}
}
