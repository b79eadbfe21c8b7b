//! Argument payloads for the requests this client issues.

use serde::{Deserialize, Serialize};

use crate::types::{Source, SourceBreakpoint};

/// Command names understood by the debuggee.
pub mod commands {
	pub const INITIALIZE: &str = "initialize";
	pub const SET_BREAKPOINTS: &str = "setBreakpoints";
	pub const CONFIGURATION_DONE: &str = "configurationDone";
	pub const CONTINUE: &str = "continue";
	pub const NEXT: &str = "next";
	pub const STEP_IN: &str = "stepIn";
	pub const STEP_OUT: &str = "stepOut";
	pub const PAUSE: &str = "pause";
	pub const EVALUATE: &str = "evaluate";
	pub const DISCONNECT: &str = "disconnect";
}

/// Arguments for the `initialize` handshake request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeArguments {
	#[serde(rename = "clientID", skip_serializing_if = "Option::is_none")]
	pub client_id: Option<String>,
	#[serde(rename = "adapterID")]
	pub adapter_id: String,
	pub lines_start_at1: bool,
	pub columns_start_at1: bool,
}

impl Default for InitializeArguments {
	fn default() -> Self {
		Self {
			client_id: Some("adbg".to_string()),
			adapter_id: "adbg".to_string(),
			lines_start_at1: true,
			columns_start_at1: true,
		}
	}
}

/// Arguments for `setBreakpoints`: the full desired set for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsArguments {
	pub source: Source,
	pub breakpoints: Vec<SourceBreakpoint>,
}

/// Arguments shared by the run-control requests (`continue`, `next`,
/// `stepIn`, `stepOut`, `pause`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunControlArguments {
	pub thread_id: i64,
}

/// Arguments for the `evaluate` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArguments {
	pub expression: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub frame_id: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub context: Option<String>,
}

/// Arguments for the `disconnect` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectArguments {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub terminate_debuggee: Option<bool>,
}
