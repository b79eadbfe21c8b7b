//! Body payloads for the responses this client consumes.

use serde::{Deserialize, Serialize};

use crate::types::Breakpoint;

/// Body of a `setBreakpoints` response.
///
/// One entry per requested breakpoint, in the order they were sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsResponseBody {
	pub breakpoints: Vec<Breakpoint>,
}

/// Body of a `continue` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueResponseBody {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub all_threads_continued: Option<bool>,
}

/// Body of an `evaluate` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluateResponseBody {
	pub result: String,
	pub variables_reference: i64,
}
