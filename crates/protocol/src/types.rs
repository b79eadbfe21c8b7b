//! Common structures referenced by requests, responses, and events.

use serde::{Deserialize, Serialize};

/// Descriptor for a script file, as used in breakpoint requests and events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
	/// Short display name, usually the file name.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,
}

impl Source {
	/// Builds a source descriptor from a file path.
	pub fn from_path(path: &str) -> Self {
		let name = std::path::Path::new(path)
			.file_name()
			.map(|n| n.to_string_lossy().into_owned());
		Self {
			name,
			path: Some(path.to_string()),
		}
	}
}

/// A requested breakpoint location inside a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
	/// 1-based line the editor placed the breakpoint on.
	pub line: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub condition: Option<String>,
}

/// The debuggee's view of a breakpoint after a set-breakpoints round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
	/// Debuggee-assigned identifier, stable for the session once verified.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<i64>,
	pub verified: bool,
	/// Explanation for an unverified breakpoint, when the debuggee gives one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub source: Option<Source>,
	/// Line the debuggee actually bound the breakpoint to.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub line: Option<u32>,
}

/// Capabilities advertised by the debuggee in the initialize response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
	pub supports_configuration_done_request: bool,
	pub supports_conditional_breakpoints: bool,
}
