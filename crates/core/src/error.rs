//! Error types for the debug core.

use thiserror::Error;

/// Result type for debug-core operations.
pub type Result<T> = std::result::Result<T, DebugError>;

/// Errors surfaced by the debug core.
///
/// The first five variants are the session-facing failure classes: the
/// editor decides whether to retry, nothing in this crate retries on its
/// own. `Protocol` covers contract violations by the debuggee that are not
/// breakpoint-specific; `Io`/`Json` wrap the underlying plumbing.
#[derive(Debug, Error)]
pub enum DebugError {
	#[error("invalid debug configuration: {0}")]
	Configuration(String),
	#[error("failed to launch debuggee: {0}")]
	Launch(String),
	#[error("failed to attach to debuggee: {0}")]
	Attach(String),
	#[error("debuggee transport is closed")]
	TransportClosed,
	#[error("breakpoint synchronization failed: {0}")]
	Synchronization(String),
	#[error("debuggee protocol violation: {0}")]
	Protocol(String),
	#[error("operation not valid while session is {0}")]
	InvalidState(String),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl DebugError {
	/// True when the underlying transport is gone and the session is lost.
	pub fn is_transport_closed(&self) -> bool {
		matches!(self, Self::TransportClosed)
	}

	/// True for startup-phase failures that abort the session entirely.
	pub fn is_startup_failure(&self) -> bool {
		matches!(
			self,
			Self::Configuration(_) | Self::Launch(_) | Self::Attach(_)
		)
	}
}
