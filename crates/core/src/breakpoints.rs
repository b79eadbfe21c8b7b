//! Breakpoint storage and debuggee synchronization.
//!
//! The editor owns the source of truth for breakpoints; this module keeps
//! the per-file desired sets and reconciles them with the debuggee. Every
//! reconciliation sends the full set for one file, replacing whatever the
//! debuggee held for it before - idempotent replacement, never incremental
//! deltas, so editor and debuggee state cannot drift apart.
//!
//! Most debuggees reject breakpoint requests before their initialization
//! completes, so changes arriving before the session's configuration-done
//! point are queued and flushed in one pass once the debuggee is ready.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use adbg_protocol::requests::commands;
use adbg_protocol::{SetBreakpointsArguments, SetBreakpointsResponseBody, Source, SourceBreakpoint};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{DebugError, Result};

/// An editor-requested breakpoint location.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointSpec {
	/// 1-based line number.
	pub line: u32,
	pub condition: Option<String>,
}

/// A breakpoint as tracked for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionBreakpoint {
	pub line: u32,
	pub condition: Option<String>,
	/// True once the debuggee confirmed the line is a valid stop location.
	pub verified: bool,
	/// Debuggee-assigned identifier, absent until verified.
	pub runtime_id: Option<i64>,
	/// Debuggee explanation for an unverified breakpoint.
	pub message: Option<String>,
}

impl SessionBreakpoint {
	fn from_spec(spec: BreakpointSpec) -> Self {
		Self {
			line: spec.line,
			condition: spec.condition,
			verified: false,
			runtime_id: None,
			message: None,
		}
	}
}

struct FileEntry {
	breakpoints: Vec<SessionBreakpoint>,
	/// Bumped on every editor update; stale sync responses are dropped.
	generation: u64,
	/// Serializes in-flight syncs for this file.
	sync_lock: Arc<tokio::sync::Mutex<()>>,
}

/// Per-session reconciler between the editor's breakpoints and the debuggee.
pub struct BreakpointSynchronizer {
	connection: RwLock<Option<Arc<Connection>>>,
	files: Mutex<HashMap<PathBuf, FileEntry>>,
	ready: AtomicBool,
}

impl BreakpointSynchronizer {
	pub fn new() -> Self {
		Self {
			connection: RwLock::new(None),
			files: Mutex::new(HashMap::new()),
			ready: AtomicBool::new(false),
		}
	}

	/// Wires the synchronizer to a live connection. Until [`flush`] runs,
	/// updates are still only queued.
	///
	/// [`flush`]: Self::flush
	pub fn bind(&self, connection: Arc<Connection>) {
		*self.connection.write() = Some(connection);
	}

	/// Replaces the desired breakpoint set for `path`.
	///
	/// Before the debuggee is ready the new set is queued and returned
	/// unverified; afterwards it is pushed immediately and the returned
	/// entities carry the debuggee's verification results.
	pub async fn set_file_breakpoints(
		&self,
		path: &Path,
		specs: Vec<BreakpointSpec>,
	) -> Result<Vec<SessionBreakpoint>> {
		let fresh: Vec<SessionBreakpoint> =
			specs.into_iter().map(SessionBreakpoint::from_spec).collect();

		{
			let mut files = self.files.lock();
			let entry = files.entry(path.to_path_buf()).or_insert_with(|| FileEntry {
				breakpoints: Vec::new(),
				generation: 0,
				sync_lock: Arc::new(tokio::sync::Mutex::new(())),
			});
			entry.breakpoints = fresh.clone();
			entry.generation += 1;
		}

		if !self.ready.load(Ordering::SeqCst) {
			debug!(
				target: "adbg.breakpoints",
				path = %path.display(),
				count = fresh.len(),
				"queued breakpoints until debuggee is ready"
			);
			return Ok(fresh);
		}

		self.sync_file(path).await
	}

	/// Current entities for `path`, in editor order.
	pub fn snapshot(&self, path: &Path) -> Vec<SessionBreakpoint> {
		self.files
			.lock()
			.get(path)
			.map(|entry| entry.breakpoints.clone())
			.unwrap_or_default()
	}

	/// Marks the debuggee ready and pushes every queued file.
	///
	/// Transport loss aborts the flush; a per-file synchronization failure
	/// is logged and leaves that file's breakpoints unverified, the rest
	/// of the flush continues.
	pub async fn flush(&self) -> Result<()> {
		self.ready.store(true, Ordering::SeqCst);

		let paths: Vec<PathBuf> = { self.files.lock().keys().cloned().collect() };
		for path in paths {
			match self.sync_file(&path).await {
				Ok(_) => {}
				Err(err) if err.is_transport_closed() => return Err(err),
				Err(err) => {
					warn!(
						target: "adbg.breakpoints",
						path = %path.display(),
						error = %err,
						"breakpoint flush failed for file"
					);
				}
			}
		}

		Ok(())
	}

	/// Applies a debuggee-initiated breakpoint update (re-verification
	/// after more of the script was loaded), matching on the runtime id.
	pub fn apply_runtime_update(
		&self,
		update: &adbg_protocol::Breakpoint,
	) -> Option<SessionBreakpoint> {
		let runtime_id = update.id?;
		let mut files = self.files.lock();

		for entry in files.values_mut() {
			for bp in entry.breakpoints.iter_mut() {
				if bp.runtime_id == Some(runtime_id) {
					bp.verified = update.verified;
					bp.message = update.message.clone();
					if let Some(line) = update.line {
						bp.line = line;
					}
					return Some(bp.clone());
				}
			}
		}

		None
	}

	/// Pushes the full desired set for one file and applies the results.
	///
	/// Syncs for the same file are serialized: a newer request waits for
	/// the in-flight one, then sends the newest desired set. A response
	/// for a superseded set is discarded via the generation check.
	async fn sync_file(&self, path: &Path) -> Result<Vec<SessionBreakpoint>> {
		let connection = self
			.connection
			.read()
			.clone()
			.ok_or(DebugError::TransportClosed)?;

		let Some(sync_lock) = ({
			let files = self.files.lock();
			files.get(path).map(|entry| Arc::clone(&entry.sync_lock))
		}) else {
			return Ok(Vec::new());
		};

		let _serialized = sync_lock.lock().await;

		let (desired, generation) = {
			let files = self.files.lock();
			match files.get(path) {
				Some(entry) => (entry.breakpoints.clone(), entry.generation),
				None => return Ok(Vec::new()),
			}
		};

		let arguments = SetBreakpointsArguments {
			source: Source::from_path(&path.to_string_lossy()),
			breakpoints: desired
				.iter()
				.map(|bp| SourceBreakpoint {
					line: bp.line,
					condition: bp.condition.clone(),
				})
				.collect(),
		};

		debug!(
			target: "adbg.breakpoints",
			path = %path.display(),
			count = desired.len(),
			"synchronizing breakpoints"
		);

		let response = connection
			.send(commands::SET_BREAKPOINTS, Some(serde_json::to_value(&arguments)?))
			.await?;

		let results = response
			.body
			.map(serde_json::from_value::<SetBreakpointsResponseBody>)
			.transpose()?
			.map(|body| body.breakpoints)
			.unwrap_or_default();

		if results.len() != desired.len() {
			self.mark_unverified(path, generation);
			return Err(DebugError::Synchronization(format!(
				"debuggee returned {} verification results for {} requested breakpoints in {}",
				results.len(),
				desired.len(),
				path.display()
			)));
		}

		let mut files = self.files.lock();
		let Some(entry) = files.get_mut(path) else {
			return Ok(Vec::new());
		};
		if entry.generation != generation {
			// A newer editor update superseded this sync mid-flight.
			return Ok(entry.breakpoints.clone());
		}

		for (bp, result) in entry.breakpoints.iter_mut().zip(results) {
			bp.verified = result.verified;
			bp.runtime_id = result.id;
			bp.message = result.message;
			if let Some(line) = result.line {
				bp.line = line;
			}
		}

		Ok(entry.breakpoints.clone())
	}

	fn mark_unverified(&self, path: &Path, generation: u64) {
		let mut files = self.files.lock();
		if let Some(entry) = files.get_mut(path) {
			if entry.generation == generation {
				for bp in entry.breakpoints.iter_mut() {
					bp.verified = false;
					bp.runtime_id = None;
				}
			}
		}
	}
}

impl Default for BreakpointSynchronizer {
	fn default() -> Self {
		Self::new()
	}
}
