//! Process-wide entry point owning sessions and resolvers.
//!
//! The editor host creates one [`DebugService`] when the debug feature is
//! first used and tears it down on shutdown. All cross-session state lives
//! here explicitly - the resolver registry and the id counter - so nothing
//! leaks between sessions, and concurrent sessions stay fully independent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::Result;
use crate::session::{DebugSession, SessionEvent, SessionId};
use crate::variables::ResolverRegistry;

/// Owner of all debug sessions within one editor instance.
pub struct DebugService {
	workspace_root: PathBuf,
	resolvers: ResolverRegistry,
	sessions: Mutex<HashMap<SessionId, Arc<DebugSession>>>,
	next_session_id: AtomicU64,
}

impl DebugService {
	/// Creates the service. Construction is cheap and side-effect free, so
	/// lazily creating it on first use is safe.
	pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
		Self {
			workspace_root: workspace_root.into(),
			resolvers: ResolverRegistry::new(),
			sessions: Mutex::new(HashMap::new()),
			next_session_id: AtomicU64::new(1),
		}
	}

	pub fn workspace_root(&self) -> &Path {
		&self.workspace_root
	}

	/// Registry of command-variable resolvers consumed during
	/// configuration resolution. The host wires its pickers in here.
	pub fn resolvers_mut(&mut self) -> &mut ResolverRegistry {
		&mut self.resolvers
	}

	/// Creates a session in the `Created` state and registers it.
	///
	/// Breakpoints may be pushed into the session before it is started;
	/// they are synchronized once the debuggee is ready.
	pub fn create_session(&self) -> (Arc<DebugSession>, mpsc::UnboundedReceiver<SessionEvent>) {
		let id = SessionId(self.next_session_id.fetch_add(1, Ordering::SeqCst));
		let (session, events) = DebugSession::new(id);
		self.sessions.lock().insert(id, Arc::clone(&session));
		info!(target: "adbg.service", session = %id, "session created");
		(session, events)
	}

	/// Starts a registered session from a raw configuration object.
	pub async fn start_session(&self, session: &Arc<DebugSession>, raw: Value) -> Result<()> {
		session
			.start(raw, &self.resolvers, &self.workspace_root)
			.await
	}

	pub fn session(&self, id: SessionId) -> Option<Arc<DebugSession>> {
		self.sessions.lock().get(&id).cloned()
	}

	/// Drops a session from the registry, usually after it terminated.
	pub fn remove_session(&self, id: SessionId) -> Option<Arc<DebugSession>> {
		self.sessions.lock().remove(&id)
	}

	/// Terminates every session. Called on host shutdown; safe to call
	/// repeatedly.
	pub async fn shutdown(&self) {
		let sessions: Vec<Arc<DebugSession>> = {
			let mut table = self.sessions.lock();
			table.drain().map(|(_, session)| session).collect()
		};

		for session in sessions {
			let _ = session.terminate().await;
		}
	}
}
