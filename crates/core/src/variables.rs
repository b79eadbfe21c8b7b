//! Command-variable resolution.
//!
//! Configuration fields may hold a `${command:Name}` placeholder instead
//! of a literal value. Each name maps to a host-supplied resolver (usually
//! backed by some picker surface outside this crate) that produces the
//! concrete value on demand.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{DebugError, Result};

/// Resolver name for prompting the user for a playbook path.
pub const PICK_PLAYBOOK: &str = "PickAnsiblePlaybook";
/// Resolver name for prompting the user for a debuggee process id.
pub const PICK_PROCESS: &str = "PickAnsibleProcess";

/// Boxed future returned by a [`VariableResolver`].
pub type ResolverFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// A named resolver producing the value for one command variable.
pub trait VariableResolver: Send + Sync {
	fn resolve(&self) -> ResolverFuture<'_>;
}

impl<F> VariableResolver for F
where
	F: Fn() -> ResolverFuture<'static> + Send + Sync,
{
	fn resolve(&self) -> ResolverFuture<'_> {
		(self)()
	}
}

/// Registry of command-variable resolvers, keyed by name.
#[derive(Default)]
pub struct ResolverRegistry {
	resolvers: HashMap<String, Arc<dyn VariableResolver>>,
}

impl ResolverRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `resolver` under `name`, replacing any previous entry.
	pub fn register(&mut self, name: impl Into<String>, resolver: Arc<dyn VariableResolver>) {
		self.resolvers.insert(name.into(), resolver);
	}

	/// Invokes the resolver registered under `name`.
	pub async fn resolve(&self, name: &str) -> Result<String> {
		let resolver = self.resolvers.get(name).ok_or_else(|| {
			DebugError::Configuration(format!("no resolver registered for command variable {name:?}"))
		})?;

		resolver.resolve().await
	}
}

/// Extracts the command name from a `${command:Name}` placeholder.
pub fn command_placeholder(value: &str) -> Option<&str> {
	value
		.strip_prefix("${command:")
		.and_then(|rest| rest.strip_suffix('}'))
		.filter(|name| !name.is_empty())
}
