//! Debug-session orchestration core for playbook debugging.
//!
//! This crate lets an editor host control the execution of a declarative
//! automation script by launching or attaching to its interpreter,
//! synchronizing breakpoints, and relaying run-control and inspection
//! traffic over a framed debug-adapter channel. The editor's UI, the
//! debuggee internals, and any picker surfaces live outside this crate;
//! it consumes their outputs (resolved paths and process ids) and
//! produces [`session::SessionEvent`]s for them to display.

pub mod breakpoints;
pub mod config;
pub mod connection;
pub mod error;
pub mod launcher;
pub mod service;
pub mod session;
pub mod transport;
pub mod variables;

pub use breakpoints::{BreakpointSpec, BreakpointSynchronizer, SessionBreakpoint};
pub use config::{AttachConfig, ConsoleTarget, LaunchConfig, LogLevel, SessionConfig};
pub use connection::{Connection, ConnectionEvent};
pub use error::{DebugError, Result};
pub use launcher::DebuggeeProcess;
pub use service::DebugService;
pub use session::{DebugSession, SessionEvent, SessionId, SessionState};
pub use variables::{PICK_PLAYBOOK, PICK_PROCESS, ResolverRegistry, VariableResolver};
