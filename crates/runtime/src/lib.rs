//! Debuggee process lifecycle and endpoint discovery.
//!
//! A playbook debuggee publishes its debug endpoint by writing
//! `host:port` to a well-known file keyed by its process id. This crate
//! knows that contract: probing whether a pid is alive, locating and
//! parsing the endpoint file, and opening the TCP connection the `adbg`
//! core layers its protocol on.

pub mod endpoint;
pub mod process;

pub use endpoint::{EndpointError, connect, endpoint_path, read_endpoint, wait_for_endpoint};
pub use process::pid_is_alive;
