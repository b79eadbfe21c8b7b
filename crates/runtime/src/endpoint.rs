//! Debuggee endpoint discovery.
//!
//! A debuggee advertises its debug socket by writing `host:port` to
//! `$TMPDIR/ANSIBUG-<pid>`. The launcher polls that file after spawning a
//! new interpreter; the attacher reads it for an already-running one.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;

/// File name prefix used by the debuggee when publishing its endpoint.
const PID_FILE_PREFIX: &str = "ANSIBUG-";

/// Failure to locate or reach a debuggee endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
	#[error("debuggee {pid} has not published a debug endpoint")]
	NotPublished { pid: u32 },
	#[error("debuggee {pid} published a malformed endpoint {contents:?}")]
	Malformed { pid: u32, contents: String },
	#[error("debug endpoint {addr} is unreachable: {source}")]
	Unreachable {
		addr: String,
		#[source]
		source: std::io::Error,
	},
}

/// Path of the endpoint file a debuggee with `pid` would publish.
pub fn endpoint_path(pid: u32) -> PathBuf {
	let tmpdir = std::env::var_os("TMPDIR").unwrap_or_else(|| "/tmp".into());
	PathBuf::from(tmpdir).join(format!("{PID_FILE_PREFIX}{pid}"))
}

/// Reads and validates the `host:port` endpoint published by `pid`.
pub fn read_endpoint(pid: u32) -> Result<String, EndpointError> {
	let path = endpoint_path(pid);
	let contents = match std::fs::read_to_string(&path) {
		Ok(contents) => contents,
		Err(_) => return Err(EndpointError::NotPublished { pid }),
	};

	let addr = contents.trim();
	let malformed = || EndpointError::Malformed {
		pid,
		contents: addr.to_string(),
	};

	let (host, port) = addr.rsplit_once(':').ok_or_else(malformed)?;
	if host.is_empty() || port.parse::<u16>().is_err() {
		return Err(malformed());
	}

	Ok(addr.to_string())
}

/// Polls for the endpoint published by `pid`, sleeping `delay` between
/// attempts. Returns the last error once `attempts` are exhausted.
pub async fn wait_for_endpoint(
	pid: u32,
	attempts: u32,
	delay: Duration,
) -> Result<String, EndpointError> {
	let mut last_error = EndpointError::NotPublished { pid };
	for attempt in 0..attempts {
		match read_endpoint(pid) {
			Ok(addr) => {
				debug!(target: "adbg.runtime", pid, %addr, attempt, "debuggee endpoint published");
				return Ok(addr);
			}
			Err(err) => last_error = err,
		}

		tokio::time::sleep(delay).await;
	}

	Err(last_error)
}

/// Opens the TCP connection to a published endpoint.
pub async fn connect(addr: &str) -> Result<TcpStream, EndpointError> {
	TcpStream::connect(addr)
		.await
		.map_err(|source| EndpointError::Unreachable {
			addr: addr.to_string(),
			source,
		})
}
