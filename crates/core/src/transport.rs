//! Framed message codec for the debuggee channel.
//!
//! Messages are framed with a header block terminated by a blank line,
//! where `Content-Length` declares the byte length of the JSON body that
//! follows. Partial reads never corrupt message boundaries: the reader
//! buffers until a full header block and body are available.

use adbg_protocol::ProtocolMessage;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{DebugError, Result};

const CONTENT_LENGTH: &str = "content-length";

/// Upper bound on a single message body; anything larger is a framing bug.
const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// Serializes `message` and writes one frame to `writer`.
pub async fn write_frame<W>(writer: &mut W, message: &ProtocolMessage) -> Result<()>
where
	W: AsyncWrite + Unpin,
{
	let body = serde_json::to_vec(message)?;
	let header = format!("Content-Length: {}\r\n\r\n", body.len());
	writer.write_all(header.as_bytes()).await?;
	writer.write_all(&body).await?;
	writer.flush().await?;
	Ok(())
}

/// Incremental frame reader over any byte stream.
pub struct FrameReader<R> {
	reader: BufReader<R>,
}

impl<R> FrameReader<R>
where
	R: AsyncRead + Unpin,
{
	pub fn new(inner: R) -> Self {
		Self {
			reader: BufReader::new(inner),
		}
	}

	/// Reads the next frame, or `None` on a clean end of stream.
	///
	/// An end of stream in the middle of a frame is an error: the peer
	/// died between header and body.
	pub async fn read_frame(&mut self) -> Result<Option<ProtocolMessage>> {
		let Some(length) = self.read_header_block().await? else {
			return Ok(None);
		};

		if length > MAX_BODY_LEN {
			return Err(DebugError::Protocol(format!(
				"declared body length {length} exceeds limit"
			)));
		}

		let mut body = vec![0u8; length];
		self.reader.read_exact(&mut body).await?;

		let message = serde_json::from_slice(&body)?;
		Ok(Some(message))
	}

	/// Parses header lines until the blank separator, returning the
	/// declared body length. `None` means the stream closed before any
	/// header byte arrived.
	async fn read_header_block(&mut self) -> Result<Option<usize>> {
		let mut length: Option<usize> = None;
		let mut first = true;

		loop {
			let line = self.read_header_line(first).await?;
			first = false;

			let Some(line) = line else {
				return Ok(None);
			};

			if line.is_empty() {
				return match length {
					Some(length) => Ok(Some(length)),
					None => Err(DebugError::Protocol(
						"header block is missing Content-Length".to_string(),
					)),
				};
			}

			if let Some((name, value)) = line.split_once(':') {
				if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
					let parsed = value.trim().parse::<usize>().map_err(|_| {
						DebugError::Protocol(format!("invalid Content-Length {:?}", value.trim()))
					})?;
					length = Some(parsed);
				}
			}
			// Unknown header lines are tolerated and skipped.
		}
	}

	/// Reads one CRLF-terminated header line with the terminator stripped.
	async fn read_header_line(&mut self, allow_eof: bool) -> Result<Option<String>> {
		let mut line = Vec::new();
		loop {
			let mut byte = [0u8; 1];
			match self.reader.read(&mut byte).await? {
				0 if line.is_empty() && allow_eof => return Ok(None),
				0 => {
					return Err(DebugError::Protocol(
						"stream closed inside a frame header".to_string(),
					));
				}
				_ => {}
			}

			if byte[0] == b'\n' {
				if line.last() == Some(&b'\r') {
					line.pop();
				}
				let text = String::from_utf8(line).map_err(|_| {
					DebugError::Protocol("frame header is not valid UTF-8".to_string())
				})?;
				return Ok(Some(text));
			}

			line.push(byte[0]);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use adbg_protocol::{Event, Request};
	use tokio::io::AsyncWriteExt;

	fn request(seq: u64) -> ProtocolMessage {
		ProtocolMessage::Request(Request {
			seq,
			command: "configurationDone".to_string(),
			arguments: None,
		})
	}

	#[tokio::test]
	async fn frame_round_trips() {
		let (mut client, server) = tokio::io::duplex(1024);
		let mut reader = FrameReader::new(server);

		write_frame(&mut client, &request(5)).await.unwrap();

		let message = reader.read_frame().await.unwrap().unwrap();
		assert_eq!(message.seq(), 5);
	}

	#[tokio::test]
	async fn partial_writes_do_not_corrupt_boundaries() {
		let (mut client, server) = tokio::io::duplex(1024);
		let mut reader = FrameReader::new(server);

		let body = serde_json::to_vec(&request(9)).unwrap();
		let frame = [format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes(), body].concat();

		let read_task = tokio::spawn(async move { reader.read_frame().await });

		// Dribble the frame through in three chunks with pauses between.
		for chunk in frame.chunks(frame.len() / 3 + 1) {
			client.write_all(chunk).await.unwrap();
			client.flush().await.unwrap();
			tokio::time::sleep(std::time::Duration::from_millis(5)).await;
		}

		let message = read_task.await.unwrap().unwrap().unwrap();
		assert_eq!(message.seq(), 9);
	}

	#[tokio::test]
	async fn back_to_back_frames_are_separated() {
		let (mut client, server) = tokio::io::duplex(4096);
		let mut reader = FrameReader::new(server);

		write_frame(&mut client, &request(1)).await.unwrap();
		write_frame(
			&mut client,
			&ProtocolMessage::Event(Event {
				seq: 2,
				event: "initialized".to_string(),
				body: None,
			}),
		)
		.await
		.unwrap();

		assert_eq!(reader.read_frame().await.unwrap().unwrap().seq(), 1);
		let second = reader.read_frame().await.unwrap().unwrap();
		match second {
			ProtocolMessage::Event(ev) => assert_eq!(ev.event, "initialized"),
			other => panic!("expected event, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn unknown_header_lines_are_skipped() {
		let (mut client, server) = tokio::io::duplex(1024);
		let mut reader = FrameReader::new(server);

		let body = serde_json::to_vec(&request(3)).unwrap();
		let raw = format!(
			"Content-Type: application/json\r\nContent-Length: {}\r\n\r\n",
			body.len()
		);
		client.write_all(raw.as_bytes()).await.unwrap();
		client.write_all(&body).await.unwrap();

		assert_eq!(reader.read_frame().await.unwrap().unwrap().seq(), 3);
	}

	#[tokio::test]
	async fn clean_eof_yields_none() {
		let (client, server) = tokio::io::duplex(64);
		let mut reader = FrameReader::new(server);
		drop(client);

		assert!(reader.read_frame().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn eof_inside_header_is_an_error() {
		let (mut client, server) = tokio::io::duplex(64);
		let mut reader = FrameReader::new(server);

		client.write_all(b"Content-Length: 10\r\n").await.unwrap();
		drop(client);

		let err = reader.read_frame().await.unwrap_err();
		assert!(matches!(err, DebugError::Protocol(_)));
	}

	#[tokio::test]
	async fn missing_content_length_is_an_error() {
		let (mut client, server) = tokio::io::duplex(64);
		let mut reader = FrameReader::new(server);

		client.write_all(b"X-Header: yes\r\n\r\n").await.unwrap();

		let err = reader.read_frame().await.unwrap_err();
		assert!(matches!(err, DebugError::Protocol(_)));
	}
}
