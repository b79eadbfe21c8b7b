//! Wire types for the playbook debug-adapter protocol.
//!
//! This crate contains the serde-serializable types exchanged with a
//! debuggee over the framed debug-adapter channel. These types represent
//! the "protocol layer" - the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * 1:1 with protocol: Match the debug-adapter wire schema (camelCase)
//! * Stable: Changes only when the wire protocol changes
//!
//! The framing codec, request correlation, and session logic live in the
//! `adbg` crate; nothing here performs I/O.

pub mod events;
pub mod message;
pub mod requests;
pub mod responses;
pub mod types;

pub use events::*;
pub use message::*;
pub use requests::*;
pub use responses::*;
pub use types::*;
