//! Codec for `ClickHouse`'s native `JSON` column type over the native
//! binary block protocol.
//!
//! [`write_items`] infers a per-path, per-type schema from a batch of
//! documents, then emits the header/positions/value streams the server
//! expects for a `JSON` column; [`read_items`] reverses that into the same
//! documents. Everything else about the protocol (connection handshake,
//! block framing, ordinary column codecs) is out of scope, see the
//! `column_for_spec` registry in [`columns`].

mod columns;
mod error;
mod io;
mod json;
mod types;

pub use error::{Error, Result};
pub use json::{read_items, write_items, write_state_prefix};

/// A single `JSON` column row: a nested document with string keys and
/// values drawn from {int64, float64, string, bool, null, list, document}.
pub type Row = serde_json::Value;
