//! The recursive JSON column codec: orchestrator entry points plus the
//! `PathMap`/`SpecMap`/`SpecBucket` intermediary the header, positions, and
//! value codecs all share.
//!
//! A `PathMap` exists only for the lifetime of one `read_items`/`write_items`
//! call (or one recursive JSON sub-block within it); nothing persists across
//! calls.

mod flatten;
mod header;
mod infer;
mod positions;
mod values;

use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::io::write_u8;

/// An ordered mapping from dotted path to [`SpecMap`]; iteration order is
/// lexicographic on the path string, which a `BTreeMap` gives for free.
#[derive(Default)]
pub(crate) struct PathMap {
    pub(crate) paths: BTreeMap<String, SpecMap>,
}

/// An ordered mapping from `ClickHouse` type-spec string to [`SpecBucket`].
#[derive(Default)]
pub(crate) struct SpecMap {
    pub(crate) specs: BTreeMap<String, SpecBucket>,
}

/// The values and metadata collected for one (path, spec) pair.
#[derive(Default)]
pub(crate) struct SpecBucket {
    pub(crate) values: Vec<Value>,
    pub(crate) positions: Vec<usize>,
    /// Present only for a `Tuple(...)` spec containing `JSON`: one slot per
    /// tuple element, `Some` for the `JSON` element's nested path map.
    pub(crate) tuple_header: Option<Vec<Option<PathMap>>>,
    /// Present only for an `Array(JSON(...))` spec: the element document's
    /// nested path map.
    pub(crate) array_header: Option<PathMap>,
}

impl PathMap {
    pub(crate) fn new() -> Self {
        PathMap::default()
    }

    pub(crate) fn bucket_mut(&mut self, path: &str, spec: &str) -> &mut SpecBucket {
        self.paths
            .entry(path.to_string())
            .or_default()
            .specs
            .entry(spec.to_string())
            .or_default()
    }
}

/// Emits the single byte announcing "binary column data follows" to the peer.
///
/// # Errors
///
/// Returns an [`Error`] if `buf` fails to accept the byte.
pub fn write_state_prefix(buf: &mut dyn Write) -> Result<()> {
    write_u8(buf, 0x02)
}

/// Decodes `n_items` rows of a `JSON` column from `buf`.
///
/// # Errors
///
/// Returns an [`Error`] when the header, positions, or value streams are
/// truncated or malformed, or when a leaf spec has no registered column
/// codec.
pub fn read_items(n_items: usize, buf: &mut dyn Read) -> Result<Vec<Value>> {
    match header::read_paths_header(buf)? {
        header::PathsHeader::Shared(shared) => {
            header::read_shared_values(&shared, buf)?;
            Ok(Vec::new())
        }
        header::PathsHeader::Paths(paths) => {
            let mut path_map = header::read_specs_headers(paths, buf)?;
            values::read_values(&mut path_map, n_items, buf)?;
            Ok(flatten::fold(n_items, &path_map))
        }
    }
}

/// Encodes `items` as a `JSON` column into `buf`.
///
/// A `Value::String` item is first JSON-parsed as a document; `Value::Null`
/// becomes the empty document, per the column's `null_value` convention.
///
/// # Errors
///
/// Returns an [`Error`] when a string item is not valid JSON, or when a
/// value cannot be coerced into its inferred spec.
pub fn write_items(items: &[Value], buf: &mut dyn Write) -> Result<()> {
    let docs = items
        .iter()
        .map(coerce_to_document)
        .collect::<Result<Vec<_>>>()?;
    let path_map = flatten::unfold(&docs, 0);
    header::write_paths_header(&path_map, buf)?;
    header::write_specs_header(&path_map, buf)?;
    values::write_values(&path_map, docs.len(), buf)
}

fn coerce_to_document(value: &Value) -> Result<Value> {
    match value {
        Value::String(raw) => serde_json::from_str(raw).map_err(|err| Error::UnencodableValue {
            spec: "JSON".into(),
            reason: format!("row string is not valid JSON: {err}"),
        }),
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        other => Ok(other.clone()),
    }
}
