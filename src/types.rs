//! Type descriptors produced by the JSON column's type-inference engine:
//! `Int64`, `Float64`, `String`, `Bool`, `Nullable`, `Array`, `Tuple`, and
//! `Json` for embedded dynamic sub-documents.

use std::fmt;

use crate::error::{Error, Result};

/// Parsed `ClickHouse` type descriptor, restricted to the forms the JSON
/// column's type-inference engine can produce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDesc {
    /// Signed 64-bit integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Variable-length string.
    String,
    /// Boolean stored as an 8-bit integer.
    Bool,
    /// Nullable wrapper around a primitive.
    Nullable(Box<TypeDesc>),
    /// Array of a single element type.
    Array(Box<TypeDesc>),
    /// Tuple of ordered, unnamed element types.
    Tuple(Vec<TypeDesc>),
    /// Embedded dynamic JSON sub-document with depth-scaled limits.
    Json {
        /// Maximum number of distinct dynamic types per path.
        max_dynamic_types: u64,
        /// Maximum number of distinct dynamic paths.
        max_dynamic_paths: u64,
    },
}

impl TypeDesc {
    /// Returns the `ClickHouse` type name as it appears on the wire.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            TypeDesc::Int64 => "Int64".into(),
            TypeDesc::Float64 => "Float64".into(),
            TypeDesc::String => "String".into(),
            TypeDesc::Bool => "Bool".into(),
            TypeDesc::Nullable(inner) => format!("Nullable({})", inner.type_name()),
            TypeDesc::Array(inner) => format!("Array({})", inner.type_name()),
            TypeDesc::Tuple(items) => {
                let rendered: Vec<String> = items.iter().map(TypeDesc::type_name).collect();
                format!("Tuple({})", rendered.join(", "))
            }
            TypeDesc::Json {
                max_dynamic_types,
                max_dynamic_paths,
            } => format!(
                "JSON(max_dynamic_types={max_dynamic_types}, max_dynamic_paths={max_dynamic_paths})"
            ),
        }
    }

    /// Reports whether this spec, or any spec nested within it, is a
    /// `JSON(...)` sub-document.
    #[must_use]
    pub fn contains_json(&self) -> bool {
        match self {
            TypeDesc::Json { .. } => true,
            TypeDesc::Nullable(inner) | TypeDesc::Array(inner) => inner.contains_json(),
            TypeDesc::Tuple(items) => items.iter().any(TypeDesc::contains_json),
            TypeDesc::Int64 | TypeDesc::Float64 | TypeDesc::String | TypeDesc::Bool => false,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

/// Parses a textual `ClickHouse` type spec into a structured descriptor.
///
/// # Errors
///
/// Returns [`Error::InvalidTypeSpec`] when the descriptor is malformed or
/// names a type outside the subset this codec's inference engine produces.
pub fn parse_type_desc(input: &str) -> Result<TypeDesc> {
    let trimmed = input.trim();
    match trimmed {
        "Int64" => return Ok(TypeDesc::Int64),
        "Float64" => return Ok(TypeDesc::Float64),
        "String" => return Ok(TypeDesc::String),
        "Bool" => return Ok(TypeDesc::Bool),
        _ => {}
    }
    if let Some(inner) = trimmed.strip_prefix("Nullable(").and_then(|s| s.strip_suffix(')')) {
        let desc = parse_type_desc(inner)?;
        if matches!(desc, TypeDesc::Tuple(_) | TypeDesc::Array(_) | TypeDesc::Json { .. }) {
            return Err(Error::InvalidTypeSpec(format!(
                "Nullable({}) is unsupported",
                desc.type_name()
            )));
        }
        return Ok(TypeDesc::Nullable(Box::new(desc)));
    }
    if let Some(inner) = trimmed.strip_prefix("Array(").and_then(|s| s.strip_suffix(')')) {
        let desc = parse_type_desc(inner)?;
        return Ok(TypeDesc::Array(Box::new(desc)));
    }
    if let Some(inner) = trimmed.strip_prefix("Tuple(").and_then(|s| s.strip_suffix(')')) {
        let items = split_top_level_commas(inner);
        if items.is_empty() {
            return Err(Error::InvalidTypeSpec("Tuple expects at least one type".into()));
        }
        let mut parsed = Vec::with_capacity(items.len());
        for item in items {
            parsed.push(parse_type_desc(item)?);
        }
        return Ok(TypeDesc::Tuple(parsed));
    }
    if let Some(inner) = trimmed.strip_prefix("JSON(").and_then(|s| s.strip_suffix(')')) {
        return parse_json_params(inner);
    }
    if trimmed == "JSON" {
        return Err(Error::InvalidTypeSpec(
            "bare JSON spec has no dynamic limits".into(),
        ));
    }
    Err(Error::InvalidTypeSpec(trimmed.to_string()))
}

fn parse_json_params(input: &str) -> Result<TypeDesc> {
    let mut max_dynamic_types = None;
    let mut max_dynamic_paths = None;
    for part in split_top_level_commas(input) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| Error::InvalidTypeSpec(format!("malformed JSON parameter: {part}")))?;
        let value: u64 = value
            .trim()
            .parse()
            .map_err(|_| Error::InvalidTypeSpec(format!("invalid JSON parameter value: {value}")))?;
        match key.trim() {
            "max_dynamic_types" => max_dynamic_types = Some(value),
            "max_dynamic_paths" => max_dynamic_paths = Some(value),
            other => return Err(Error::InvalidTypeSpec(format!("unknown JSON parameter: {other}"))),
        }
    }
    Ok(TypeDesc::Json {
        max_dynamic_types: max_dynamic_types
            .ok_or_else(|| Error::InvalidTypeSpec("JSON(...) missing max_dynamic_types".into()))?,
        max_dynamic_paths: max_dynamic_paths
            .ok_or_else(|| Error::InvalidTypeSpec("JSON(...) missing max_dynamic_paths".into()))?,
    })
}

/// Splits a comma-separated list at top-level commas only, respecting
/// balanced parentheses (so `Tuple(Int64, Array(String))` splits into
/// `["Int64", "Array(String)"]`, not three pieces).
#[must_use]
pub fn split_top_level_commas(input: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut depth = 0_i32;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                entries.push(input[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < input.len() {
        let tail = input[start..].trim();
        if !tail.is_empty() {
            entries.push(tail);
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitives() {
        assert_eq!(parse_type_desc("Int64").unwrap(), TypeDesc::Int64);
        assert_eq!(parse_type_desc("Float64").unwrap(), TypeDesc::Float64);
        assert_eq!(parse_type_desc("String").unwrap(), TypeDesc::String);
        assert_eq!(parse_type_desc("Bool").unwrap(), TypeDesc::Bool);
    }

    #[test]
    fn parses_nested_tuple_with_array() {
        let desc = parse_type_desc("Tuple(Nullable(Int64), Array(Nullable(String)))").unwrap();
        assert_eq!(
            desc,
            TypeDesc::Tuple(vec![
                TypeDesc::Nullable(Box::new(TypeDesc::Int64)),
                TypeDesc::Array(Box::new(TypeDesc::Nullable(Box::new(TypeDesc::String)))),
            ])
        );
    }

    #[test]
    fn parses_json_params() {
        let desc = parse_type_desc("JSON(max_dynamic_types=16, max_dynamic_paths=256)").unwrap();
        assert_eq!(
            desc,
            TypeDesc::Json {
                max_dynamic_types: 16,
                max_dynamic_paths: 256,
            }
        );
        assert_eq!(
            desc.type_name(),
            "JSON(max_dynamic_types=16, max_dynamic_paths=256)"
        );
    }

    #[test]
    fn rejects_nullable_of_composite() {
        let err = parse_type_desc("Nullable(Array(Int64))").unwrap_err();
        assert!(matches!(err, Error::InvalidTypeSpec(_)));
    }

    #[test]
    fn tuple_containing_json_round_trips_type_name() {
        let desc = TypeDesc::Tuple(vec![
            TypeDesc::Nullable(Box::new(TypeDesc::Int64)),
            TypeDesc::Json {
                max_dynamic_types: 16,
                max_dynamic_paths: 256,
            },
        ]);
        assert!(desc.contains_json());
        assert_eq!(
            desc.type_name(),
            "Tuple(Nullable(Int64), JSON(max_dynamic_types=16, max_dynamic_paths=256))"
        );
    }
}
