//! Reads/writes the positions stream and per-spec value bytes for every
//! path in a `PathMap`, dispatching non-JSON specs to the column registry
//! and recursing into nested `JSON` sub-blocks for the rest.

use std::io::{Read, Write};

use serde_json::Value;

use crate::columns;
use crate::error::{Error, Result};
use crate::io::{read_u64_le, skip, write_u64_le, write_zeros};
use crate::types;

use super::flatten::fold;
use super::{header, positions, PathMap, SpecBucket};

/// Reads the values for every path in `path_map` (already populated by the
/// header codec with paths/specs/nested headers), then consumes the
/// trailing `8 * n_items` padding bytes. Also used recursively for nested
/// JSON sub-blocks, which carry the same trailing padding.
pub(super) fn read_values(path_map: &mut PathMap, n_items: usize, buf: &mut dyn Read) -> Result<()> {
    for spec_map in path_map.paths.values_mut() {
        positions::read_positions(spec_map, n_items, buf)?;
        let spec_names: Vec<String> = spec_map.specs.keys().cloned().collect();
        for spec in spec_names {
            let bucket = spec_map.specs.get_mut(&spec).expect("spec present");
            read_spec_values(&spec, bucket, buf)?;
        }
    }
    skip(buf, 8 * n_items, "values trailing padding")?;
    Ok(())
}

fn read_spec_values(spec: &str, bucket: &mut SpecBucket, buf: &mut dyn Read) -> Result<()> {
    if spec.starts_with("Array(") && spec.contains("JSON") {
        read_array_json_values(bucket, buf)
    } else if spec.starts_with("Tuple(") && spec.contains("JSON") {
        read_tuple_json_values(spec, bucket, buf)
    } else if spec.starts_with("Array(") {
        let ty = types::parse_type_desc(spec)?;
        let codec = columns::column_for_spec(&ty)?;
        bucket.values = codec.read_data(bucket.positions.len(), buf)?;
        Ok(())
    } else {
        let ty = types::parse_type_desc(spec)?;
        let codec = columns::column_for_spec(&ty)?;
        bucket.values = codec.read_items(bucket.positions.len(), buf)?;
        Ok(())
    }
}

fn read_array_json_values(bucket: &mut SpecBucket, buf: &mut dyn Read) -> Result<()> {
    let n = bucket.positions.len();
    let mut offsets = Vec::with_capacity(n);
    for _ in 0..n {
        offsets.push(read_u64_le(buf)?);
    }
    let total = usize::try_from(offsets.last().copied().unwrap_or(0))
        .map_err(|_| Error::MalformedHeader("Array(JSON) offset overflowed usize".into()))?;
    let array_header = bucket
        .array_header
        .as_mut()
        .ok_or_else(|| Error::MalformedHeader("missing array_header for Array(JSON) spec".into()))?;
    read_values(array_header, total, buf)?;
    let flat = fold(total, array_header);

    let mut values = Vec::with_capacity(n);
    let mut prev = 0_usize;
    for bound in offsets {
        let bound = bound as usize;
        values.push(Value::Array(flat[prev..bound].to_vec()));
        prev = bound;
    }
    bucket.values = values;
    Ok(())
}

fn read_tuple_json_values(spec: &str, bucket: &mut SpecBucket, buf: &mut dyn Read) -> Result<()> {
    let n = bucket.positions.len();
    let subspecs = header::split_tuple_subspecs(spec);
    let slots = bucket
        .tuple_header
        .as_mut()
        .ok_or_else(|| Error::MalformedHeader("missing tuple_header for Tuple(JSON) spec".into()))?;

    let mut rows: Vec<Vec<Value>> = vec![Vec::with_capacity(subspecs.len()); n];
    for (idx, subspec) in subspecs.iter().enumerate() {
        if subspec.starts_with("JSON") {
            let nested = slots
                .get_mut(idx)
                .and_then(|slot| slot.as_mut())
                .ok_or_else(|| Error::MalformedHeader("missing nested header for JSON tuple slot".into()))?;
            read_values(nested, n, buf)?;
            for (row, value) in rows.iter_mut().zip(fold(n, nested)) {
                row.push(value);
            }
            break;
        } else if subspec.starts_with("Array(") || subspec.starts_with("Tuple(") {
            let ty = types::parse_type_desc(subspec)?;
            let codec = columns::column_for_spec(&ty)?;
            for (row, value) in rows.iter_mut().zip(codec.read_items(n, buf)?) {
                row.push(value);
            }
        } else {
            // `n` mask bytes, a placeholder never consulted for nullness
            // (the tuple's primitive elements are always concrete), then the
            // real per-row data for the `Nullable(...)`-named subspec's
            // inner, non-nullable type.
            skip(buf, n, "tuple null mask")?;
            let ty = types::parse_type_desc(subspec)?;
            let codec = columns::column_for_spec(&inner_of_nullable(ty))?;
            for (row, value) in rows.iter_mut().zip(codec.read_data(n, buf)?) {
                row.push(value);
            }
        }
    }
    bucket.values = rows.into_iter().map(Value::Array).collect();
    Ok(())
}

/// Unwraps a `Nullable(X)` subspec to its inner `X`; returns the type
/// unchanged otherwise. The tuple-with-JSON primitive slots are named
/// `Nullable(...)` by `infer::tuple_subspec` but carry no real null bitmap
/// on the wire, so their data is read/written through the bare inner type.
fn inner_of_nullable(ty: types::TypeDesc) -> types::TypeDesc {
    match ty {
        types::TypeDesc::Nullable(inner) => *inner,
        other => other,
    }
}

pub(super) fn write_values(path_map: &PathMap, n_items: usize, buf: &mut dyn Write) -> Result<()> {
    for spec_map in path_map.paths.values() {
        positions::write_positions(spec_map, n_items, buf)?;
        for (spec, bucket) in &spec_map.specs {
            write_spec_values(spec, bucket, buf)?;
        }
    }
    write_zeros(buf, 8 * n_items)
}

fn write_spec_values(spec: &str, bucket: &SpecBucket, buf: &mut dyn Write) -> Result<()> {
    if spec.starts_with("Array(") && spec.contains("JSON") {
        write_array_json_values(bucket, buf)
    } else if spec.starts_with("Tuple(") && spec.contains("JSON") {
        write_tuple_json_values(spec, bucket, buf)
    } else if spec.starts_with("Array(") {
        let ty = types::parse_type_desc(spec)?;
        let types::TypeDesc::Array(inner) = &ty else {
            unreachable!("spec starts with Array(")
        };
        let codec = columns::column_for_spec(&ty)?;
        // Preprocessing applies per element within each row's list; rewrap
        // into per-row arrays so `write_data` can offset them itself.
        let preprocessed: Vec<Value> = bucket
            .values
            .iter()
            .map(|row| {
                let elements = row.as_array().ok_or_else(|| Error::UnencodableValue {
                    spec: spec.into(),
                    reason: format!("{row} is not a list"),
                })?;
                Ok(Value::Array(super::infer::preprocess_array_values(elements, inner)?))
            })
            .collect::<Result<Vec<_>>>()?;
        codec.write_data(&preprocessed, buf)
    } else {
        let ty = types::parse_type_desc(spec)?;
        let codec = columns::column_for_spec(&ty)?;
        codec.write_items(&bucket.values, buf)
    }
}

fn write_array_json_values(bucket: &SpecBucket, buf: &mut dyn Write) -> Result<()> {
    let mut cumulative = 0_u64;
    for value in &bucket.values {
        let elements = value.as_array().ok_or_else(|| Error::UnencodableValue {
            spec: "Array(JSON)".into(),
            reason: format!("{value} is not a list"),
        })?;
        cumulative += elements.len() as u64;
        write_u64_le(buf, cumulative)?;
    }
    let array_header = bucket
        .array_header
        .as_ref()
        .ok_or_else(|| Error::MalformedHeader("missing array_header for Array(JSON) spec".into()))?;
    write_values(array_header, cumulative as usize, buf)
}

fn write_tuple_json_values(spec: &str, bucket: &SpecBucket, buf: &mut dyn Write) -> Result<()> {
    let n = bucket.values.len();
    let subspecs = header::split_tuple_subspecs(spec);
    let slots = bucket
        .tuple_header
        .as_ref()
        .ok_or_else(|| Error::MalformedHeader("missing tuple_header for Tuple(JSON) spec".into()))?;

    for (idx, subspec) in subspecs.iter().enumerate() {
        if subspec.starts_with("JSON") {
            let nested = slots
                .get(idx)
                .and_then(|slot| slot.as_ref())
                .ok_or_else(|| Error::MalformedHeader("missing nested header for JSON tuple slot".into()))?;
            write_values(nested, n, buf)?;
            return Ok(());
        } else if subspec.starts_with("Array(") || subspec.starts_with("Tuple(") {
            let column = tuple_column_at(&bucket.values, idx, spec)?;
            let ty = types::parse_type_desc(subspec)?;
            let codec = columns::column_for_spec(&ty)?;
            codec.write_items(&column, buf)?;
        } else {
            write_zeros(buf, n)?;
            let column = tuple_column_at(&bucket.values, idx, spec)?;
            let ty = types::parse_type_desc(subspec)?;
            let codec = columns::column_for_spec(&inner_of_nullable(ty))?;
            codec.write_data(&column, buf)?;
        }
    }
    Ok(())
}

fn tuple_column_at(values: &[Value], idx: usize, spec: &str) -> Result<Vec<Value>> {
    values
        .iter()
        .map(|value| {
            value
                .as_array()
                .and_then(|row| row.get(idx).cloned())
                .ok_or_else(|| Error::UnencodableValue {
                    spec: spec.into(),
                    reason: format!("{value} has no element {idx}"),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::flatten::unfold;
    use serde_json::json;

    #[test]
    fn round_trips_plain_values_block() {
        let docs = vec![json!({"key": 1}), json!({"key": "val"}), json!({"key": 2.0})];
        let path_map = unfold(&docs, 0);
        let mut buf = Vec::new();
        write_values(&path_map, docs.len(), &mut buf).unwrap();

        // Rebuild a header-shaped PathMap (values/positions empty) to decode into.
        let mut decode_map = PathMap::new();
        for (path, spec_map) in &path_map.paths {
            for spec in spec_map.specs.keys() {
                decode_map.bucket_mut(path, spec);
            }
        }
        read_values(&mut decode_map, docs.len(), &mut buf.as_slice()).unwrap();
        let folded = fold(docs.len(), &decode_map);
        assert_eq!(folded, docs);
    }
}
