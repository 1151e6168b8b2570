//! The column registry: `column_for_spec` is the lookup from a non-JSON
//! `ClickHouse` type spec to a codec capable of `read_items`/`read_data`/
//! `write_items`/`write_data`. This module supplies a concrete
//! implementation for the handful of specs the type-inference engine in
//! `infer.rs` can actually produce, built in the native block-columnar
//! shape (offsets for `Array`, a null-bitmap for `Nullable`,
//! column-per-element for `Tuple`).
//!
//! Row documents and column values both use `serde_json::Value`: a
//! `ClickHouse` JSON document already has no semantic gap against it, so
//! there is no separate tagged-union type to keep in sync.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::io::{
    read_array, read_bytes_u32_prefixed, read_u64_le, read_u8, write_bytes_u32_prefixed, write_u64_le, write_u8,
};
use crate::types::TypeDesc;

/// Capability set a non-JSON leaf/composite spec must provide.
pub trait ColumnCodec {
    /// Reads `n` independently-framed values (used when a spec is read one
    /// row at a time, e.g. inside a `Tuple(... JSON ...)` walk).
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the buffer is truncated or malformed.
    fn read_items(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>>;

    /// Reads `n` values from a single contiguous column-data stream.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the buffer is truncated or malformed.
    fn read_data(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>>;

    /// Writes `items` as independently-framed values.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a value cannot be coerced to this spec.
    fn write_items(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()>;

    /// Writes `items` as a single contiguous column-data stream.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a value cannot be coerced to this spec.
    fn write_data(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()>;
}

/// Looks up the column codec for a non-JSON `ClickHouse` type spec.
///
/// # Errors
///
/// Returns [`Error::UnknownSpec`] when `ty` names (or embeds) a `JSON`
/// sub-document, since those are handled by the recursive JSON codec, not
/// by this registry.
pub fn column_for_spec(ty: &TypeDesc) -> Result<Box<dyn ColumnCodec>> {
    match ty {
        TypeDesc::Int64 => Ok(Box::new(Int64Column)),
        TypeDesc::Float64 => Ok(Box::new(Float64Column)),
        TypeDesc::String => Ok(Box::new(StringColumn)),
        TypeDesc::Bool => Ok(Box::new(BoolColumn)),
        TypeDesc::Nullable(inner) => Ok(Box::new(NullableColumn {
            inner: column_for_spec(inner)?,
        })),
        TypeDesc::Array(inner) => Ok(Box::new(ArrayColumn {
            inner: column_for_spec(inner)?,
        })),
        TypeDesc::Tuple(items) => {
            let mut codecs = Vec::with_capacity(items.len());
            for item in items {
                codecs.push(column_for_spec(item)?);
            }
            Ok(Box::new(TupleColumn { items: codecs }))
        }
        TypeDesc::Json { .. } => Err(Error::UnknownSpec(ty.type_name())),
    }
}

struct Int64Column;

impl ColumnCodec for Int64Column {
    fn read_items(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        self.read_data(n, buf)
    }

    fn read_data(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            let raw = i64::from_le_bytes(read_array(buf, "Int64")?);
            values.push(Value::from(raw));
        }
        Ok(values)
    }

    fn write_items(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        self.write_data(items, buf)
    }

    fn write_data(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        for item in items {
            let raw = json_as_i64(item)?;
            buf.write_all(&raw.to_le_bytes())?;
        }
        Ok(())
    }
}

struct Float64Column;

impl ColumnCodec for Float64Column {
    fn read_items(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        self.read_data(n, buf)
    }

    fn read_data(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            let raw = f64::from_le_bytes(read_array(buf, "Float64")?);
            values.push(
                serde_json::Number::from_f64(raw)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            );
        }
        Ok(values)
    }

    fn write_items(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        self.write_data(items, buf)
    }

    fn write_data(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        for item in items {
            let raw = json_as_f64(item)?;
            buf.write_all(&raw.to_le_bytes())?;
        }
        Ok(())
    }
}

struct BoolColumn;

impl ColumnCodec for BoolColumn {
    fn read_items(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        self.read_data(n, buf)
    }

    fn read_data(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(Value::Bool(read_u8(buf)? != 0));
        }
        Ok(values)
    }

    fn write_items(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        self.write_data(items, buf)
    }

    fn write_data(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        for item in items {
            write_u8(buf, u8::from(json_as_bool(item)?))?;
        }
        Ok(())
    }
}

struct StringColumn;

impl ColumnCodec for StringColumn {
    fn read_items(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        self.read_data(n, buf)
    }

    fn read_data(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            let bytes = read_bytes_u32_prefixed(buf)?;
            let text = String::from_utf8(bytes).map_err(|err| Error::MalformedHeader(err.to_string()))?;
            values.push(Value::String(text));
        }
        Ok(values)
    }

    fn write_items(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        self.write_data(items, buf)
    }

    fn write_data(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        for item in items {
            let text = json_as_str(item)?;
            write_bytes_u32_prefixed(buf, text.as_bytes())?;
        }
        Ok(())
    }
}

struct NullableColumn {
    inner: Box<dyn ColumnCodec>,
}

impl ColumnCodec for NullableColumn {
    fn read_items(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        self.read_data(n, buf)
    }

    fn read_data(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        let mut mask = Vec::with_capacity(n);
        for _ in 0..n {
            mask.push(read_u8(buf)? != 0);
        }
        let raw = self.inner.read_data(n, buf)?;
        Ok(mask
            .into_iter()
            .zip(raw)
            .map(|(is_null, value)| if is_null { Value::Null } else { value })
            .collect())
    }

    fn write_items(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        self.write_data(items, buf)
    }

    fn write_data(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        for item in items {
            write_u8(buf, u8::from(item.is_null()))?;
        }
        let placeholder = default_placeholder(&self.inner);
        let substituted: Vec<Value> = items
            .iter()
            .map(|item| if item.is_null() { placeholder.clone() } else { item.clone() })
            .collect();
        self.inner.write_data(&substituted, buf)
    }
}

fn default_placeholder(_inner: &dyn ColumnCodec) -> Value {
    // The inner codec never inspects a null slot's placeholder beyond
    // coercing it, so any representable zero value works; `0` coerces
    // cleanly via `json_as_i64`/`json_as_f64`/`json_as_bool`/`json_as_str`.
    Value::from(0)
}

struct ArrayColumn {
    inner: Box<dyn ColumnCodec>,
}

impl ColumnCodec for ArrayColumn {
    fn read_items(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        self.read_data(n, buf)
    }

    fn read_data(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        let mut offsets = Vec::with_capacity(n);
        for _ in 0..n {
            offsets.push(read_u64_le(buf)?);
        }
        let total = offsets.last().copied().unwrap_or(0);
        let flat = self.inner.read_data(total as usize, buf)?;
        let mut values = Vec::with_capacity(n);
        let mut prev = 0_u64;
        for bound in offsets {
            let slice = flat[prev as usize..bound as usize].to_vec();
            values.push(Value::Array(slice));
            prev = bound;
        }
        Ok(values)
    }

    fn write_items(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        self.write_data(items, buf)
    }

    fn write_data(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        let mut bound = 0_u64;
        let mut flat = Vec::new();
        for item in items {
            let elements = json_as_array(item)?;
            bound += elements.len() as u64;
            write_u64_le(buf, bound)?;
            flat.extend(elements.iter().cloned());
        }
        self.inner.write_data(&flat, buf)
    }
}

struct TupleColumn {
    items: Vec<Box<dyn ColumnCodec>>,
}

impl ColumnCodec for TupleColumn {
    fn read_items(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        let mut columns = Vec::with_capacity(self.items.len());
        for codec in &self.items {
            columns.push(codec.read_data(n, buf)?);
        }
        let mut rows = Vec::with_capacity(n);
        for row_idx in 0..n {
            let row: Vec<Value> = columns.iter().map(|column| column[row_idx].clone()).collect();
            rows.push(Value::Array(row));
        }
        Ok(rows)
    }

    fn read_data(&self, n: usize, buf: &mut dyn std::io::Read) -> Result<Vec<Value>> {
        self.read_items(n, buf)
    }

    fn write_items(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        for (field_idx, codec) in self.items.iter().enumerate() {
            let mut column = Vec::with_capacity(items.len());
            for item in items {
                let row = json_as_array(item)?;
                let value = row.get(field_idx).cloned().ok_or_else(|| Error::UnencodableValue {
                    spec: "Tuple".into(),
                    reason: "row has fewer elements than the tuple spec".into(),
                })?;
                column.push(value);
            }
            codec.write_data(&column, buf)?;
        }
        Ok(())
    }

    fn write_data(&self, items: &[Value], buf: &mut dyn std::io::Write) -> Result<()> {
        self.write_items(items, buf)
    }
}

pub(crate) fn json_as_i64(value: &Value) -> Result<i64> {
    value.as_i64().ok_or_else(|| Error::UnencodableValue {
        spec: "Int64".into(),
        reason: format!("{value} is not an integer"),
    })
}

pub(crate) fn json_as_f64(value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| Error::UnencodableValue {
        spec: "Float64".into(),
        reason: format!("{value} is not a number"),
    })
}

pub(crate) fn json_as_bool(value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| Error::UnencodableValue {
        spec: "Bool".into(),
        reason: format!("{value} is not a boolean"),
    })
}

pub(crate) fn json_as_str(value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::UnencodableValue {
            spec: "String".into(),
            reason: format!("{value} is not a string"),
        })
}

fn json_as_array(value: &Value) -> Result<Vec<Value>> {
    value.as_array().cloned().ok_or_else(|| Error::UnencodableValue {
        spec: "Array/Tuple".into(),
        reason: format!("{value} is not a list"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int64_column_round_trips() {
        let codec = column_for_spec(&TypeDesc::Int64).unwrap();
        let mut buf = Vec::new();
        codec.write_data(&[json!(1), json!(-2), json!(3)], &mut buf).unwrap();
        let values = codec.read_data(3, &mut buf.as_slice()).unwrap();
        assert_eq!(values, vec![json!(1), json!(-2), json!(3)]);
    }

    #[test]
    fn nullable_string_column_preserves_nulls() {
        let codec = column_for_spec(&TypeDesc::Nullable(Box::new(TypeDesc::String))).unwrap();
        let mut buf = Vec::new();
        let input = vec![json!("a"), Value::Null, json!("c")];
        codec.write_data(&input, &mut buf).unwrap();
        let values = codec.read_data(3, &mut buf.as_slice()).unwrap();
        assert_eq!(values, input);
    }

    #[test]
    fn array_of_nullable_int64_round_trips() {
        let codec = column_for_spec(&TypeDesc::Array(Box::new(TypeDesc::Nullable(Box::new(
            TypeDesc::Int64,
        )))))
        .unwrap();
        let mut buf = Vec::new();
        let input = vec![json!([1, 2, null]), json!([]), json!([7])];
        codec.write_data(&input, &mut buf).unwrap();
        let values = codec.read_data(3, &mut buf.as_slice()).unwrap();
        assert_eq!(values, input);
    }

    #[test]
    fn tuple_column_round_trips() {
        let codec = column_for_spec(&TypeDesc::Tuple(vec![
            TypeDesc::Nullable(Box::new(TypeDesc::Int64)),
            TypeDesc::String,
        ]))
        .unwrap();
        let mut buf = Vec::new();
        let input = vec![json!([1, "a"]), json!([null, "b"])];
        codec.write_items(&input, &mut buf).unwrap();
        let values = codec.read_items(2, &mut buf.as_slice()).unwrap();
        assert_eq!(values, input);
    }
}
