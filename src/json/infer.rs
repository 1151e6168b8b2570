//! Maps a runtime JSON value to a `ClickHouse` type-spec string, and
//! preprocesses array elements for the column writers per that inferred
//! spec.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::TypeDesc;

/// Infers the `ClickHouse` type-spec string for `value` at recursion depth
/// `depth`. `value` is never a `Value::Object` at the top call (flattening
/// strips those out first); composite list/document handling only happens
/// through the recursive list branch.
#[must_use]
pub(crate) fn spec_for_value(value: &Value, depth: u32) -> String {
    match value {
        Value::Null | Value::String(_) => "String".into(),
        Value::Bool(_) => "Bool".into(),
        Value::Number(n) if n.is_i64() || n.is_u64() => "Int64".into(),
        Value::Number(_) => "Float64".into(),
        Value::Object(_) => json_spec(depth),
        Value::Array(items) => array_spec(items, depth),
    }
}

fn json_spec(depth: u32) -> String {
    let shift = 4 - i32::try_from(depth).unwrap_or(i32::MAX);
    let max_dynamic_types = pow_trunc(2.0, shift);
    let max_dynamic_paths = pow_trunc(4.0, shift);
    format!("JSON(max_dynamic_types={max_dynamic_types}, max_dynamic_paths={max_dynamic_paths})")
}

/// `2^(4-d)`/`4^(4-d)` go negative-exponent past depth 4; this truncates
/// toward zero the same way an integer cast of the fractional result would,
/// so depth 5 yields `0`. Nesting JSON past depth 4 is out-of-contract.
fn pow_trunc(base: f64, exp: i32) -> u64 {
    let value = base.powi(exp);
    if value.is_sign_negative() || !value.is_finite() {
        0
    } else {
        value as u64
    }
}

fn array_spec(items: &[Value], depth: u32) -> String {
    if items
        .iter()
        .any(|v| matches!(v, Value::Object(_) | Value::Array(_)))
    {
        tuple_or_collapsed_array_spec(items, depth)
    } else {
        format!("Array(Nullable({}))", primitive_precedence(items))
    }
}

fn tuple_or_collapsed_array_spec(items: &[Value], depth: u32) -> String {
    let subspecs: Vec<String> = items.iter().map(|v| tuple_subspec(v, depth)).collect();
    if !subspecs.is_empty() && subspecs.iter().all(|s| s == &subspecs[0]) {
        format!("Array({})", subspecs[0])
    } else {
        format!("Tuple({})", subspecs.join(", "))
    }
}

fn tuple_subspec(value: &Value, depth: u32) -> String {
    let spec = spec_for_value(value, depth + 1);
    if spec.starts_with("Array") || spec.starts_with("Tuple") || spec.starts_with("JSON") {
        spec
    } else {
        format!("Nullable({spec})")
    }
}

fn primitive_precedence(items: &[Value]) -> &'static str {
    let has_string = items
        .iter()
        .any(|v| matches!(v, Value::String(_) | Value::Null));
    if has_string {
        return "String";
    }
    let has_bool = items.iter().any(|v| matches!(v, Value::Bool(_)));
    let has_float = items
        .iter()
        .any(|v| matches!(v, Value::Number(n) if !n.is_i64() && !n.is_u64()));
    if has_float {
        return if has_bool { "String" } else { "Float64" };
    }
    let has_int = items.iter().any(|v| v.is_number());
    if has_int {
        return "Int64";
    }
    if has_bool {
        return "Bool";
    }
    "String"
}

/// Coerces `values` (the raw elements assigned to an `Array(Nullable(T))`
/// or `Array(Array(...))` bucket) into a form the non-JSON column writer for
/// `inner` can encode.
pub(crate) fn preprocess_array_values(values: &[Value], inner: &TypeDesc) -> Result<Vec<Value>> {
    match inner {
        TypeDesc::Nullable(primitive) => preprocess_nullable_primitive(values, primitive),
        TypeDesc::Array(elem) => {
            let mut out = Vec::with_capacity(values.len());
            for value in values {
                let elements = value.as_array().ok_or_else(|| Error::UnencodableValue {
                    spec: "Array".into(),
                    reason: format!("{value} is not a list"),
                })?;
                out.push(Value::Array(preprocess_array_values(elements, elem)?));
            }
            Ok(out)
        }
        other => Err(Error::UnencodableValue {
            spec: other.type_name(),
            reason: "array preprocessing only applies to Nullable(primitive) or Array(...) elements".into(),
        }),
    }
}

fn preprocess_nullable_primitive(values: &[Value], primitive: &TypeDesc) -> Result<Vec<Value>> {
    match primitive {
        TypeDesc::String => Ok(values.iter().map(coerce_string_element).collect()),
        TypeDesc::Int64 => values.iter().map(coerce_int_element).collect(),
        TypeDesc::Float64 => values.iter().map(coerce_float_element).collect(),
        // Known asymmetry: dropping nulls shrinks the batch length relative
        // to its positions; documented, not fixed.
        TypeDesc::Bool => values
            .iter()
            .filter(|v| !v.is_null())
            .map(coerce_bool_element)
            .collect(),
        other => Err(Error::UnencodableValue {
            spec: other.type_name(),
            reason: "unsupported Nullable primitive in array preprocessing".into(),
        }),
    }
}

fn coerce_string_element(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::String(b.to_string()),
        Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

fn coerce_int_element(value: &Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::from(0));
    }
    if let Some(i) = value.as_i64() {
        return Ok(Value::from(i));
    }
    if let Some(f) = value.as_f64() {
        return Ok(Value::from(f as i64));
    }
    Err(Error::UnencodableValue {
        spec: "Int64".into(),
        reason: format!("{value} cannot cast to Int64"),
    })
}

fn coerce_float_element(value: &Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::from(0));
    }
    if let Some(f) = value.as_f64() {
        return Ok(serde_json::Number::from_f64(f).map_or(Value::from(0), Value::Number));
    }
    Err(Error::UnencodableValue {
        spec: "Float64".into(),
        reason: format!("{value} cannot cast to Float64"),
    })
}

fn coerce_bool_element(value: &Value) -> Result<Value> {
    if let Some(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    match value {
        Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
        Value::String(s) => Ok(Value::Bool(!s.is_empty())),
        _ => Err(Error::UnencodableValue {
            spec: "Bool".into(),
            reason: format!("{value} cannot cast to Bool"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn infers_primitives() {
        assert_eq!(spec_for_value(&json!(1), 0), "Int64");
        assert_eq!(spec_for_value(&json!(1.5), 0), "Float64");
        assert_eq!(spec_for_value(&json!("x"), 0), "String");
        assert_eq!(spec_for_value(&json!(true), 0), "Bool");
        assert_eq!(spec_for_value(&Value::Null, 0), "String");
    }

    #[test]
    fn infers_json_at_depth() {
        assert_eq!(
            spec_for_value(&json!({"a": 1}), 0),
            "JSON(max_dynamic_types=16, max_dynamic_paths=256)"
        );
        assert_eq!(
            spec_for_value(&json!({"a": 1}), 4),
            "JSON(max_dynamic_types=1, max_dynamic_paths=1)"
        );
    }

    #[test]
    fn infers_array_of_strings_for_heterogeneous_primitive_list() {
        let list = json!([1, 0.2, "bar", "baz", false]);
        let Value::Array(items) = list else { unreachable!() };
        assert_eq!(array_spec(&items, 0), "Array(Nullable(String))");
    }

    #[test]
    fn infers_tuple_when_list_contains_a_document() {
        let list = json!([123, "2", true, {"foo": "bar"}]);
        let Value::Array(items) = list else { unreachable!() };
        let spec = array_spec(&items, 0);
        assert!(spec.starts_with("Tuple(Nullable(Int64), Nullable(String), Nullable(Bool), JSON("));
    }

    #[test]
    fn bool_array_preprocessing_drops_nulls() {
        let values = vec![json!(true), Value::Null, json!(false)];
        let out = preprocess_array_values(&values, &TypeDesc::Nullable(Box::new(TypeDesc::Bool))).unwrap();
        assert_eq!(out, vec![json!(true), json!(false)]);
    }
}
