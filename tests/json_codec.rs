//! End-to-end scenarios for the `JSON` column codec, driven entirely against
//! in-memory buffers (no live server involved).

use clickhouse_json_block::{read_items, write_items, write_state_prefix};
use serde_json::json;

fn round_trip(docs: &[serde_json::Value]) -> Vec<serde_json::Value> {
    let mut buf = Vec::new();
    write_items(docs, &mut buf).unwrap();
    let mut cursor = buf.as_slice();
    let rows = read_items(docs.len(), &mut cursor).unwrap();
    assert_eq!(cursor.len(), 0, "read_items must consume exactly what write_items emitted");
    rows
}

#[test]
fn write_state_prefix_emits_single_byte() {
    let mut buf = Vec::new();
    write_state_prefix(&mut buf).unwrap();
    assert_eq!(buf, vec![0x02]);
}

#[test]
fn s1_single_int() {
    let docs = vec![json!({"key": 1})];
    assert_eq!(round_trip(&docs), docs);
}

#[test]
fn s2_mixed_type_key_sorts_specs_lexicographically() {
    let docs = vec![json!({"key": 1}), json!({"key": "val"}), json!({"key": 2.0})];
    assert_eq!(round_trip(&docs), docs);
}

#[test]
fn s3_nested_document_and_string_list() {
    let docs = vec![json!({
        "profile": {"first_name": "John", "age": 30},
        "roles": ["admin", "user"],
    })];
    let rows = round_trip(&docs);
    assert_eq!(rows[0]["profile"]["age"], json!(30));
    assert_eq!(rows[0]["profile"]["first_name"], json!("John"));
    assert_eq!(rows[0]["roles"], json!(["admin", "user"]));
}

#[test]
fn s4_heterogeneous_primitive_list_becomes_strings() {
    let docs = vec![json!({"foo": [1, 0.2, "bar", "baz", false]})];
    let rows = round_trip(&docs);
    assert_eq!(rows, vec![json!({"foo": ["1", "0.2", "bar", "baz", "false"]})]);
}

#[test]
fn s5_document_inside_list_preserves_list_shape() {
    let docs = vec![json!({
        "list": [123, "2", true, {"foo": "bar", "list": [0.123, {"baz": "bar"}]}],
    })];
    assert_eq!(round_trip(&docs), docs);
}

#[test]
fn s6_shared_paths_branch_returns_empty_without_overread() {
    #[rustfmt::skip]
    let bytes: Vec<u8> = vec![
        0, 0, 0, 0, 0, 0, 0, 0, 0, // 9 reserved bytes
        0,                         // paths_count == 0 -> shared-paths branch
        1,                         // shared_count
        0, 0, 0, 0, 0, 0, 0,       // 7 reserved bytes
        1, b'x',                   // one length-prefixed shared path name "x"
        3, 9, 9, 9,                // content_len=3 followed by 3 opaque bytes
    ];
    let mut cursor = bytes.as_slice();
    let rows = read_items(5, &mut cursor).unwrap();
    assert!(rows.is_empty());
    assert_eq!(cursor.len(), 0, "shared-values section must be fully consumed");
}

#[test]
fn empty_batch_round_trips_to_empty_list() {
    let docs: Vec<serde_json::Value> = vec![];
    let mut buf = Vec::new();
    write_items(&docs, &mut buf).unwrap();
    let mut cursor = buf.as_slice();
    let rows = read_items(0, &mut cursor).unwrap();
    assert!(rows.is_empty());
    assert_eq!(cursor.len(), 0);
}

#[test]
fn null_row_round_trips_to_empty_document() {
    let docs = vec![serde_json::Value::Null];
    assert_eq!(round_trip(&docs), vec![json!({})]);
}

#[test]
fn string_row_is_parsed_as_json_before_encoding() {
    let docs = vec![json!(r#"{"key": 42}"#)];
    assert_eq!(round_trip(&docs), vec![json!({"key": 42})]);
}

#[test]
fn bool_array_drops_nulls_on_round_trip() {
    let docs = vec![json!({"flags": [true, null, false]})];
    assert_eq!(round_trip(&docs), vec![json!({"flags": [true, false]})]);
}

#[test]
fn missing_path_in_some_rows_is_simply_absent() {
    let docs = vec![json!({"a": 1, "b": 2}), json!({"a": 3})];
    assert_eq!(round_trip(&docs), docs);
}

#[test]
fn tuple_with_json_element_preserves_its_sibling_primitives() {
    // Regression test: a Tuple(...) spec containing a JSON subspec must
    // still carry the real data for its Nullable(primitive) siblings, not
    // just their null-mask placeholder.
    let docs = vec![json!({
        "list": [123, "2", true, {"foo": "bar"}],
    })];
    assert_eq!(round_trip(&docs), docs);
}
