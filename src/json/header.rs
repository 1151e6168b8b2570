//! Reads/writes the paths header, the per-path specs header (including the
//! count-repeat quirk), and the recursive sub-headers for `JSON` embedded
//! within `Tuple(...)`/`Array(...)` specs.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::io::{
    read_fixed, read_string_u8_prefixed, read_u8, skip, write_string_u8_prefixed, write_u8, write_zeros,
};

use super::{PathMap, SpecBucket, SpecMap};

/// Result of reading the paths header: either the ordinary path list, or the
/// degenerate shared-paths branch (paths-count byte `0`).
pub(super) enum PathsHeader {
    Paths(Vec<String>),
    Shared(SharedPaths),
}

/// The path names declared by a shared-paths branch; their values are opaque
/// to this codec and are only consumed, never materialized.
pub(super) struct SharedPaths {
    names: Vec<String>,
}

pub(super) fn read_paths_header(buf: &mut dyn Read) -> Result<PathsHeader> {
    skip(buf, 9, "paths header reserved")?;
    let paths_count = read_u8(buf)?;
    if paths_count == 0 {
        return Ok(PathsHeader::Shared(read_shared_paths(buf)?));
    }
    let mut names = Vec::with_capacity(usize::from(paths_count));
    for _ in 0..paths_count {
        names.push(read_string_u8_prefixed(buf)?);
    }
    Ok(PathsHeader::Paths(names))
}

fn read_shared_paths(buf: &mut dyn Read) -> Result<SharedPaths> {
    let shared_count = read_u8(buf)?;
    skip(buf, 7, "shared paths reserved")?;
    let mut names = Vec::with_capacity(usize::from(shared_count));
    for _ in 0..shared_count {
        names.push(read_string_u8_prefixed(buf)?);
    }
    Ok(SharedPaths { names })
}

/// Consumes the opaque shared-values section following a shared-paths
/// header, logging the one user-visible diagnostic this codec emits.
pub(super) fn read_shared_values(shared: &SharedPaths, buf: &mut dyn Read) -> Result<()> {
    tracing::warn!(
        paths = ?shared.names,
        "clickhouse_json_block: shared-paths JSON branch encountered, returning an empty block"
    );
    for _ in &shared.names {
        let content_len = read_u8(buf)?;
        skip(buf, usize::from(content_len), "shared path content")?;
    }
    Ok(())
}

pub(super) fn read_specs_headers(paths: Vec<String>, buf: &mut dyn Read) -> Result<PathMap> {
    let mut path_map = PathMap::new();
    for path in paths {
        let spec_map = read_specs_header_for_path(buf)?;
        path_map.paths.insert(path, spec_map);
    }
    Ok(path_map)
}

fn read_specs_header_for_path(buf: &mut dyn Read) -> Result<SpecMap> {
    skip(buf, 8, "specs header reserved (pre)")?;
    let spec_count = read_u8(buf)?;
    let next = read_u8(buf)?;
    // Legacy quirk, preserved exactly: a byte equal to `spec_count` means
    // the server genuinely repeated the count, and all `spec_count` names
    // follow normally. Any other byte IS the first name's length prefix.
    // This collides when the first name's length happens to equal
    // `spec_count` (e.g. 5 specs whose first name is "Int64"); the source
    // has the same ambiguity and we mirror it rather than disambiguate.
    let mut names = Vec::with_capacity(usize::from(spec_count));
    let start = if next == spec_count {
        0
    } else {
        let bytes = read_fixed(buf, usize::from(next))?;
        names.push(String::from_utf8(bytes).map_err(|err| Error::MalformedHeader(err.to_string()))?);
        1
    };
    for _ in start..spec_count {
        names.push(read_string_u8_prefixed(buf)?);
    }
    skip(buf, 8, "specs header reserved (post)")?;

    let mut spec_map = SpecMap::default();
    for name in names {
        let mut bucket = SpecBucket::default();
        if name.starts_with("Tuple") && name.contains("JSON") {
            bucket.tuple_header = Some(read_tuple_header(&name, buf)?);
        } else if name.starts_with("Array") && name.contains("JSON") {
            bucket.array_header = Some(read_json_header(buf)?);
        }
        spec_map.specs.insert(name, bucket);
    }
    Ok(spec_map)
}

fn read_json_header(buf: &mut dyn Read) -> Result<PathMap> {
    match read_paths_header(buf)? {
        PathsHeader::Paths(paths) => read_specs_headers(paths, buf),
        PathsHeader::Shared(shared) => {
            read_shared_values(&shared, buf)?;
            Ok(PathMap::new())
        }
    }
}

fn read_tuple_header(spec: &str, buf: &mut dyn Read) -> Result<Vec<Option<PathMap>>> {
    let subspecs = split_tuple_subspecs(spec);
    let mut slots = Vec::with_capacity(subspecs.len());
    for subspec in subspecs {
        if subspec.starts_with("JSON") {
            slots.push(Some(read_json_header(buf)?));
        } else {
            slots.push(None);
        }
    }
    Ok(slots)
}

/// Splits the body of a `Tuple(...)` spec on the literal delimiter `"), "`.
/// This only works because every subspec the inference engine emits inside
/// a tuple is a parenthesized composite (`Nullable(...)`, `Array(...)`,
/// `Tuple(...)`, or `JSON(...)`); a bare primitive subspec never occurs.
/// The split consumes each non-final subspec's closing paren along with the
/// delimiter, so it's restored here to leave every piece independently
/// parseable.
#[must_use]
pub(super) fn split_tuple_subspecs(spec: &str) -> Vec<String> {
    let body = spec
        .strip_prefix("Tuple(")
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(spec);
    let parts: Vec<&str> = body.split("), ").collect();
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| if i == last { (*part).to_string() } else { format!("{part})") })
        .collect()
}

pub(super) fn write_paths_header(path_map: &PathMap, buf: &mut dyn Write) -> Result<()> {
    write_zeros(buf, 7)?;
    let count = u8::try_from(path_map.paths.len())
        .map_err(|_| Error::MalformedHeader("too many paths for one block (>255)".into()))?;
    write_u8(buf, count)?;
    for path in path_map.paths.keys() {
        write_string_u8_prefixed(buf, path)?;
    }
    Ok(())
}

pub(super) fn write_specs_header(path_map: &PathMap, buf: &mut dyn Write) -> Result<()> {
    for spec_map in path_map.paths.values() {
        write_u8(buf, 0x02)?;
        write_zeros(buf, 7)?;
        let count = u8::try_from(spec_map.specs.len())
            .map_err(|_| Error::MalformedHeader("too many specs for one path (>255)".into()))?;
        write_u8(buf, count)?;
        for spec in spec_map.specs.keys() {
            write_string_u8_prefixed(buf, spec)?;
        }
        write_zeros(buf, 8)?;
        for (spec, bucket) in &spec_map.specs {
            if spec.starts_with("Tuple") && spec.contains("JSON") {
                write_tuple_header(spec, bucket, buf)?;
            } else if spec.starts_with("Array") && spec.contains("JSON") {
                write_array_header(bucket, buf)?;
            }
        }
    }
    Ok(())
}

fn write_array_header(bucket: &SpecBucket, buf: &mut dyn Write) -> Result<()> {
    let header = bucket
        .array_header
        .as_ref()
        .ok_or_else(|| Error::MalformedHeader("missing array_header for Array(JSON) spec".into()))?;
    write_json_header(header, buf)
}

fn write_tuple_header(spec: &str, bucket: &SpecBucket, buf: &mut dyn Write) -> Result<()> {
    let subspecs = split_tuple_subspecs(spec);
    let slots = bucket
        .tuple_header
        .as_ref()
        .ok_or_else(|| Error::MalformedHeader("missing tuple_header for Tuple(JSON) spec".into()))?;
    for (subspec, slot) in subspecs.iter().zip(slots) {
        if subspec.starts_with("JSON") {
            let header = slot
                .as_ref()
                .ok_or_else(|| Error::MalformedHeader("missing nested header for JSON tuple slot".into()))?;
            write_json_header(header, buf)?;
        }
    }
    Ok(())
}

fn write_json_header(path_map: &PathMap, buf: &mut dyn Write) -> Result<()> {
    write_paths_header(path_map, buf)?;
    write_specs_header(path_map, buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_tuple_body_on_legacy_delimiter() {
        let subspecs = split_tuple_subspecs(
            "Tuple(Nullable(Int64), JSON(max_dynamic_types=16, max_dynamic_paths=256))",
        );
        assert_eq!(
            subspecs,
            vec!["Nullable(Int64)", "JSON(max_dynamic_types=16, max_dynamic_paths=256)"]
        );
    }

    #[test]
    fn round_trips_paths_header() {
        let mut path_map = PathMap::new();
        path_map.bucket_mut("profile.age", "Int64");
        path_map.bucket_mut("key", "String");
        let mut buf = Vec::new();
        write_paths_header(&path_map, &mut buf).unwrap();
        match read_paths_header(&mut buf.as_slice()).unwrap() {
            PathsHeader::Paths(paths) => assert_eq!(paths, vec!["key", "profile.age"]),
            PathsHeader::Shared(_) => panic!("expected ordinary paths branch"),
        }
    }
}
