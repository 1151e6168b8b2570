//! The per-path positions byte stream: ties each row to the spec
//! alternative (or "missing") it used under a path, including the legacy
//! `skip` index adjustment.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::io::{read_u8, write_u8};

use super::SpecMap;

const MISSING: u8 = 255;

/// Counts the specs that do NOT start with `String` or `Tuple`; these two
/// prefixes are reserved a placeholder slot the server always carves out of
/// the index space, matched via the `skip` adjustment below.
fn skip_threshold(specs_sorted: &[&String]) -> usize {
    specs_sorted
        .iter()
        .filter(|s| !(s.starts_with("String") || s.starts_with("Tuple")))
        .count()
}

/// Reads `n_items` positions bytes for `spec_map`'s path and distributes
/// each row index into the matching spec's `positions`, per the `skip`
/// adjustment: a byte greater than `skip` indexes one spec earlier than its
/// raw value.
pub(super) fn read_positions(spec_map: &mut SpecMap, n_items: usize, buf: &mut dyn Read) -> Result<()> {
    let names: Vec<String> = spec_map.specs.keys().cloned().collect();
    let skip = skip_threshold(&names.iter().collect::<Vec<_>>());
    let mut per_spec_positions: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
    for row in 0..n_items {
        let b = read_u8(buf)?;
        if b == MISSING {
            continue;
        }
        let raw = usize::from(b);
        let idx = if raw > skip { raw - 1 } else { raw };
        let positions = per_spec_positions
            .get_mut(idx)
            .ok_or_else(|| Error::MalformedHeader(format!("positions byte {b} has no matching spec")))?;
        positions.push(row);
    }
    for (name, positions) in names.into_iter().zip(per_spec_positions) {
        spec_map.specs.get_mut(&name).expect("spec declared in header").positions = positions;
    }
    Ok(())
}

/// Writes the `n_items`-byte positions stream for `spec_map`'s path,
/// inserting the reserved `skip` gap so the byte value never collides with
/// a real spec index.
pub(super) fn write_positions(spec_map: &SpecMap, n_items: usize, buf: &mut dyn Write) -> Result<()> {
    let names: Vec<&String> = spec_map.specs.keys().collect();
    let skip = skip_threshold(&names);
    let mut out = vec![MISSING; n_items];
    let mut count = 0_usize;
    for (idx, name) in names.iter().enumerate() {
        if idx == skip {
            count += 1;
        }
        let b = u8::try_from(count)
            .map_err(|_| Error::MalformedHeader("too many specs for one path (>255)".into()))?;
        count += 1;
        for &pos in &spec_map.specs[*name].positions {
            out[pos] = b;
        }
    }
    buf.write_all(&out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_positions_with_skip_gap() {
        let mut spec_map = SpecMap::default();
        spec_map.specs.entry("Float64".to_string()).or_default().positions = vec![2];
        spec_map.specs.entry("Int64".to_string()).or_default().positions = vec![0];
        spec_map.specs.entry("String".to_string()).or_default().positions = vec![1];

        let mut buf = Vec::new();
        write_positions(&spec_map, 3, &mut buf).unwrap();
        assert_eq!(buf.len(), 3);

        let mut read_back = SpecMap::default();
        read_back.specs.entry("Float64".to_string()).or_default();
        read_back.specs.entry("Int64".to_string()).or_default();
        read_back.specs.entry("String".to_string()).or_default();
        read_positions(&mut read_back, 3, &mut buf.as_slice()).unwrap();

        assert_eq!(read_back.specs["Int64"].positions, vec![0]);
        assert_eq!(read_back.specs["String"].positions, vec![1]);
        assert_eq!(read_back.specs["Float64"].positions, vec![2]);
    }

    #[test]
    fn missing_byte_assigns_no_spec() {
        let mut spec_map = SpecMap::default();
        spec_map.specs.entry("Int64".to_string()).or_default();
        read_positions(&mut spec_map, 2, &mut [255_u8, 255_u8].as_slice()).unwrap();
        assert!(spec_map.specs["Int64"].positions.is_empty());
    }
}
