//! Primitive byte-level I/O shared by the header, positions, and value codecs:
//! fixed-width reads/writes plus the `u8`- and `u32`-length-prefixed framing
//! the native block protocol's JSON sub-stream uses.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};

fn map_eof(err: io::Error, context: &'static str) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::TruncatedInput(context)
    } else {
        Error::Io(err)
    }
}

/// Reads exactly `buf.len()` bytes, mapping EOF to [`Error::TruncatedInput`].
pub fn read_exact<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8], context: &'static str) -> Result<()> {
    reader.read_exact(buf).map_err(|err| map_eof(err, context))
}

/// Reads and discards `n` bytes (reserved/zero framing).
pub fn skip(reader: &mut (impl Read + ?Sized), n: usize, context: &'static str) -> Result<()> {
    let mut buf = vec![0_u8; n];
    read_exact(reader, &mut buf, context)
}

/// Reads a single byte.
pub fn read_u8(reader: &mut (impl Read + ?Sized)) -> Result<u8> {
    let mut buf = [0_u8; 1];
    read_exact(reader, &mut buf, "u8")?;
    Ok(buf[0])
}

/// Reads a little-endian `u64`.
pub fn read_u64_le(reader: &mut (impl Read + ?Sized)) -> Result<u64> {
    Ok(u64::from_le_bytes(read_array(reader, "u64")?))
}

/// Reads exactly `N` raw bytes into a fixed-size array, for leaf encodings
/// that immediately hand the bytes to a `from_le_bytes` constructor.
pub fn read_array<R: Read + ?Sized, const N: usize>(reader: &mut R, context: &'static str) -> Result<[u8; N]> {
    let mut buf = [0_u8; N];
    read_exact(reader, &mut buf, context)?;
    Ok(buf)
}

/// Reads `n` raw bytes.
pub fn read_fixed(reader: &mut (impl Read + ?Sized), n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0_u8; n];
    read_exact(reader, &mut buf, "fixed bytes")?;
    Ok(buf)
}

/// Reads a one-byte-length-prefixed ASCII/UTF-8 string.
pub fn read_string_u8_prefixed(reader: &mut (impl Read + ?Sized)) -> Result<String> {
    let len = read_u8(reader)?;
    let bytes = read_fixed(reader, usize::from(len))?;
    String::from_utf8(bytes).map_err(|err| Error::MalformedHeader(err.to_string()))
}

/// Writes a single byte.
pub fn write_u8<W: Write + ?Sized>(writer: &mut W, value: u8) -> Result<()> {
    writer.write_all(&[value])?;
    Ok(())
}

/// Writes `n` zero bytes.
pub fn write_zeros<W: Write + ?Sized>(writer: &mut W, n: usize) -> Result<()> {
    writer.write_all(&vec![0_u8; n])?;
    Ok(())
}

/// Writes a little-endian `u64`.
pub fn write_u64_le<W: Write + ?Sized>(writer: &mut W, value: u64) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Writes a one-byte-length-prefixed ASCII/UTF-8 string.
///
/// # Errors
///
/// Returns [`Error::MalformedHeader`] when `value` is longer than 255 bytes.
pub fn write_string_u8_prefixed<W: Write + ?Sized>(writer: &mut W, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let len = u8::try_from(bytes.len())
        .map_err(|_| Error::MalformedHeader(format!("string too long to length-prefix: {value}")))?;
    write_u8(writer, len)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Reads a `u32`-length-prefixed byte string, used for `String` column
/// *data* (as opposed to the `u8`-length-prefixed path/spec names in
/// headers, which are bounded by the wire format itself).
pub fn read_bytes_u32_prefixed(reader: &mut (impl Read + ?Sized)) -> Result<Vec<u8>> {
    let mut len_buf = [0_u8; 4];
    read_exact(reader, &mut len_buf, "string data length")?;
    let len = u32::from_le_bytes(len_buf);
    read_fixed(reader, len as usize)
}

/// Writes a `u32`-length-prefixed byte string (see
/// [`read_bytes_u32_prefixed`]).
pub fn write_bytes_u32_prefixed<W: Write + ?Sized>(writer: &mut W, value: &[u8]) -> Result<()> {
    let len = u32::try_from(value.len())
        .map_err(|_| Error::MalformedHeader("string data too long".into()))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_string_and_u64() {
        let mut buf = Vec::new();
        write_string_u8_prefixed(&mut buf, "profile.age").unwrap();
        write_u64_le(&mut buf, 12345).unwrap();

        let mut cursor = buf.as_slice();
        assert_eq!(read_string_u8_prefixed(&mut cursor).unwrap(), "profile.age");
        assert_eq!(read_u64_le(&mut cursor).unwrap(), 12345);
    }

    #[test]
    fn truncated_read_is_reported_distinctly() {
        let mut cursor: &[u8] = &[1, 2];
        let err = read_fixed(&mut cursor, 5).unwrap_err();
        assert!(matches!(err, Error::TruncatedInput(_)));
    }

    #[test]
    fn rejects_strings_over_255_bytes() {
        let mut buf = Vec::new();
        let long = "a".repeat(256);
        let err = write_string_u8_prefixed(&mut buf, &long).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)));
    }
}
