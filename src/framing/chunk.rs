//! One *chunk* is `<decimal length>\n<length bytes>\n`. Both the length
//! line and the trailing newline are mandatory: the trailing newline is a
//! sentinel for frame integrity, and its absence is treated as `EIO`
//! (surfaced here as [`std::io::ErrorKind::InvalidData`]).

use std::io::{self, ErrorKind, Read, Write};

/// Largest single chunk we will allocate for; guards against a runaway or
/// adversarial child inflating the length header.
const MAX_CHUNK_LEN: u64 = 256 * 1024 * 1024;

/// Writes one chunk: `<len>\n<bytes>\n`.
///
/// # Errors
/// Returns an error if the underlying writer fails.
pub fn write_chunk<W: Write>(w: &mut W, payload: &[u8]) -> io::Result<()> {
    write!(w, "{}\n", payload.len())?;
    w.write_all(payload)?;
    w.write_all(b"\n")?;
    w.flush()
}

/// Reads one chunk, validating the trailing newline sentinel.
///
/// # Errors
/// Returns `InvalidData` if the length line is not a valid decimal number,
/// if the chunk declares a length above [`MAX_CHUNK_LEN`], or if the
/// trailing byte is not `\n`. Returns `UnexpectedEof` on a short read,
/// which callers treat as a dead worker (§4.1 failure model).
pub fn read_chunk<R: Read>(r: &mut R) -> io::Result<Vec<u8>> {
    let len = read_decimal_line(r)?;
    if len > MAX_CHUNK_LEN {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("chunk length {len} exceeds maximum {MAX_CHUNK_LEN}"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    let mut sentinel = [0u8; 1];
    r.read_exact(&mut sentinel)?;
    if sentinel[0] != b'\n' {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            "missing frame-integrity sentinel newline",
        ));
    }
    Ok(buf)
}

fn read_decimal_line<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut digits = Vec::with_capacity(20);
    let mut byte = [0u8; 1];
    loop {
        r.read_exact(&mut byte)?;
        if byte[0] == b'\n' {
            break;
        }
        if !byte[0].is_ascii_digit() {
            return Err(io::Error::new(ErrorKind::InvalidData, "non-decimal chunk length"));
        }
        digits.push(byte[0]);
        if digits.len() > 19 {
            return Err(io::Error::new(ErrorKind::InvalidData, "chunk length line too long"));
        }
    }
    if digits.is_empty() {
        return Err(io::Error::new(ErrorKind::InvalidData, "empty chunk length line"));
    }
    std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidData, "malformed chunk length"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"hello").unwrap();
        assert_eq!(buf, b"5\nhello\n");
        let mut cur = Cursor::new(buf);
        let got = read_chunk(&mut cur).unwrap();
        assert_eq!(got, b"hello");
    }

    #[test]
    fn empty_chunk() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"").unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(read_chunk(&mut cur).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn missing_sentinel_is_eio_like() {
        let buf = b"5\nhello".to_vec();
        let mut cur = Cursor::new(buf);
        let err = read_chunk(&mut cur).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn corrupted_sentinel_is_invalid_data() {
        let buf = b"5\nhelloX".to_vec();
        let mut cur = Cursor::new(buf);
        let err = read_chunk(&mut cur).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn oversized_length_rejected() {
        let buf = b"99999999999999999999\n".to_vec();
        let mut cur = Cursor::new(buf);
        let err = read_chunk(&mut cur).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
