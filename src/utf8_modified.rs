//! Modified-UTF-8 codec
//!
//! A 16-bit big-endian length prefix followed by raw UTF-8 bytes. This is
//! the string encoding AMF0 uses; the AMF3 core exposes it as a pair of
//! pure functions because the surrounding AMF0 layer (out of scope here)
//! reuses it verbatim.

use crate::bytestream::ByteStream;
use crate::error::{AmfError, Result};

/// Maximum byte length encodable in the 16-bit length prefix.
pub const MAX_LEN: usize = u16::MAX as usize;

/// Encode `s` as a length-prefixed modified-UTF-8 byte string.
pub fn encode(s: &str) -> Result<Vec<u8>> {
    if s.len() > MAX_LEN {
        return Err(AmfError::ValueOutOfRange(format!(
            "string of {} bytes exceeds modified-UTF-8 limit of {MAX_LEN}",
            s.len()
        )));
    }

    let mut stream = ByteStream::new();
    stream.write_u16(s.len() as u16);
    stream.write_bytes(s.as_bytes());
    Ok(stream.into_vec())
}

/// Decode a length-prefixed modified-UTF-8 byte string from `stream`.
pub fn decode(stream: &mut ByteStream) -> Result<String> {
    let len = stream.read_u16()? as usize;
    let bytes = stream.read_bytes(len)?;
    String::from_utf8(bytes).map_err(|e| AmfError::Decode(format!("invalid UTF-8: {e}")))
}
