use std::io::{ErrorKind, Read, Write};

use crate::foundation::error::{LedError, LedResult};

/// Upper bound on a single frame payload.
///
/// A length above this is treated as stream corruption rather than an
/// allocation request.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Size of the big-endian length prefix preceding every payload.
pub const HEADER_LEN: usize = 4;

pub fn encode_header(len: usize) -> LedResult<[u8; HEADER_LEN]> {
    let len = u32::try_from(len)
        .ok()
        .filter(|&n| n <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            LedError::protocol(format!(
                "frame of {len} bytes exceeds limit of {MAX_FRAME_LEN} bytes"
            ))
        })?;
    Ok(len.to_be_bytes())
}

pub fn decode_header(header: [u8; HEADER_LEN]) -> LedResult<usize> {
    let len = u32::from_be_bytes(header);
    if len > MAX_FRAME_LEN {
        return Err(LedError::protocol(format!(
            "declared frame length {len} exceeds limit of {MAX_FRAME_LEN} bytes"
        )));
    }
    Ok(len as usize)
}

/// Write one length-prefixed frame. The caller decides when to flush.
pub fn write_frame<W: Write + ?Sized>(w: &mut W, payload: &[u8]) -> LedResult<()> {
    let header = encode_header(payload.len())?;
    w.write_all(&header)?;
    w.write_all(payload)?;
    Ok(())
}

/// Read one frame.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary and
/// an `UnexpectedEof` I/O error when it ends inside a header or payload.
pub fn read_frame<R: Read + ?Sized>(r: &mut R) -> LedResult<Option<Vec<u8>>> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        match r.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "stream ended inside a frame header",
                )
                .into());
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }

    let len = decode_header(header)?;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(Some(payload))
}

#[cfg(test)]
#[path = "../../tests/unit/protocol/framing.rs"]
mod tests;
