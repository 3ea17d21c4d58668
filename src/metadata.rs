//! Metadata-block reader (spec §4.2).
//!
//! A metadata block is a 16-bit header followed by payload bytes: bit 15 of
//! the header flags "uncompressed", bits 0-14 are the on-disk payload
//! length. Decompressed payload is capped at 8 KiB.

use tracing::instrument;

use crate::compressor::Decompressor;
use crate::endian::read_u16;
use crate::error::Error;

pub const METADATA_MAX: usize = 8192;
const LEN_MASK: u16 = 0x7fff;
const UNCOMPRESSED_BIT: u16 = 0x8000;

/// Splits a metadata-block header into `(uncompressed, payload_len)`.
pub fn parse_header(header: u16) -> (bool, usize) {
    (header & UNCOMPRESSED_BIT != 0, (header & LEN_MASK) as usize)
}

/// Reads one metadata block starting at `buf[offset..]`.
///
/// Returns the decompressed (or copied, if stored uncompressed) payload and
/// the number of on-disk bytes consumed (2-byte header + payload).
#[instrument(skip(buf, decompressor))]
pub fn read_metadata_block(
    buf: &[u8],
    offset: usize,
    decompressor: &dyn Decompressor,
) -> Result<(Vec<u8>, usize), Error> {
    let header = read_u16(buf, offset)?;
    let (uncompressed, payload_len) = parse_header(header);

    if payload_len == 0 {
        return Err(Error::Corrupt("metadata block has zero payload length".into()));
    }
    if uncompressed && payload_len > METADATA_MAX {
        return Err(Error::Corrupt(format!(
            "uncompressed metadata payload {payload_len} exceeds {METADATA_MAX}"
        )));
    }

    let payload_start = offset + 2;
    let payload = buf.get(payload_start..payload_start + payload_len).ok_or_else(|| {
        Error::Corrupt(format!("metadata payload of {payload_len} bytes out of bounds"))
    })?;

    let mut out = Vec::with_capacity(METADATA_MAX);
    if uncompressed {
        out.extend_from_slice(payload);
    } else {
        decompressor.decompress(payload, &mut out)?;
        if out.len() > METADATA_MAX {
            return Err(Error::Corrupt("decompressed metadata block exceeds 8 KiB".into()));
        }
    }

    Ok((out, 2 + payload_len))
}
