//! Unaligned little-endian integer reads.
//!
//! Several on-disk arrays (the fragment index pointer table, the per-block
//! compressed-size tails of regular-file inodes, directory headers and
//! entries) have lengths that depend on runtime state `deku`'s ctx
//! propagation makes awkward to thread through, so they're read by hand.

use crate::error::Error;

fn slice_at(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], Error> {
    buf.get(offset..offset + len)
        .ok_or_else(|| Error::Corrupt(format!("read of {len} bytes at {offset} out of bounds")))
}

pub fn read_u16(buf: &[u8], offset: usize) -> Result<u16, Error> {
    Ok(u16::from_le_bytes(slice_at(buf, offset, 2)?.try_into().unwrap()))
}

pub fn read_i16(buf: &[u8], offset: usize) -> Result<i16, Error> {
    Ok(i16::from_le_bytes(slice_at(buf, offset, 2)?.try_into().unwrap()))
}

pub fn read_u32(buf: &[u8], offset: usize) -> Result<u32, Error> {
    Ok(u32::from_le_bytes(slice_at(buf, offset, 4)?.try_into().unwrap()))
}

pub fn read_u64(buf: &[u8], offset: usize) -> Result<u64, Error> {
    Ok(u64::from_le_bytes(slice_at(buf, offset, 8)?.try_into().unwrap()))
}
