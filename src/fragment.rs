//! Fragment index (spec §4.6).
//!
//! Laid out as a flat array of 64-bit pointers (one per fragment metadata
//! block), immediately followed by the metadata blocks themselves.

use deku::prelude::*;
use tracing::instrument;

use crate::compressor::Decompressor;
use crate::device::{BlockDevice, PartitionReader};
use crate::endian::read_u64;
use crate::error::Error;
use crate::metadata::read_metadata_block;

pub const FRAGMENT_SIZE: usize = 16;
const ENTRIES_PER_BLOCK: u32 = 512;

#[derive(Debug, Clone, Copy, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct FragmentEntry {
    pub start: u64,
    pub size: u32,
    pub unused: u32,
}

impl FragmentEntry {
    pub fn compressed(&self) -> bool {
        self.size & 0x0100_0000 == 0
    }

    pub fn on_disk_len(&self) -> u32 {
        self.size & 0x00ff_ffff
    }
}

/// Looks up fragment `k` per spec §4.6: `block = k/512`, `slot = k%512`,
/// read the pointer at `fragment_table_start + block*8`, decompress that
/// metadata block, index into it as 16-byte entries.
#[instrument(skip(device, decompressor))]
pub fn lookup_fragment<D: BlockDevice>(
    device: &mut D,
    partition_start: u64,
    decompressor: &dyn Decompressor,
    fragment_table_start: u64,
    frag_count: u32,
    k: u32,
) -> Result<FragmentEntry, Error> {
    if k >= frag_count {
        return Err(Error::Range(format!("fragment index {k} out of range ({frag_count} total)")));
    }

    let block = k / ENTRIES_PER_BLOCK;
    let slot = (k % ENTRIES_PER_BLOCK) as usize;

    let mut reader = PartitionReader::new(device, partition_start);
    let ptr_bytes = reader.read_at(fragment_table_start + block as u64 * 8, 8)?;
    let block_ptr = read_u64(&ptr_bytes, 0)?;

    let header_bytes = reader.read_at(block_ptr, 2)?;
    let header = crate::endian::read_u16(&header_bytes, 0)?;
    let (_, payload_len) = crate::metadata::parse_header(header);
    let block_bytes = reader.read_at(block_ptr, 2 + payload_len)?;
    let (payload, _) = read_metadata_block(&block_bytes, 0, decompressor)?;

    let entry_off = slot * FRAGMENT_SIZE;
    let entry_bytes = payload
        .get(entry_off..entry_off + FRAGMENT_SIZE)
        .ok_or_else(|| Error::Corrupt("fragment entry slot out of bounds".into()))?;
    let (_, entry) = FragmentEntry::from_bytes((entry_bytes, 0))?;
    Ok(entry)
}
