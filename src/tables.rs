//! Table loaders (spec §4.3) and the inode locator (spec §4.4).

use tracing::{instrument, trace};

use crate::compressor::Decompressor;
use crate::device::{BlockDevice, PartitionReader};
use crate::error::Error;
use crate::metadata::read_metadata_block;

/// A decompressed table (inode or directory table), plus for the directory
/// table the cumulative decompressed end-position of each metadata block
/// (`m_list` in spec §9) -- needed because the last block in the chain may
/// be shorter than 8 KiB, so `(index, offset)` can't assume a fixed stride.
pub struct Table {
    pub data: Vec<u8>,
    pub block_ends: Vec<usize>,
}

/// Loads and decompresses a metadata-block chain spanning `[start_off,
/// end_off)` of the underlying device into one contiguous buffer.
#[instrument(skip(device, decompressor))]
pub fn load_table<D: BlockDevice>(
    device: &mut D,
    partition_start: u64,
    decompressor: &dyn Decompressor,
    start_off: u64,
    end_off: u64,
) -> Result<Table, Error> {
    if end_off < start_off {
        return Err(Error::Corrupt("table span has negative length".into()));
    }
    let span = (end_off - start_off) as usize;
    // guard against a corrupt superblock requesting an unreasonable allocation
    if span > 1 << 30 {
        return Err(Error::NoMem(format!("table span of {span} bytes refused")));
    }

    let mut reader = PartitionReader::new(device, partition_start);
    let raw = reader.read_at(start_off, span)?;

    let mut data = Vec::new();
    let mut block_ends = Vec::new();
    let mut consumed = 0usize;
    while consumed < span {
        let (payload, used) = read_metadata_block(&raw, consumed, decompressor)?;
        trace!(consumed, used, decompressed = payload.len(), "loaded metadata block");
        data.extend_from_slice(&payload);
        consumed += used;
        block_ends.push(data.len());
        if consumed > span {
            return Err(Error::Corrupt("metadata block chain overran table span".into()));
        }
    }

    Ok(Table { data, block_ends })
}

/// Inode locator (spec §4.4): `index * 8192 + offset` into the decompressed
/// inode table.
pub fn inode_at(table: &[u8], index: u32, offset: u16) -> Result<&[u8], Error> {
    let byte_index = index as usize * crate::metadata::METADATA_MAX + offset as usize;
    table.get(byte_index..).ok_or_else(|| {
        Error::Corrupt(format!("inode reference ({index}, {offset}) out of bounds"))
    })
}

impl Table {
    /// Translates a directory's `(index, offset)` metadata-block reference
    /// into a byte position in the decompressed directory table, per spec
    /// §4.5 step 2: walk `block_ends` until the block containing `index` is
    /// found, then add `offset`.
    pub fn dir_byte_pos(&self, index: u32, offset: u16) -> Result<usize, Error> {
        let block_start = if index == 0 {
            0
        } else {
            *self
                .block_ends
                .get(index as usize - 1)
                .ok_or_else(|| Error::Corrupt("directory block index out of range".into()))?
        };
        let pos = block_start + offset as usize;
        if pos > self.data.len() {
            return Err(Error::Corrupt("directory byte position out of bounds".into()));
        }
        Ok(pos)
    }
}
