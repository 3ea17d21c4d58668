//! Superblock: fixed-size header at image offset 0 (spec §3, §6).

use deku::prelude::*;

use crate::compressor::Compressor;
use crate::error::Error;

pub const MAGIC: u32 = 0x7371_7368;

/// Flags bitfield, unpacked into named booleans for readability at call
/// sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlockFlags {
    pub inodes_uncompressed: bool,
    pub data_block_uncompressed: bool,
    pub fragments_uncompressed: bool,
    pub fragments_unused: bool,
    pub no_fragments: bool,
    pub always_fragments: bool,
    pub duplicates_removed: bool,
    pub exportable: bool,
    pub xattrs_uncompressed: bool,
    pub no_xattrs: bool,
    pub compressor_options: bool,
    pub id_table_uncompressed: bool,
}

impl SuperBlockFlags {
    fn from_bits(bits: u16) -> Self {
        Self {
            inodes_uncompressed: bits & 0x0001 != 0,
            data_block_uncompressed: bits & 0x0002 != 0,
            fragments_uncompressed: bits & 0x0008 != 0,
            fragments_unused: bits & 0x0010 != 0,
            no_fragments: bits & 0x0020 != 0,
            always_fragments: bits & 0x0040 != 0,
            duplicates_removed: bits & 0x0080 != 0,
            exportable: bits & 0x0100 != 0,
            xattrs_uncompressed: bits & 0x0200 != 0,
            no_xattrs: bits & 0x0400 != 0,
            compressor_options: bits & 0x0800 != 0,
            id_table_uncompressed: bits & 0x1000 != 0,
        }
    }
}

/// The fixed-size SquashFS superblock, ≥ 4.0, little-endian throughout.
#[derive(Debug, Clone, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct SuperBlock {
    pub magic: u32,
    pub inode_count: u32,
    pub mod_time: u32,
    pub block_size: u32,
    pub frag_count: u32,
    pub compressor: Compressor,
    pub block_log: u16,
    pub flags: u16,
    pub id_count: u16,
    pub version_major: u16,
    pub version_minor: u16,
    pub root_inode: u64,
    pub bytes_used: u64,
    pub id_table_start: u64,
    pub xattr_table_start: u64,
    pub inode_table_start: u64,
    pub dir_table_start: u64,
    pub frag_table_start: u64,
    pub export_table_start: u64,
}

impl SuperBlock {
    pub fn flags(&self) -> SuperBlockFlags {
        SuperBlockFlags::from_bits(self.flags)
    }

    /// Splits a packed 64-bit inode reference into `(metadata block index,
    /// in-block offset)`, per spec §3.
    pub fn split_inode_ref(inode_ref: u64) -> (u32, u16) {
        let index = (inode_ref >> 16) as u32;
        let offset = (inode_ref & 0xffff) as u16;
        (index, offset)
    }

    /// Validates invariant 1 from spec §8: magic matches and the five table
    /// offsets are strictly monotonically increasing up to `bytes_used`.
    pub fn validate(&self) -> Result<(), Error> {
        if self.magic != MAGIC {
            return Err(Error::Corrupt(format!(
                "bad magic: {:#x}, expected {:#x}",
                self.magic, MAGIC
            )));
        }
        if self.version_major != 4 {
            return Err(Error::Corrupt(format!(
                "unsupported version {}.{}",
                self.version_major, self.version_minor
            )));
        }
        if !self.block_size.is_power_of_two() {
            return Err(Error::Corrupt(format!(
                "block_size {} is not a power of two",
                self.block_size
            )));
        }
        if 1u32 << self.block_log != self.block_size {
            return Err(Error::Corrupt("block_log does not match block_size".into()));
        }

        // spec invariant 1: inode < directory < fragment <= export <= id <= image_end
        if !(self.inode_table_start < self.dir_table_start
            && self.dir_table_start < self.frag_table_start
            && self.frag_table_start <= self.export_table_start
            && self.export_table_start <= self.id_table_start
            && self.id_table_start <= self.bytes_used)
        {
            return Err(Error::Corrupt(
                "table offsets are not monotonically increasing".into(),
            ));
        }

        Ok(())
    }
}
