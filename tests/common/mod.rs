//! Byte-level SquashFS image builder shared by the integration tests.
//!
//! No real `mksquashfs` is invoked; every image is assembled by hand,
//! metadata block by metadata block, the same way `backhand`'s own
//! `entry.rs` unit tests hand-build buffers and assert on parsed structure.
//! Every table here fits in a single metadata block (index 0) -- the
//! multi-block `m_list` addressing is exercised by unit tests in
//! `src/tables.rs`'s own module instead.

use deku::prelude::*;
use sqfs_core::{Compressor, MemDevice, SuperBlock};

pub const SQFS_BLOCK_SIZE: u32 = 128;
pub const UNCOMPRESSED_BIT: u32 = 0x0100_0000;
pub const NO_FRAGMENT: u32 = 0xffff_ffff;
/// Sentinel `file_size` marking an empty directory (spec §4.3).
pub const EMPTY_DIR_FILE_SIZE: u16 = 3;

/// Superblock size; every `ImageBuilder::data` byte offset the caller bakes
/// into a file inode or fragment entry must be shifted by this much, since
/// `build()` places the superblock ahead of the data section on disk.
pub const SB_SIZE: usize = 96;

pub const INODE_DIR: u16 = 1;
pub const INODE_FILE: u16 = 2;
pub const INODE_SYMLINK: u16 = 3;

pub const ENTRY_DIR: u16 = 1;
pub const ENTRY_FILE: u16 = 2;
pub const ENTRY_SYMLINK: u16 = 3;

/// A 14-byte inode header: `{permissions, uid_idx, gid_idx, mtime, inode_number}`.
pub fn inode_header(inode_number: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(14);
    out.extend_from_slice(&0u16.to_le_bytes()); // permissions
    out.extend_from_slice(&0u16.to_le_bytes()); // uid_idx
    out.extend_from_slice(&0u16.to_le_bytes()); // gid_idx
    out.extend_from_slice(&0u32.to_le_bytes()); // mtime
    out.extend_from_slice(&inode_number.to_le_bytes());
    out
}

/// A basic-directory inode: tag + header + `{block_index, link_count,
/// file_size, block_offset, parent_inode}`.
pub fn basic_dir_inode(
    inode_number: u32,
    block_index: u32,
    block_offset: u16,
    file_size: u16,
    parent_inode: u32,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&INODE_DIR.to_le_bytes());
    out.extend_from_slice(&inode_header(inode_number));
    out.extend_from_slice(&block_index.to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes()); // link_count
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(&block_offset.to_le_bytes());
    out.extend_from_slice(&parent_inode.to_le_bytes());
    out
}

/// A basic regular-file inode: tag + header + `{blocks_start, frag_index,
/// block_offset, file_size}` + the per-block compressed-size tail.
/// `in_fragment_offset` doubles as both `block_offset` and the sentinel
/// slot, per spec §8's fragment-sentinel rule.
pub fn basic_file_inode(
    inode_number: u32,
    blocks_start: u32,
    frag_index: u32,
    in_fragment_offset: u32,
    file_size: u32,
    block_sizes: &[u32],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&INODE_FILE.to_le_bytes());
    out.extend_from_slice(&inode_header(inode_number));
    out.extend_from_slice(&blocks_start.to_le_bytes());
    out.extend_from_slice(&frag_index.to_le_bytes());
    out.extend_from_slice(&in_fragment_offset.to_le_bytes());
    out.extend_from_slice(&file_size.to_le_bytes());
    for s in block_sizes {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// A basic-symlink inode: tag + header + `{link_count, target_size}` + the
/// raw target bytes.
pub fn basic_symlink_inode(inode_number: u32, target: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&INODE_SYMLINK.to_le_bytes());
    out.extend_from_slice(&inode_header(inode_number));
    out.extend_from_slice(&1u32.to_le_bytes()); // link_count
    out.extend_from_slice(&(target.len() as u32).to_le_bytes());
    out.extend_from_slice(target);
    out
}

/// A directory header: `{count - 1, metadata-block index of entries'
/// inodes, base inode number}`.
pub fn dir_header(entry_count: u32, inode_block_index: u32, base_inode_num: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(entry_count - 1).to_le_bytes());
    out.extend_from_slice(&inode_block_index.to_le_bytes());
    out.extend_from_slice(&base_inode_num.to_le_bytes());
    out
}

/// A directory entry: `{inode-table offset, relative inode_offset, type,
/// name_size (len - 1), name}`.
pub fn dir_entry(inode_table_offset: u16, inode_offset: i16, type_: u16, name: &[u8]) -> Vec<u8> {
    assert!(!name.is_empty());
    let mut out = Vec::new();
    out.extend_from_slice(&inode_table_offset.to_le_bytes());
    out.extend_from_slice(&inode_offset.to_le_bytes());
    out.extend_from_slice(&type_.to_le_bytes());
    out.extend_from_slice(&((name.len() - 1) as u16).to_le_bytes());
    out.extend_from_slice(name);
    out
}

/// Wraps `payload` in a single metadata block, stored uncompressed (header
/// bit 15 set), per spec §4.2.
pub fn metadata_block(payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= 0x7fff);
    let header: u16 = 0x8000 | payload.len() as u16;
    let mut out = Vec::with_capacity(2 + payload.len());
    out.extend_from_slice(&header.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Assembles a full device image around caller-supplied `inode_table` and
/// `dir_table` payloads (each wrapped into exactly one metadata block,
/// keeping every `(index, offset)` reference in these tests `index == 0`),
/// a `data` section holding every file's raw content at whatever offsets
/// the caller already baked into its file inodes, and an optional
/// already-framed fragment-index region.
pub struct ImageBuilder {
    pub data: Vec<u8>,
    pub inode_table: Vec<u8>,
    pub dir_table: Vec<u8>,
    pub root_inode_ref: u64,
    pub frag_region: Vec<u8>,
    pub frag_count: u32,
}

impl ImageBuilder {
    pub fn new(root_inode_ref: u64) -> Self {
        Self {
            data: Vec::new(),
            inode_table: Vec::new(),
            dir_table: Vec::new(),
            root_inode_ref,
            frag_region: Vec::new(),
            frag_count: 0,
        }
    }

    /// Pre-builds a one-block fragment index: a single 8-byte pointer
    /// followed immediately by the metadata block it points to (spec §4.6).
    pub fn with_one_fragment_block(mut self, fragment_entries: &[u8]) -> Self {
        self.frag_region = metadata_block(fragment_entries);
        self.frag_count = fragment_entries.len() as u32 / 16;
        self
    }

    /// Lays out `[superblock][data][inode table][dir table][fragment
    /// region]` and returns the finished device image plus a ready-to-use
    /// `MemDevice` (block size 1, so `PartitionReader`'s block math is
    /// trivially byte-addressed).
    pub fn build(self) -> MemDevice {
        let mut disk = vec![0u8; SB_SIZE];
        disk.extend_from_slice(&self.data);

        let inode_table_start = disk.len() as u64;
        disk.extend_from_slice(&metadata_block(&self.inode_table));

        let dir_table_start = disk.len() as u64;
        disk.extend_from_slice(&metadata_block(&self.dir_table));

        let frag_table_start = disk.len() as u64;
        if !self.frag_region.is_empty() {
            // pointer array: one u64 pointing at the metadata block right after it
            let block_ptr = frag_table_start + 8;
            disk.extend_from_slice(&block_ptr.to_le_bytes());
            disk.extend_from_slice(&self.frag_region);
        }

        let end = disk.len() as u64;

        let sb = SuperBlock {
            magic: 0x7371_7368,
            inode_count: 0,
            mod_time: 0,
            block_size: SQFS_BLOCK_SIZE,
            frag_count: self.frag_count,
            compressor: Compressor::None,
            block_log: SQFS_BLOCK_SIZE.trailing_zeros() as u16,
            flags: 0,
            id_count: 0,
            version_major: 4,
            version_minor: 0,
            root_inode: self.root_inode_ref,
            bytes_used: end,
            id_table_start: end,
            xattr_table_start: 0,
            inode_table_start,
            dir_table_start,
            frag_table_start: if self.frag_region.is_empty() { end } else { frag_table_start },
            export_table_start: end,
        };
        let sb_bytes = sb.to_bytes().expect("superblock encodes");
        disk[..sb_bytes.len()].copy_from_slice(&sb_bytes);

        MemDevice::new(disk, 1)
    }
}
