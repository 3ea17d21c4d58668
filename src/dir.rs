//! Directory headers and entries (spec §3, §4.5).
//!
//! A directory may contain multiple headers, each followed by a run of
//! entries; this module parses one header or one entry at a time so the
//! walker can stream through a directory's bytes header by header.

use crate::endian::{read_i16, read_u16, read_u32};
use crate::error::Error;

pub const EMPTY_DIR_SIZE: u16 = 3;

/// `{count, start, inode_num}`: a run of `count + 1` entries sharing
/// `start` (metadata-block index) and `inode_num` (base inode number).
#[derive(Debug, Clone, Copy)]
pub struct DirHeader {
    pub count: u32,
    pub start: u32,
    pub inode_num: u32,
}

pub const DIR_HEADER_SIZE: usize = 12;

impl DirHeader {
    pub fn parse(buf: &[u8], offset: usize) -> Result<Self, Error> {
        Ok(Self {
            count: read_u32(buf, offset)?,
            start: read_u32(buf, offset + 4)?,
            inode_num: read_u32(buf, offset + 8)?,
        })
    }
}

/// `{offset, inode_offset, type_, name_size, name}`. On-disk size is
/// `8 + name_size + 1`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub offset: u16,
    pub inode_offset: i16,
    pub type_: u16,
    pub name: Vec<u8>,
}

impl DirEntry {
    /// Parses one entry at `buf[offset..]`, returning it and the number of
    /// on-disk bytes consumed.
    pub fn parse(buf: &[u8], offset: usize) -> Result<(Self, usize), Error> {
        let entry_offset = read_u16(buf, offset)?;
        let inode_offset = read_i16(buf, offset + 2)?;
        let type_ = read_u16(buf, offset + 4)?;
        let name_size = read_u16(buf, offset + 6)?;
        let name_len = name_size as usize + 1;
        let name = buf
            .get(offset + 8..offset + 8 + name_len)
            .ok_or_else(|| Error::Corrupt("directory entry name out of bounds".into()))?
            .to_vec();
        Ok((
            Self { offset: entry_offset, inode_offset, type_, name },
            8 + name_len,
        ))
    }

    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// The directory-entry type tags (a shrunk view of `InodeId`: 1=dir,
    /// 2=file, 3=symlink, 4..=other).
    pub fn is_dir(&self) -> bool {
        self.type_ == 1
    }

    pub fn is_file(&self) -> bool {
        self.type_ == 2
    }

    pub fn is_symlink(&self) -> bool {
        self.type_ == 3
    }
}
