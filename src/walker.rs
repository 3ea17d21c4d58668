//! Directory walker (spec §4.5) and the directory-stream state machine
//! backing `opendir`/`readdir`/`closedir` (spec §4.8).

use std::collections::VecDeque;

use tracing::{instrument, trace};

use crate::compressor::Decompressor;
use crate::device::BlockDevice;
use crate::dir::{DirEntry, DirHeader, DIR_HEADER_SIZE, EMPTY_DIR_SIZE};
use crate::error::Error;
use crate::inode::{Inode, InodeInner};
use crate::path::{join_symlink, tokenize};
use crate::superblock::SuperBlock;
use crate::tables::{inode_at, Table};

const MAX_SYMLINK_DEPTH: u32 = 40;

/// `(metadata-block index, in-block offset, on-disk directory size)` for a
/// directory inode, per spec §3/§4.5.
fn dir_ref_of(inode: &Inode) -> Result<(u32, u16, u32), Error> {
    match &inode.inner {
        InodeInner::BasicDirectory(d) => Ok((d.block_index, d.block_offset, d.file_size as u32)),
        InodeInner::ExtendedDirectory(d) => Ok((d.block_index, d.block_offset, d.file_size)),
        _ => Err(Error::NotDir("inode is not a directory".into())),
    }
}

pub(crate) fn symlink_target(inode: &Inode) -> Result<String, Error> {
    let bytes = match &inode.inner {
        InodeInner::BasicSymlink(s) => &s.target,
        InodeInner::ExtendedSymlink(s) => &s.target,
        _ => return Err(Error::Corrupt("inode is not a symlink".into())),
    };
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Linear scan of one directory's entries for a name match, per spec §4.5
/// steps 3-5. Returns the owning header (for `start`/`inode_num`) and the
/// matched entry, or `None` if no entry's name equals `name`.
pub(crate) fn find_entry(
    data: &[u8],
    start_pos: usize,
    file_size: u32,
    name: &str,
) -> Result<Option<(DirHeader, DirEntry)>, Error> {
    if file_size as u16 == EMPTY_DIR_SIZE {
        return Ok(None);
    }

    let end = start_pos + file_size as usize;
    let mut pos = start_pos;
    while pos < end {
        let header = DirHeader::parse(data, pos)?;
        pos += DIR_HEADER_SIZE;
        let mut entries_left = header.count + 1;
        while entries_left > 0 {
            let (entry, used) = DirEntry::parse(data, pos)?;
            pos += used;
            entries_left -= 1;
            if entry.name_str() == name {
                return Ok(Some((header, entry)));
            }
        }
    }
    Ok(None)
}

/// Resolves `tokens` against `root`, following symlinks iteratively with an
/// explicit depth cap (spec §9 Design Notes; SPEC_FULL §9 item 3).
#[instrument(skip(device, decompressor, sb, inode_table, dir_table, root))]
pub fn resolve_path<D: BlockDevice>(
    _device: &mut D,
    _partition_start: u64,
    _decompressor: &dyn Decompressor,
    sb: &SuperBlock,
    inode_table: &[u8],
    dir_table: &Table,
    root: &Inode,
    tokens: Vec<String>,
) -> Result<Inode, Error> {
    let mut queue: VecDeque<String> = tokens.into();
    let mut consumed: Vec<String> = Vec::new();
    let mut current = root.clone();
    let mut depth = 0u32;

    loop {
        let Some(token) = queue.pop_front() else {
            return Ok(current);
        };

        if !current.is_dir() {
            return Err(Error::NotDir(token));
        }

        let (index, offset, file_size) = dir_ref_of(&current)?;
        let pos = dir_table.dir_byte_pos(index, offset)?;

        match find_entry(&dir_table.data, pos, file_size, &token)? {
            None => return Err(Error::NotFound(token)),
            Some((header, entry)) => {
                let child_bytes = inode_at(inode_table, header.start, entry.offset)?;
                let child = Inode::parse(child_bytes, sb.block_size)?;

                if entry.is_symlink() {
                    depth += 1;
                    if depth > MAX_SYMLINK_DEPTH {
                        return Err(Error::Loop);
                    }
                    let target = symlink_target(&child)?;
                    trace!(%token, %target, depth, "following symlink");
                    let remaining: Vec<String> = queue.into_iter().collect();
                    let new_tokens = join_symlink(&consumed, &target, &remaining);
                    queue = new_tokens.into();
                    consumed.clear();
                    current = root.clone();
                    continue;
                }

                if !entry.is_dir() && !queue.is_empty() {
                    return Err(Error::NotDir(token));
                }

                consumed.push(token);
                current = child;
            },
        }
    }
}

/// Convenience wrapper combining `tokenize` with `resolve_path`.
pub fn resolve<D: BlockDevice>(
    device: &mut D,
    partition_start: u64,
    decompressor: &dyn Decompressor,
    sb: &SuperBlock,
    inode_table: &[u8],
    dir_table: &Table,
    root: &Inode,
    path: &str,
) -> Result<Inode, Error> {
    resolve_path(
        device,
        partition_start,
        decompressor,
        sb,
        inode_table,
        dir_table,
        root,
        tokenize(path),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Fresh,
    Iterating,
    Exhausted,
    Closed,
}

/// A cursor over one directory's entries, state-machined per spec §4.8:
/// `Fresh -> Iterating -> Exhausted -> Closed`.
pub struct DirStream {
    state: StreamState,
    pos: usize,
    end: usize,
    header: Option<DirHeader>,
    entries_left: u32,
}

impl DirStream {
    pub fn open(start_pos: usize, file_size: u32) -> Self {
        if file_size as u16 == EMPTY_DIR_SIZE {
            return Self { state: StreamState::Exhausted, pos: start_pos, end: start_pos, header: None, entries_left: 0 };
        }
        Self {
            state: StreamState::Fresh,
            pos: start_pos,
            end: start_pos + file_size as usize,
            header: None,
            entries_left: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn close(&mut self) {
        self.state = StreamState::Closed;
    }

    /// Advances the cursor and returns the next entry's `(absolute inode
    /// number, owning header's metadata-block index, entry)`, or `None` at
    /// end-of-stream. The block index is exposed alongside the entry's
    /// in-block `offset` because both are needed to locate the child inode
    /// via `tables::inode_at`. Matches spec §4.8: every state accepts
    /// `close`; reads after `Exhausted` return end-of-stream.
    pub fn next(&mut self, data: &[u8]) -> Result<Option<(u32, u32, DirEntry)>, Error> {
        if matches!(self.state, StreamState::Exhausted | StreamState::Closed) {
            return Ok(None);
        }

        if self.header.is_none() || self.entries_left == 0 {
            if self.pos >= self.end {
                self.state = StreamState::Exhausted;
                return Ok(None);
            }
            let header = DirHeader::parse(data, self.pos)?;
            self.pos += DIR_HEADER_SIZE;
            self.entries_left = header.count + 1;
            self.header = Some(header);
            self.state = StreamState::Iterating;
        }

        let header = self.header.expect("header set above");
        let (entry, used) = DirEntry::parse(data, self.pos)?;
        self.pos += used;
        self.entries_left -= 1;

        let inode_number = (header.inode_num as i64 + entry.inode_offset as i64) as u32;

        if self.pos >= self.end && self.entries_left == 0 {
            self.state = StreamState::Exhausted;
        }

        Ok(Some((inode_number, header.start, entry)))
    }
}
