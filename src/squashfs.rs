//! Public facade (spec §4.8): `probe`, `opendir`, `readdir`, `closedir`,
//! `read`, `size`, `close`, plus the reader-context state machine
//! (`Unmounted -> Mounted`, spec §4.8 State machines).
//!
//! `Squashfs::probe` only returns a value on success, so the `Mounted` state
//! is represented by the existence of a live `Squashfs`; a failed `probe`
//! never produces one, matching the spec's "reverts to Unmounted and
//! releases the superblock" rule for free. `close` is `Squashfs::close`,
//! which consumes `self`.

use deku::prelude::*;
use tracing::{debug, instrument, trace};

use crate::compressor::{self, Decompressor};
use crate::device::{BlockDevice, PartitionReader};
use crate::dir::DirEntry;
use crate::error::Error;
use crate::file::{file_size, read_file};
use crate::inode::{Inode, InodeInner};
use crate::path::split_parent;
use crate::superblock::SuperBlock;
use crate::tables::{inode_at, load_table, Table};
use crate::walker::{find_entry, resolve, symlink_target, DirStream};

/// Entry kind surfaced to the host dispatcher (spec §6): `{DIR, REG, LNK, OTHER}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    Reg,
    Lnk,
    Other,
}

impl EntryKind {
    fn from_tag(tag: u16) -> Self {
        match tag {
            1 => Self::Dir,
            2 => Self::Reg,
            3 => Self::Lnk,
            _ => Self::Other,
        }
    }
}

/// One directory entry surfaced to the host, per spec §6:
/// `{name (null-terminated), type, size (for REG only)}`.
#[derive(Debug, Clone)]
pub struct Dirent {
    pub name: String,
    pub kind: EntryKind,
    /// Populated only when `kind == EntryKind::Reg`, per spec §6.
    pub size: Option<u64>,
}

/// A directory stream returned by `opendir`. Per spec §3 ownership, it owns
/// a private, decompressed copy of the inode and directory tables -- no
/// stream aliases another's buffers, and they are freed at `closedir`
/// (here: at `Drop`).
pub struct Dir {
    stream: DirStream,
    inode_table: Vec<u8>,
    dir_table: Table,
    block_size: u32,
}

impl Dir {
    /// `closedir`: every state accepts this transition (spec §4.8).
    pub fn closedir(mut self) {
        self.stream.close();
    }
}

/// Process-wide reader context (spec §4.8, §5): exactly one per mounted
/// image; concurrent `probe`s on the same context are undefined, matching
/// the spec's single-threaded, non-reentrant model.
pub struct Squashfs<D: BlockDevice> {
    device: D,
    partition_start: u64,
    superblock: SuperBlock,
    decompressor: Box<dyn Decompressor>,
    root_inode: Inode,
}

impl<D: BlockDevice> Squashfs<D> {
    /// `probe`: validates the magic and table layout, initializes the
    /// decompressor, and resolves the root inode. On any failure the
    /// partially-built state is simply dropped -- nothing is retained,
    /// matching "on failure it reverts to Unmounted and releases the
    /// superblock" (spec §4.8).
    #[instrument(skip(device))]
    pub fn probe(mut device: D, partition_start: u64) -> Result<Self, Error> {
        let sb_bytes = {
            let mut reader = PartitionReader::new(&mut device, partition_start);
            reader.read_at(0, 96)?
        };
        let (_, superblock) = SuperBlock::from_bytes((&sb_bytes, 0))?;
        superblock.validate()?;

        let decompressor = compressor::for_id(superblock.compressor)?;

        let (index, offset) = SuperBlock::split_inode_ref(superblock.root_inode);
        let root_inode = {
            let inode_table = load_table(
                &mut device,
                partition_start,
                decompressor.as_ref(),
                superblock.inode_table_start,
                superblock.dir_table_start,
            )?;
            let buf = inode_at(&inode_table.data, index, offset)?;
            Inode::parse(buf, superblock.block_size)?
        };
        if !root_inode.is_dir() {
            return Err(Error::Corrupt("root inode is not a directory".into()));
        }

        debug!(compressor = ?superblock.compressor, block_size = superblock.block_size, "mounted squashfs image");
        Ok(Self { device, partition_start, superblock, decompressor, root_inode })
    }

    /// `close`: `Mounted -> Unmounted`. Consuming `self` releases the device
    /// handle, superblock, and decompressor together.
    pub fn close(self) {}

    /// Loads a fresh, call-scoped copy of the inode and directory tables
    /// (spec §9 Design Notes: table ownership resolved as "centralize per
    /// operation", see DESIGN.md). No table is cached across calls, matching
    /// the spec's "no caching across reads" non-goal.
    fn load_tables(&mut self) -> Result<(Vec<u8>, Table), Error> {
        let inode_table = load_table(
            &mut self.device,
            self.partition_start,
            self.decompressor.as_ref(),
            self.superblock.inode_table_start,
            self.superblock.dir_table_start,
        )?;
        let dir_table = load_table(
            &mut self.device,
            self.partition_start,
            self.decompressor.as_ref(),
            self.superblock.dir_table_start,
            self.superblock.frag_table_start,
        )?;
        Ok((inode_table.data, dir_table))
    }

    fn dir_ref(inode: &Inode) -> Result<(u32, u16, u32), Error> {
        match &inode.inner {
            InodeInner::BasicDirectory(d) => Ok((d.block_index, d.block_offset, d.file_size as u32)),
            InodeInner::ExtendedDirectory(d) => Ok((d.block_index, d.block_offset, d.file_size)),
            _ => Err(Error::NotDir("inode is not a directory".into())),
        }
    }

    /// `opendir`: resolves `path` (through any symlinks) to a directory
    /// inode and positions a fresh [`Dir`] stream at its first header.
    #[instrument(skip(self))]
    pub fn opendir(&mut self, path: &str) -> Result<Dir, Error> {
        let (inode_table, dir_table) = self.load_tables()?;
        let inode = resolve(
            &mut self.device,
            self.partition_start,
            self.decompressor.as_ref(),
            &self.superblock,
            &inode_table,
            &dir_table,
            &self.root_inode,
            path,
        )?;
        let (index, offset, file_size) = Self::dir_ref(&inode)?;
        let pos = dir_table.dir_byte_pos(index, offset)?;
        trace!(path, pos, file_size, "opened directory");
        Ok(Dir {
            stream: DirStream::open(pos, file_size),
            inode_table,
            dir_table,
            block_size: self.superblock.block_size,
        })
    }

    /// `readdir`: advances `dir`'s cursor and yields one entry, or `None` at
    /// end-of-stream (spec §4.5: "the walker is also the iterator backing
    /// `readdir`"). A `REG` entry's size is resolved by a direct lookup of
    /// its child inode; `DIR`/`LNK`/`OTHER` entries carry no size (spec §6).
    #[instrument(skip(self, dir))]
    pub fn readdir(&mut self, dir: &mut Dir) -> Result<Option<Dirent>, Error> {
        let Some((_inode_number, block_index, entry)) = dir.stream.next(&dir.dir_table.data)? else {
            return Ok(None);
        };

        let kind = EntryKind::from_tag(entry.type_);
        let size = if kind == EntryKind::Reg {
            let buf = inode_at(&dir.inode_table, block_index, entry.offset)?;
            let child = Inode::parse(buf, dir.block_size)?;
            Some(file_size(&child)?)
        } else {
            None
        };

        Ok(Some(Dirent { name: entry.name_str(), kind, size }))
    }

    /// `closedir`.
    pub fn closedir(&mut self, dir: Dir) {
        dir.closedir();
    }

    /// Resolves `path` to a non-directory inode, following symlinks, per
    /// spec §4.8: split into `(dir, file)`, open the directory, scan for
    /// the file, then resolve symlinks by recursing on the matched entry.
    fn resolve_entry(&mut self, path: &str) -> Result<(Inode, DirEntry), Error> {
        self.resolve_entry_depth(path, 0)
    }

    /// Depth-tracked worker for [`Self::resolve_entry`]; a terminal symlink
    /// recurses on the composed absolute path, bounded at the same cap as
    /// the directory walker's own symlink chase (spec §4.5 step 6, §9).
    fn resolve_entry_depth(&mut self, path: &str, depth: u32) -> Result<(Inode, DirEntry), Error> {
        const MAX_SYMLINK_DEPTH: u32 = 40;
        if depth > MAX_SYMLINK_DEPTH {
            return Err(Error::Loop);
        }

        let (parent, name) = split_parent(path);
        if name.is_empty() {
            return Err(Error::NotFound(path.to_owned()));
        }

        let (inode_table, dir_table) = self.load_tables()?;
        let parent_inode = resolve(
            &mut self.device,
            self.partition_start,
            self.decompressor.as_ref(),
            &self.superblock,
            &inode_table,
            &dir_table,
            &self.root_inode,
            &parent,
        )?;
        let (index, offset, file_size) = Self::dir_ref(&parent_inode)?;
        let pos = dir_table.dir_byte_pos(index, offset)?;

        let entry = find_entry(&dir_table.data, pos, file_size, &name)?
            .ok_or_else(|| Error::NotFound(path.to_owned()))?;
        let (header, entry) = entry;
        let buf = inode_at(&inode_table, header.start, entry.offset)?;
        let inode = Inode::parse(buf, self.superblock.block_size)?;

        // Resolve a terminal symlink by recursing on the composed absolute
        // path, per spec §4.8's "resolve symlinks by recursing on the
        // resolved absolute path".
        if inode.is_symlink() {
            let target = symlink_target(&inode)?;
            let next_path = if target.starts_with('/') {
                target
            } else {
                format!("{parent}/{target}")
            };
            return self.resolve_entry_depth(&next_path, depth + 1);
        }

        Ok((inode, entry))
    }

    /// `size(path) -> size`.
    #[instrument(skip(self))]
    pub fn size(&mut self, path: &str) -> Result<u64, Error> {
        let (inode, _) = self.resolve_entry(path)?;
        if !inode.is_file() {
            return Err(Error::Unsupported("size() on a non-regular-file inode"));
        }
        file_size(&inode)
    }

    /// `read(path, buf, offset, len) -> actread`. `len == 0` reads the whole
    /// file; returns the bytes actually produced.
    #[instrument(skip(self))]
    pub fn read(&mut self, path: &str, offset: u64, len: u64) -> Result<Vec<u8>, Error> {
        let (inode, _) = self.resolve_entry(path)?;
        if !inode.is_file() {
            return Err(Error::Unsupported("read() on a non-regular-file inode"));
        }
        read_file(
            &mut self.device,
            self.partition_start,
            self.decompressor.as_ref(),
            &self.superblock,
            &inode,
            offset,
            len,
        )
    }
}
