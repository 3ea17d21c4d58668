//! A read-only SquashFS image reader: superblock validation, metadata-block
//! chain decompression, inode and directory table extraction, fragment
//! index lookup, path resolution (with symlink chasing), directory
//! iteration, and byte-range file reads -- on top of a block-addressable
//! storage device supplied by the caller.
//!
//! Writes, xattrs, uid/gid resolution, export/NFS handles, permission
//! checks, cross-read caching, concurrent mounts, and encrypted or signed
//! images are all out of scope; see `Squashfs::probe` for the entry point.

pub mod compressor;
pub mod device;
mod dir;
pub mod endian;
pub mod error;
mod file;
mod fragment;
mod inode;
mod metadata;
pub mod path;
pub mod squashfs;
mod superblock;
mod tables;
mod walker;

pub use crate::compressor::Compressor;
pub use crate::device::{BlockDevice, MemDevice};
pub use crate::error::Error;
pub use crate::squashfs::{Dir, Dirent, EntryKind, Squashfs};
pub use crate::superblock::SuperBlock;
