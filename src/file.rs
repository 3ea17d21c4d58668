//! File reader (spec §4.7): assembles regular/extended-regular file content
//! from fixed-size data blocks plus an optional tail fragment.

use tracing::instrument;

use crate::compressor::Decompressor;
use crate::device::{BlockDevice, PartitionReader};
use crate::error::Error;
use crate::fragment::lookup_fragment;
use crate::inode::{Inode, InodeInner, NO_FRAGMENT};
use crate::superblock::SuperBlock;

const UNCOMPRESSED_BIT: u32 = 0x0100_0000;
const SIZE_MASK: u32 = 0x00ff_ffff;

struct FileLayout {
    blocks_start: u64,
    file_size: u64,
    block_sizes: Vec<u32>,
    frag_index: u32,
    block_offset: u32,
}

fn layout_of(inode: &Inode) -> Result<FileLayout, Error> {
    match &inode.inner {
        InodeInner::BasicFile(f) => Ok(FileLayout {
            blocks_start: f.blocks_start as u64,
            file_size: f.file_size as u64,
            block_sizes: f.block_sizes.clone(),
            frag_index: f.frag_index,
            block_offset: f.block_offset,
        }),
        InodeInner::ExtendedFile(f) => Ok(FileLayout {
            blocks_start: f.blocks_start,
            file_size: f.file_size,
            block_sizes: f.block_sizes.clone(),
            frag_index: f.frag_index,
            block_offset: f.block_offset,
        }),
        _ => Err(Error::Unsupported("not a regular file")),
    }
}

/// Returns the inode's logical size, per the `size()` facade operation.
pub fn file_size(inode: &Inode) -> Result<u64, Error> {
    Ok(layout_of(inode)?.file_size)
}

/// Reads `len` bytes (0 meaning "whole file") starting at `offset` into a
/// fresh buffer, per spec §4.7. `offset` is a *file* offset; the returned
/// buffer always starts at byte 0 of the read (SPEC_FULL §9 item 1).
#[instrument(skip(device, decompressor, sb, inode))]
pub fn read_file<D: BlockDevice>(
    device: &mut D,
    partition_start: u64,
    decompressor: &dyn Decompressor,
    sb: &SuperBlock,
    inode: &Inode,
    offset: u64,
    len: u64,
) -> Result<Vec<u8>, Error> {
    let layout = layout_of(inode)?;
    let fragmented = layout.frag_index != NO_FRAGMENT;
    let block_size = sb.block_size as u64;

    if fragmented && layout.file_size % block_size == 0 {
        return Err(Error::Corrupt(
            "file size is an exact multiple of block_size but carries a fragment".into(),
        ));
    }
    if (layout.frag_index == NO_FRAGMENT) != (layout.block_offset == NO_FRAGMENT) {
        return Err(Error::Corrupt(
            "fragment index/offset sentinel mismatch".into(),
        ));
    }

    if offset > layout.file_size {
        return Err(Error::Range(format!("offset {offset} beyond file size {}", layout.file_size)));
    }
    let want = if len == 0 { layout.file_size - offset } else { len };
    if offset + want > layout.file_size {
        return Err(Error::Range(format!(
            "read of {want} bytes at offset {offset} exceeds file size {}",
            layout.file_size
        )));
    }

    let mut out = Vec::with_capacity(want as usize);
    let mut block_start = layout.blocks_start;
    let mut file_pos = 0u64;

    {
        let mut reader = PartitionReader::new(device, partition_start);
        for &raw_size in &layout.block_sizes {
            if file_pos >= offset + want {
                break;
            }

            let this_block_len = block_size.min(layout.file_size - file_pos);
            let block_end = file_pos + this_block_len;

            if block_end <= offset {
                if raw_size != 0 {
                    block_start += (raw_size & SIZE_MASK) as u64;
                }
                file_pos = block_end;
                continue;
            }

            let block_bytes = if raw_size == 0 {
                vec![0u8; this_block_len as usize]
            } else {
                let on_disk_len = (raw_size & SIZE_MASK) as usize;
                let compressed = raw_size & UNCOMPRESSED_BIT == 0;
                let raw = reader.read_at(block_start, on_disk_len)?;
                block_start += on_disk_len as u64;
                if compressed {
                    let mut decompressed = Vec::with_capacity(this_block_len as usize);
                    decompressor.decompress(&raw, &mut decompressed)?;
                    decompressed
                } else {
                    raw
                }
            };

            let lo = offset.saturating_sub(file_pos) as usize;
            let hi = ((offset + want).min(block_end) - file_pos) as usize;
            out.extend_from_slice(&block_bytes[lo..hi]);

            file_pos = block_end;
        }
    }

    if fragmented && file_pos < offset + want {
        let entry = lookup_fragment(
            device,
            partition_start,
            decompressor,
            sb.frag_table_start,
            sb.frag_count,
            layout.frag_index,
        )?;

        let raw = {
            let mut reader = PartitionReader::new(device, partition_start);
            reader.read_at(entry.start, entry.on_disk_len() as usize)?
        };
        let fragment_block = if entry.compressed() {
            let mut decompressed = Vec::new();
            decompressor.decompress(&raw, &mut decompressed)?;
            decompressed
        } else {
            raw
        };

        let tail_len = (layout.file_size % block_size) as usize;
        let tail_start = layout.block_offset as usize;
        let tail = fragment_block
            .get(tail_start..tail_start + tail_len)
            .ok_or_else(|| Error::Corrupt("fragment tail out of bounds".into()))?;

        let lo = offset.saturating_sub(file_pos) as usize;
        let hi = ((offset + want).min(layout.file_size) - file_pos) as usize;
        out.extend_from_slice(&tail[lo..hi]);
    }

    Ok(out)
}
