//! Block-device collaborator (spec §6) and the partition-window shim (§4.1).

use std::io::{Read, Seek, SeekFrom};

use tracing::instrument;

use crate::error::Error;

/// External collaborator: translates `(block, count)` into raw device reads.
///
/// A short read is always fatal (spec §4.1): implementations must return
/// `Err` rather than a short `Ok(n)` when fewer than `count` blocks could be
/// read, since a partial block would desynchronize every higher layer's
/// offset math.
pub trait BlockDevice {
    /// Logical block size in bytes used by this device for the partition.
    fn block_size(&self) -> u32;

    /// Read `count` logical blocks starting at `start_block` into `dest`.
    /// `dest` must be at least `count * block_size()` bytes.
    fn read_blocks(&mut self, start_block: u64, count: u32, dest: &mut [u8]) -> Result<(), Error>;
}

/// Adapts a [`BlockDevice`] to byte-range reads within a mounted partition,
/// computing `(start_block, within_block_offset, blocks)` from a byte span
/// per spec §4.1.
pub struct PartitionReader<'a, D: BlockDevice> {
    device: &'a mut D,
    /// Start sector of the mounted partition, in device blocks.
    partition_start: u64,
}

impl<'a, D: BlockDevice> PartitionReader<'a, D> {
    pub fn new(device: &'a mut D, partition_start: u64) -> Self {
        Self { device, partition_start }
    }

    pub fn block_size(&self) -> u32 {
        self.device.block_size()
    }

    /// Read `len` bytes starting at partition-relative byte offset `byte_offset`.
    #[instrument(skip(self))]
    pub fn read_at(&mut self, byte_offset: u64, len: usize) -> Result<Vec<u8>, Error> {
        let blksz = self.device.block_size() as u64;
        let within_block_offset = byte_offset % blksz;
        let start_block = byte_offset / blksz;
        let blocks = ((len as u64 + within_block_offset) + blksz - 1) / blksz;
        let blocks_u32: u32 = blocks
            .try_into()
            .map_err(|_| Error::Range(format!("read of {len} bytes spans too many blocks")))?;

        let mut raw = vec![0u8; (blocks * blksz) as usize];
        self.device
            .read_blocks(self.partition_start + start_block, blocks_u32, &mut raw)?;

        let start = within_block_offset as usize;
        Ok(raw[start..start + len].to_vec())
    }
}

/// In-memory [`BlockDevice`] used by the demo CLI and tests, backing a
/// device with a single flat buffer.
pub struct MemDevice {
    data: Vec<u8>,
    block_size: u32,
}

impl MemDevice {
    pub fn new(data: Vec<u8>, block_size: u32) -> Self {
        Self { data, block_size }
    }

    pub fn from_reader<R: Read + Seek>(mut r: R, block_size: u32) -> Result<Self, Error> {
        let mut data = Vec::new();
        r.seek(SeekFrom::Start(0))?;
        r.read_to_end(&mut data)?;
        Ok(Self { data, block_size })
    }

    /// Consumes the device, returning its backing bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl BlockDevice for MemDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn read_blocks(&mut self, start_block: u64, count: u32, dest: &mut [u8]) -> Result<(), Error> {
        let start = start_block * self.block_size as u64;
        let len = count as u64 * self.block_size as u64;
        let end = start + len;
        if end > self.data.len() as u64 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "short read from MemDevice",
            )));
        }
        dest[..len as usize].copy_from_slice(&self.data[start as usize..end as usize]);
        Ok(())
    }
}
