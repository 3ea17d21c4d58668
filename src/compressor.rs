//! Decompressor collaborator (spec §6) and the compression algorithms a
//! superblock may select.

use deku::prelude::*;
use tracing::instrument;

use crate::error::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, DekuRead, DekuWrite, Default)]
#[deku(endian = "little")]
#[deku(type = "u16")]
#[rustfmt::skip]
pub enum Compressor {
    #[default]
    None = 0,
    Gzip = 1,
    Lzma = 2,
    Lzo  = 3,
    Xz   = 4,
    Lz4  = 5,
    Zstd = 6,
}

/// External collaborator: decompresses a metadata or data block payload.
///
/// Plays the role of the source driver's `init`/`decompress`/`cleanup`
/// capability set; `init` and `cleanup` collapse into construction and drop.
pub trait Decompressor {
    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<(), Error>;
}

struct NoneDecompressor;

impl Decompressor for NoneDecompressor {
    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<(), Error> {
        dest.extend_from_slice(src);
        Ok(())
    }
}

#[cfg(feature = "gzip")]
struct GzipDecompressor;

#[cfg(feature = "gzip")]
impl Decompressor for GzipDecompressor {
    #[instrument(skip_all)]
    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<(), Error> {
        use std::io::Read;
        let mut decoder = flate2::read::ZlibDecoder::new(src);
        decoder.read_to_end(dest)?;
        Ok(())
    }
}

#[cfg(feature = "xz")]
struct XzDecompressor;

#[cfg(feature = "xz")]
impl Decompressor for XzDecompressor {
    #[instrument(skip_all)]
    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<(), Error> {
        use std::io::Read;
        let mut decoder = xz2::read::XzDecoder::new(src);
        decoder.read_to_end(dest)?;
        Ok(())
    }
}

#[cfg(feature = "lzo")]
struct LzoDecompressor;

#[cfg(feature = "lzo")]
impl Decompressor for LzoDecompressor {
    #[instrument(skip_all)]
    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<(), Error> {
        let mut out = vec![0u8; src.len() * 16 + 4096];
        let (written, error) = rust_lzo::LZOContext::decompress_to_slice(src, &mut out);
        let written = written.len();
        if error != rust_lzo::LZOError::OK {
            return Err(Error::Corrupt("lzo decompression failed".into()));
        }
        out.truncate(written);
        dest.extend_from_slice(&out);
        Ok(())
    }
}

#[cfg(feature = "zstd")]
struct ZstdDecompressor;

#[cfg(feature = "zstd")]
impl Decompressor for ZstdDecompressor {
    #[instrument(skip_all)]
    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<(), Error> {
        let mut decoder = zstd::bulk::Decompressor::new()
            .map_err(|e| Error::Corrupt(format!("zstd init failed: {e}")))?;
        let decompressed = decoder
            .decompress(src, 8192)
            .map_err(|e| Error::Corrupt(format!("zstd decompression failed: {e}")))?;
        dest.extend_from_slice(&decompressed);
        Ok(())
    }
}

#[cfg(feature = "lz4")]
struct Lz4Decompressor;

#[cfg(feature = "lz4")]
impl Decompressor for Lz4Decompressor {
    #[instrument(skip_all)]
    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<(), Error> {
        let decompressed = lz4_flex::decompress(src, 8192)
            .map_err(|e| Error::Corrupt(format!("lz4 decompression failed: {e}")))?;
        dest.extend_from_slice(&decompressed);
        Ok(())
    }
}

/// Select the decompressor for a superblock's `compressor` id.
pub fn for_id(compressor: Compressor) -> Result<Box<dyn Decompressor>, Error> {
    match compressor {
        Compressor::None => Ok(Box::new(NoneDecompressor)),
        #[cfg(feature = "gzip")]
        Compressor::Gzip => Ok(Box::new(GzipDecompressor)),
        #[cfg(feature = "xz")]
        Compressor::Xz => Ok(Box::new(XzDecompressor)),
        #[cfg(feature = "lzo")]
        Compressor::Lzo => Ok(Box::new(LzoDecompressor)),
        #[cfg(feature = "zstd")]
        Compressor::Zstd => Ok(Box::new(ZstdDecompressor)),
        #[cfg(feature = "lz4")]
        Compressor::Lz4 => Ok(Box::new(Lz4Decompressor)),
        #[allow(unreachable_patterns)]
        _ => Err(Error::Unsupported("compression algorithm not enabled")),
    }
}
