//! Compressed transfer frames for moving bitmaps between nodes.
//!
//! Frame layout (little-endian):
//!
//! | bytes | field |
//! |---|---|
//! | 4 | magic `BSHD` |
//! | 1 | version |
//! | 4 | CRC32 of the uncompressed bitmap bytes |
//! | 8 | uncompressed length |
//! | .. | zstd stream of [`Bitmap::to_bytes`] |

use base64::{engine::general_purpose, Engine as _};

use crate::bitmap::Bitmap;
use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"BSHD";
const VERSION: u8 = 1;
const HEADER_SIZE: usize = 4 + 1 + 4 + 8;
/// Largest uncompressed payload a frame may declare.
pub const MAX_RAW_LEN: u64 = 256 * 1024 * 1024;

/// Compress `bitmap` into a self-describing frame.
pub fn encode(bitmap: &Bitmap, level: i32) -> Result<Vec<u8>> {
    let raw = bitmap.to_bytes();
    let compressed = zstd::encode_all(raw.as_slice(), level)
        .map_err(|e| Error::Encode(format!("zstd compression failed: {}", e)))?;
    let mut out = Vec::with_capacity(HEADER_SIZE + compressed.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&crc32fast::hash(&raw).to_le_bytes());
    out.extend_from_slice(&(raw.len() as u64).to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Decode a frame produced by [`encode`].
pub fn decode(frame: &[u8]) -> Result<Bitmap> {
    if frame.len() < HEADER_SIZE {
        return Err(Error::Decode(format!("frame too short: {} bytes", frame.len())));
    }
    if &frame[0..4] != MAGIC {
        return Err(Error::Decode("invalid frame magic".into()));
    }
    if frame[4] != VERSION {
        return Err(Error::Decode(format!("unsupported frame version {}", frame[4])));
    }
    let crc = u32::from_le_bytes([frame[5], frame[6], frame[7], frame[8]]);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&frame[9..HEADER_SIZE]);
    let raw_len = u64::from_le_bytes(len_bytes);

    if raw_len > MAX_RAW_LEN {
        return Err(Error::Decode(format!(
            "declared length {} exceeds limit {}",
            raw_len, MAX_RAW_LEN
        )));
    }

    let raw = zstd::bulk::decompress(&frame[HEADER_SIZE..], raw_len as usize)
        .map_err(|e| Error::Decode(format!("zstd decompression failed: {}", e)))?;
    if raw.len() as u64 != raw_len {
        return Err(Error::Decode(format!(
            "length mismatch: header says {}, got {}",
            raw_len,
            raw.len()
        )));
    }
    if crc32fast::hash(&raw) != crc {
        return Err(Error::Decode("checksum mismatch".into()));
    }
    Bitmap::from_bytes(&raw)
}

/// Base64 text form of an encoded frame.
pub fn encode_base64(bitmap: &Bitmap, level: i32) -> Result<String> {
    Ok(general_purpose::STANDARD.encode(encode(bitmap, level)?))
}

pub fn decode_base64(text: &str) -> Result<Bitmap> {
    let frame = general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|e| Error::Decode(format!("invalid base64: {}", e)))?;
    decode(&frame)
}
