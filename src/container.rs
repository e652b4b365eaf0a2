//! Sectored archive container codec (`mrgd00`).
//!
//! Layout: a 6-byte magic, a little-endian `u16` entry count, then one
//! 8-byte header per entry (`sector_offset: u16`, `byte_offset: u16`,
//! `size_sectors: u16`, `size_bytes: u16`). A sector is 0x800 bytes; an
//! entry's relative start is `sector_offset * 0x800 + byte_offset` from the
//! end of the header table, and its byte length is
//! `(size_sectors * 0x800) & !0xFFFF | size_bytes` (the low 16 bits come
//! from `size_bytes`, the high bits from the sector figure).
use crate::error::Error;
use crate::ext::io::{ReadExt, WriteExt};
use std::io::Cursor;

pub const MAGIC: &[u8; 6] = b"mrgd00";
const SECTOR_SIZE: usize = 0x800;

/// One decoded entry: raw payload bytes, exactly the recovered byte length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub data: Vec<u8>,
}

/// A parsed container: the ordered list of entry payloads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Container {
    pub entries: Vec<Entry>,
}

struct RawHeader {
    sector_offset: u16,
    byte_offset: u16,
    size_sectors: u16,
    size_bytes: u16,
}

impl Container {
    /// Parses a whole container from a byte buffer.
    pub fn parse(buf: &[u8]) -> anyhow::Result<Self> {
        if buf.len() < 8 {
            return Err(Error::TruncatedInput { expected: 8, available: buf.len() }.into());
        }
        let mut cur = Cursor::new(buf);
        let magic = cur.read_fixed(6)?;
        if &magic[..] != MAGIC {
            return Err(Error::BadMagic {
                expected: "mrgd00",
                found: String::from_utf8_lossy(&magic).into_owned(),
            }
            .into());
        }
        let count = cur.read_u16_le()? as usize;

        let mut headers = Vec::with_capacity(count);
        for _ in 0..count {
            if (cur.position() as usize) + 8 > buf.len() {
                return Err(Error::TruncatedInput {
                    expected: cur.position() as usize + 8,
                    available: buf.len(),
                }
                .into());
            }
            let sector_offset = cur.read_u16_le()?;
            let byte_offset = cur.read_u16_le()?;
            let size_sectors = cur.read_u16_le()?;
            let size_bytes = cur.read_u16_le()?;
            headers.push(RawHeader { sector_offset, byte_offset, size_sectors, size_bytes });
        }

        let data_start = cur.position() as usize;
        let mut entries = Vec::with_capacity(count);
        for (index, header) in headers.iter().enumerate() {
            let relative_start = header.sector_offset as usize * SECTOR_SIZE + header.byte_offset as usize;
            let start = data_start + relative_start;
            let size =
                (header.size_sectors as usize * SECTOR_SIZE) & !0xFFFF | header.size_bytes as usize;
            let end = start + size;
            if end > buf.len() {
                return Err(Error::TruncatedEntry {
                    index,
                    expected: end - start,
                    available: buf.len().saturating_sub(start),
                }
                .into());
            }
            entries.push(Entry { data: buf[start..end].to_vec() });
        }

        Ok(Container { entries })
    }

    /// Packs entries back into a container buffer, recomputing headers from
    /// the payload sizes. Each section is padded to a 16-byte boundary with
    /// `0xFF` before the next one starts; the whole output is padded to an
    /// 8-byte boundary with `0xFF`. Not required to reproduce the original
    /// container byte-for-byte: only the recovered offsets and lengths need
    /// to be correct.
    pub fn pack(&self) -> anyhow::Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.write_u16_le(self.entries.len() as u16)?;

        let mut headers = Vec::with_capacity(self.entries.len());
        let mut padded_lens = Vec::with_capacity(self.entries.len());
        let mut cumulative = 0usize;
        for entry in &self.entries {
            let len = entry.data.len();
            let sector_offset = (cumulative / SECTOR_SIZE) as u16;
            let byte_offset = (cumulative % SECTOR_SIZE) as u16;
            let size_sectors = len.div_ceil(SECTOR_SIZE) as u16;
            let size_bytes = (len & 0xFFFF) as u16;
            headers.push((sector_offset, byte_offset, size_sectors, size_bytes));
            let padded = len.div_ceil(16) * 16;
            padded_lens.push(padded);
            cumulative += padded;
        }

        for (sector_offset, byte_offset, size_sectors, size_bytes) in &headers {
            out.write_u16_le(*sector_offset)?;
            out.write_u16_le(*byte_offset)?;
            out.write_u16_le(*size_sectors)?;
            out.write_u16_le(*size_bytes)?;
        }

        for (entry, &padded) in self.entries.iter().zip(&padded_lens) {
            out.extend_from_slice(&entry.data);
            out.resize(out.len() + (padded - entry.data.len()), 0xFF);
        }

        let final_len = out.len().div_ceil(8) * 8;
        out.resize(final_len, 0xFF);
        Ok(out)
    }
}
