//! MZX0 stream decompressor.
//!
//! Ported from `luna/mzx.py`'s decompression loop: a 4-byte `"MZX0"` magic
//! and little-endian `u32` decompressed size precede a byte stream of
//! single-byte command/length selectors (low 2 bits select one of four
//! opcodes, the high 6 bits carry a repeat count), with a 64-entry ring
//! buffer of 2-byte words and an `invert` flag that XORs every literal with
//! `0xFF`.
use crate::error::Error;
use std::io::Read;

const MAGIC: &[u8; 4] = b"MZX0";
const RING_SIZE: usize = 64;

const CMD_RLE: u8 = 0;
const CMD_BACKREF: u8 = 1;
const CMD_RINGBUF: u8 = 2;
const CMD_LITERAL: u8 = 3;

/// Decompresses an MZX0 stream into its expanded byte form.
///
/// `invert` mirrors the original's inversion flag (default `true` for this
/// game): literal words are XORed with `0xFF` before being stored, and the
/// ring buffer's and `last`'s initial state is likewise inverted.
pub fn decompress(data: &[u8], invert: bool) -> anyhow::Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(Error::TruncatedInput { expected: 8, available: data.len() }.into());
    }
    if &data[0..4] != MAGIC {
        return Err(Error::BadMagic {
            expected: "MZX0",
            found: String::from_utf8_lossy(&data[0..4]).into_owned(),
        }
        .into());
    }
    let decompressed_size = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;

    let init_short: [u8; 2] = if invert { [0xFF, 0xFF] } else { [0x00, 0x00] };
    let mut out: Vec<u8> = Vec::with_capacity(decompressed_size);
    let mut last_short = init_short;
    let mut ring = [init_short; RING_SIZE];
    let mut ring_pos = 0usize;
    let mut reader = &data[8..];

    while out.len() < decompressed_size {
        let mut len_cmd = [0u8; 1];
        reader
            .read_exact(&mut len_cmd)
            .map_err(|_| Error::TruncatedInput { expected: decompressed_size, available: out.len() })?;
        let len_cmd = len_cmd[0];
        let cmd = len_cmd & 0b11;
        let length = (len_cmd >> 2) as usize;

        match cmd {
            CMD_RLE => {
                for _ in 0..=length {
                    out.extend_from_slice(&last_short);
                }
            }
            CMD_BACKREF => {
                let mut dist_byte = [0u8; 1];
                reader.read_exact(&mut dist_byte).map_err(|_| Error::TruncatedInput {
                    expected: decompressed_size,
                    available: out.len(),
                })?;
                let lookback = 2 * (dist_byte[0] as usize + 1);
                for _ in 0..=length {
                    if lookback > out.len() {
                        return Err(Error::TruncatedInput { expected: lookback, available: out.len() }.into());
                    }
                    let src = out.len() - lookback;
                    let short = [out[src], out[src + 1]];
                    out.extend_from_slice(&short);
                    last_short = short;
                }
            }
            CMD_RINGBUF => {
                if length >= RING_SIZE {
                    return Err(Error::TruncatedInput { expected: length, available: RING_SIZE }.into());
                }
                last_short = ring[length];
                out.extend_from_slice(&last_short);
            }
            CMD_LITERAL => {
                for _ in 0..=length {
                    let mut raw = [0u8; 2];
                    reader.read_exact(&mut raw).map_err(|_| Error::TruncatedInput {
                        expected: decompressed_size,
                        available: out.len(),
                    })?;
                    let literal = if invert { [raw[0] ^ 0xFF, raw[1] ^ 0xFF] } else { raw };
                    last_short = literal;
                    ring[ring_pos] = literal;
                    ring_pos = (ring_pos + 1) % RING_SIZE;
                    out.extend_from_slice(&literal);
                }
            }
            _ => unreachable!("2-bit opcode"),
        }
    }

    out.truncate(decompressed_size);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(body: &[u8], decompressed_size: u32) -> Vec<u8> {
        let mut input = MAGIC.to_vec();
        input.extend_from_slice(&decompressed_size.to_le_bytes());
        input.extend_from_slice(body);
        input
    }

    #[test]
    fn decodes_a_run_of_literals() {
        let mut body = Vec::new();
        for v in [0x4141u16, 0x4242, 0x4343] {
            body.push(CMD_LITERAL); // length field 0 -> one literal per command
            body.extend_from_slice(&v.to_le_bytes());
        }
        let out = decompress(&stream(&body, 6), false).unwrap();
        assert_eq!(out, vec![0x41, 0x41, 0x42, 0x42, 0x43, 0x43]);
    }

    #[test]
    fn rle_repeats_the_last_emitted_word() {
        let mut body = Vec::new();
        body.push(CMD_LITERAL);
        body.extend_from_slice(&0x4141u16.to_le_bytes());
        // RLE with length field = 1 -> two extra repeats (length+1 total pushes).
        body.push((1u8 << 2) | CMD_RLE);
        let out = decompress(&stream(&body, 6), false).unwrap();
        assert_eq!(out, vec![0x41, 0x41, 0x41, 0x41, 0x41, 0x41]);
    }

    #[test]
    fn backref_copies_an_earlier_word() {
        let mut body = Vec::new();
        for v in [0x4141u16, 0x4242] {
            body.push(CMD_LITERAL);
            body.extend_from_slice(&v.to_le_bytes());
        }
        // BACKREF length=0, dist byte=0 -> lookback = 2*(0+1) = 2 bytes -> re-copy 0x4242.
        body.push(CMD_BACKREF);
        body.push(0);
        let out = decompress(&stream(&body, 6), false).unwrap();
        assert_eq!(out, vec![0x41, 0x41, 0x42, 0x42, 0x42, 0x42]);
    }

    #[test]
    fn ringbuf_replays_a_stored_literal() {
        let mut body = Vec::new();
        body.push(CMD_LITERAL);
        body.extend_from_slice(&0x4242u16.to_le_bytes());
        // RINGBUF index 0 -> the first literal ever written.
        body.push(CMD_RINGBUF);
        let out = decompress(&stream(&body, 4), false).unwrap();
        assert_eq!(out, vec![0x42, 0x42, 0x42, 0x42]);
    }

    #[test]
    fn inverted_literals_are_xored() {
        let mut body = Vec::new();
        body.push(CMD_LITERAL);
        body.extend_from_slice(&0x0000u16.to_le_bytes());
        let out = decompress(&stream(&body, 2), true).unwrap();
        assert_eq!(out, vec![0xFF, 0xFF]);
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let body = vec![CMD_LITERAL];
        let err = decompress(&stream(&body, 4), false).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut input = b"XXXX".to_vec();
        input.extend_from_slice(&4u32.to_le_bytes());
        let err = decompress(&input, false).unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }
}
