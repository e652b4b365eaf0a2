//! `script_text` string-table archive: an offset-addressed sequence of
//! UTF-8 strings, plus the filler tables the packed container carries
//! alongside the real one.
//!
//! Entry 0 is a big-endian `u32` offset table, terminated by `0xFFFFFFFF`;
//! entry 1 is the concatenated string payload those offsets index into.
//! Entries past index 1 are ignored on read.
use crate::container::{Container, Entry};
use std::collections::BTreeMap;

/// Decodes a `script_text` container's offset table and string payload into
/// an offset-indexed map. Offsets with no content still decode to an empty
/// string rather than being absent, since the offset table covers the whole
/// `0..=max_offset` range by construction.
pub fn parse(container: &Container) -> anyhow::Result<BTreeMap<u32, String>> {
    let offsets_raw = &container
        .entries
        .get(0)
        .ok_or_else(|| anyhow::anyhow!("script_text container has no offset table entry"))?
        .data;
    let payload = &container
        .entries
        .get(1)
        .ok_or_else(|| anyhow::anyhow!("script_text container has no string payload entry"))?
        .data;

    let mut positions = Vec::new();
    for chunk in offsets_raw.chunks_exact(4) {
        let v = u32::from_be_bytes(chunk.try_into().unwrap());
        if v == 0xFFFF_FFFF {
            break;
        }
        positions.push(v as usize);
    }

    let mut strings = BTreeMap::new();
    for i in 0..positions.len() {
        let start = positions[i].min(payload.len());
        let end = positions.get(i + 1).copied().unwrap_or(payload.len()).min(payload.len());
        let bytes = if end > start { &payload[start..end] } else { &[][..] };
        strings.insert(i as u32, String::from_utf8_lossy(bytes).into_owned());
    }
    Ok(strings)
}

/// Builds one offset-table/string-table pair spanning `0..=max_offset`: a
/// big-endian `u32` per slot giving that slot's start position in the
/// string payload, terminated by the final position written twice then
/// `0xFFFFFFFF`. A slot with no entry in `strings` still gets a table entry,
/// pointing at wherever the payload has reached (an empty slot).
fn pack_offset_table(strings: &BTreeMap<u32, String>, max_offset: u32) -> (Vec<u8>, Vec<u8>) {
    let mut offset_table = Vec::with_capacity((max_offset as usize + 4) * 4);
    let mut payload = Vec::new();
    for offset in 0..=max_offset {
        offset_table.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        if let Some(s) = strings.get(&offset) {
            payload.extend_from_slice(s.as_bytes());
        }
    }
    let final_pos = payload.len() as u32;
    offset_table.extend_from_slice(&final_pos.to_be_bytes());
    offset_table.extend_from_slice(&final_pos.to_be_bytes());
    offset_table.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes());
    (offset_table, payload)
}

/// Builds a filler offset/string table pair shaped exactly like the main
/// table (same `0..=max_offset` range), with every slot holding the same
/// literal filler text.
fn pack_filler_table(max_offset: u32, filler: &str) -> (Vec<u8>, Vec<u8>) {
    let strings: BTreeMap<u32, String> = (0..=max_offset).map(|o| (o, filler.to_string())).collect();
    pack_offset_table(&strings, max_offset)
}

/// Packs a string table into a `script_text` container: the real offset and
/// string tables, then a `"  \r\n"` filler pair built once, then a
/// `"\u{3000}\r\n"` filler pair built and packed three times — ten sections
/// in total, in that fixed order.
pub fn pack(strings: &BTreeMap<u32, String>) -> anyhow::Result<Vec<u8>> {
    let max_offset = strings.keys().copied().max().unwrap_or(0);
    let (offsets, payload) = pack_offset_table(strings, max_offset);
    let (fill_nl_off, fill_nl_str) = pack_filler_table(max_offset, "  \r\n");
    let (fill_sp_off, fill_sp_str) = pack_filler_table(max_offset, "\u{3000}\r\n");

    let mut entries =
        vec![Entry { data: offsets }, Entry { data: payload }, Entry { data: fill_nl_off }, Entry { data: fill_nl_str }];
    for _ in 0..3 {
        entries.push(Entry { data: fill_sp_off.clone() });
        entries.push(Entry { data: fill_sp_str.clone() });
    }
    Container { entries }.pack()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decodes_offset_addressed_strings() {
        let mut strings = BTreeMap::new();
        strings.insert(0u32, "hello".to_string());
        strings.insert(1u32, "world".to_string());
        let packed = pack(&strings).unwrap();
        let container = Container::parse(&packed).unwrap();
        let decoded = parse(&container).unwrap();
        assert_eq!(decoded.get(&0).map(String::as_str), Some("hello"));
        assert_eq!(decoded.get(&1).map(String::as_str), Some("world"));
    }

    #[test]
    fn pack_emits_ten_sections() {
        let mut strings = BTreeMap::new();
        strings.insert(0u32, "a".to_string());
        let packed = pack(&strings).unwrap();
        let container = Container::parse(&packed).unwrap();
        assert_eq!(container.entries.len(), 10);
    }

    #[test]
    fn offset_table_is_terminated_by_twice_repeated_final_position_then_sentinel() {
        let mut strings = BTreeMap::new();
        strings.insert(0u32, "ab".to_string());
        let packed = pack(&strings).unwrap();
        let container = Container::parse(&packed).unwrap();
        let offsets = &container.entries[0].data;
        // slot 0 at position 0, then final position (2) written twice, then the sentinel.
        assert_eq!(offsets.len(), 4 * 4);
        assert_eq!(&offsets[0..4], &0u32.to_be_bytes());
        assert_eq!(&offsets[4..8], &2u32.to_be_bytes());
        assert_eq!(&offsets[8..12], &2u32.to_be_bytes());
        assert_eq!(&offsets[12..16], &0xFFFF_FFFFu32.to_be_bytes());
    }

    #[test]
    fn offsets_with_no_string_still_get_a_table_slot() {
        let mut strings = BTreeMap::new();
        strings.insert(2u32, "x".to_string());
        let (offset_table, _) = pack_offset_table(&strings, 2);
        // four slots (0, 1, 2, terminator-start) plus the two-word terminator and sentinel.
        assert_eq!(offset_table.len(), 6 * 4);
        assert_eq!(&offset_table[0..4], &0u32.to_be_bytes());
        assert_eq!(&offset_table[4..8], &0u32.to_be_bytes());
        assert_eq!(&offset_table[8..12], &0u32.to_be_bytes());
    }

    #[test]
    fn filler_tables_use_the_two_documented_strings() {
        let mut strings = BTreeMap::new();
        strings.insert(0u32, "x".to_string());
        let packed = pack(&strings).unwrap();
        let container = Container::parse(&packed).unwrap();
        assert_eq!(String::from_utf8_lossy(&container.entries[3].data), "  \r\n");
        assert_eq!(String::from_utf8_lossy(&container.entries[5].data), "\u{3000}\r\n");
        assert_eq!(container.entries[5].data, container.entries[7].data);
        assert_eq!(container.entries[5].data, container.entries[9].data);
    }
}
