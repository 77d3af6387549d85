//! Varint tree codec — compact binary serialization for DataTree
//!
//! Encodes a serialized revision history (or a delta pack) into a flat
//! byte stream using LEB128 varints for every length and count.
//!
//! Layout of one node:
//!
//! ```text
//! [str: tag] [varint: prop_count] ([str: key] [str: value])* [varint: child_count] (node)*
//! str = [varint: byte_len] [utf-8 bytes]
//! ```
//!
//! Author: Moroya Sakamoto

use crate::error::{Error, Result};
use crate::tree::DataTree;

/// Deepest nesting accepted by [`decode_tree`]
pub const MAX_DEPTH: usize = 256;

// ── Varint (LEB128) ───────────────────────────────────────────────────

/// Encode a u32 as LEB128 varint.
#[inline]
fn encode_varint_u32(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a u32 from LEB128 varint.
#[inline]
fn decode_varint_u32(data: &[u8], pos: &mut usize) -> Result<u32> {
    let start = *pos;
    let mut value: u32 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = *data.get(*pos).ok_or(Error::Truncated(*pos))?;
        *pos += 1;
        // fifth byte may only carry bits 28..=31
        if shift == 28 && byte & 0x70 != 0 {
            return Err(Error::VarintOverflow(start));
        }
        value |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 35 {
            return Err(Error::VarintOverflow(start));
        }
    }
    Ok(value)
}

/// Encode a usize as varint; lengths and counts must fit a u32.
#[inline]
fn encode_usize(value: usize, buf: &mut Vec<u8>) -> Result<()> {
    let value = u32::try_from(value).map_err(|_| Error::TooLarge(value))?;
    encode_varint_u32(value, buf);
    Ok(())
}

#[inline]
fn decode_usize(data: &[u8], pos: &mut usize) -> Result<usize> {
    decode_varint_u32(data, pos).map(|v| v as usize)
}

// ── String Codec ───────────────────────────────────────────────────────

fn encode_string(s: &str, buf: &mut Vec<u8>) -> Result<()> {
    encode_usize(s.len(), buf)?;
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn decode_string(data: &[u8], pos: &mut usize) -> Result<String> {
    let len = decode_usize(data, pos)?;
    let end = pos.checked_add(len).ok_or(Error::Truncated(*pos))?;
    let bytes = data.get(*pos..end).ok_or(Error::Truncated(data.len()))?;
    let s = String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8(*pos))?;
    *pos = end;
    Ok(s)
}

// ── Node Codec ─────────────────────────────────────────────────────────

fn encode_node(tree: &DataTree, buf: &mut Vec<u8>) -> Result<()> {
    encode_string(tree.tag(), buf)?;
    encode_usize(tree.property_count(), buf)?;
    for (key, value) in tree.properties() {
        encode_string(key, buf)?;
        encode_string(value, buf)?;
    }
    encode_usize(tree.child_count(), buf)?;
    for child in tree.children() {
        encode_node(child, buf)?;
    }
    Ok(())
}

fn decode_node(data: &[u8], pos: &mut usize, depth: usize) -> Result<DataTree> {
    if depth > MAX_DEPTH {
        return Err(Error::TooDeep(MAX_DEPTH));
    }
    let tag = decode_string(data, pos)?;
    let mut node = DataTree::new(&tag);

    let prop_count = decode_usize(data, pos)?;
    for _ in 0..prop_count {
        let key = decode_string(data, pos)?;
        let value = decode_string(data, pos)?;
        node.set_property(&key, value);
    }

    let child_count = decode_usize(data, pos)?;
    for _ in 0..child_count {
        node.append_child(decode_node(data, pos, depth + 1)?);
    }
    Ok(node)
}

/// Encode a tree into a byte buffer.
///
/// Fails with [`Error::TooLarge`] if any string or count exceeds `u32::MAX`.
pub fn encode_tree(tree: &DataTree) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_node(tree, &mut buf)?;
    Ok(buf)
}

/// Decode a tree from a byte buffer. The buffer must hold exactly one root.
pub fn decode_tree(data: &[u8]) -> Result<DataTree> {
    let mut pos = 0;
    let tree = decode_node(data, &mut pos, 0)?;
    if pos != data.len() {
        return Err(Error::TrailingBytes(data.len() - pos));
    }
    Ok(tree)
}

/// Encoded tree size in bytes.
pub fn encoded_tree_size(tree: &DataTree) -> Result<usize> {
    encode_tree(tree).map(|bytes| bytes.len())
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> DataTree {
        DataTree::new("revision")
            .with_property("commitMessage", "add bassline")
            .with_property("commitVersion", "3")
            .with_child(
                DataTree::new("revisionItem")
                    .with_property("itemType", "added")
                    .with_child(DataTree::new("delta").with_property("deltaName", "notes")),
            )
            .with_child(DataTree::new("revision").with_property("commitMessage", ""))
    }

    #[test]
    fn varint_roundtrip_small() {
        let mut buf = Vec::new();
        encode_varint_u32(42, &mut buf);
        let mut pos = 0;
        assert_eq!(decode_varint_u32(&buf, &mut pos).unwrap(), 42);
        assert_eq!(buf.len(), 1); // 42 fits in 1 byte
    }

    #[test]
    fn varint_roundtrip_large() {
        let mut buf = Vec::new();
        encode_varint_u32(0xFFFF_FFFF, &mut buf);
        let mut pos = 0;
        assert_eq!(decode_varint_u32(&buf, &mut pos).unwrap(), 0xFFFF_FFFF);
        assert_eq!(buf.len(), 5); // max u32 needs 5 bytes
    }

    #[test]
    fn varint_boundary_128() {
        let mut buf = Vec::new();
        encode_varint_u32(127, &mut buf);
        assert_eq!(buf.len(), 1);
        buf.clear();
        encode_varint_u32(128, &mut buf);
        assert_eq!(buf.len(), 2); // 128 needs 2 bytes
        let mut pos = 0;
        assert_eq!(decode_varint_u32(&buf, &mut pos).unwrap(), 128);
    }

    #[test]
    fn varint_overflow_rejected() {
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut pos = 0;
        assert!(matches!(
            decode_varint_u32(&buf, &mut pos),
            Err(Error::VarintOverflow(0))
        ));
    }

    #[test]
    fn varint_fifth_byte_overflow_rejected() {
        // 0x1_0000_0001: low bits fit, fifth byte sets bit 32
        let buf = [0x81, 0x80, 0x80, 0x80, 0x10];
        let mut pos = 0;
        assert!(matches!(
            decode_varint_u32(&buf, &mut pos),
            Err(Error::VarintOverflow(0))
        ));

        let bytes = [0x81, 0x80, 0x80, 0x80, 0x10, b'x', 0, 0];
        assert!(matches!(decode_tree(&bytes), Err(Error::VarintOverflow(0))));
    }

    #[test]
    fn varint_fifth_byte_max_accepted() {
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0x0F];
        let mut pos = 0;
        assert_eq!(decode_varint_u32(&buf, &mut pos).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_length_rejected() {
        let mut buf = Vec::new();
        let too_big = u32::MAX as usize + 1;
        assert!(matches!(
            encode_usize(too_big, &mut buf),
            Err(Error::TooLarge(n)) if n == too_big
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn tree_roundtrip() {
        let tree = sample_tree();
        let bytes = encode_tree(&tree).unwrap();
        assert_eq!(decode_tree(&bytes).unwrap(), tree);
        assert_eq!(encoded_tree_size(&tree).unwrap(), bytes.len());
    }

    #[test]
    fn bare_node_is_compact() {
        let bytes = encode_tree(&DataTree::new("pack")).unwrap();
        // 1 len + 4 tag + 1 prop count + 1 child count
        assert_eq!(bytes.len(), 7);
    }

    #[test]
    fn unicode_property_survives() {
        let tree = DataTree::new("revision").with_property("commitMessage", "ドラム修正 ♩");
        let decoded = decode_tree(&encode_tree(&tree).unwrap()).unwrap();
        assert_eq!(decoded.property("commitMessage"), Some("ドラム修正 ♩"));
    }

    #[test]
    fn truncated_input_rejected() {
        let bytes = encode_tree(&sample_tree()).unwrap();
        for cut in [0, 1, bytes.len() / 2, bytes.len() - 1] {
            assert!(decode_tree(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode_tree(&DataTree::new("pack")).unwrap();
        bytes.push(0);
        assert!(matches!(decode_tree(&bytes), Err(Error::TrailingBytes(1))));
    }

    #[test]
    fn invalid_utf8_rejected() {
        // tag of length 1 holding 0xFF
        let bytes = [0x01, 0xFF, 0x00, 0x00];
        assert!(matches!(decode_tree(&bytes), Err(Error::InvalidUtf8(1))));
    }

    #[test]
    fn excessive_depth_rejected() {
        let mut tree = DataTree::new("leaf");
        for _ in 0..(MAX_DEPTH + 1) {
            tree = DataTree::new("n").with_child(tree);
        }
        let bytes = encode_tree(&tree).unwrap();
        assert!(matches!(decode_tree(&bytes), Err(Error::TooDeep(_))));
    }
}
