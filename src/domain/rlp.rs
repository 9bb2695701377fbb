//! # RLP codec (part of C2)
//!
//! Recursive-Length-Prefix encoding for byte strings and lists, per the
//! Ethereum wire format. The trie only ever encodes byte strings and lists
//! of byte-strings-or-lists (no integers), so the codec is scoped to that.

use crate::domain::TrieError;

/// A single decoded RLP item: either a byte string or a list of items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    pub fn as_bytes(&self) -> Result<&[u8], TrieError> {
        match self {
            RlpItem::Bytes(b) => Ok(b),
            RlpItem::List(_) => Err(TrieError::Codec("expected byte string, got list".into())),
        }
    }

    pub fn as_list(&self) -> Result<&[RlpItem], TrieError> {
        match self {
            RlpItem::List(items) => Ok(items),
            RlpItem::Bytes(_) => Err(TrieError::Codec("expected list, got byte string".into())),
        }
    }

    /// True iff this item decoded from a list header rather than a string
    /// header — distinguishes an inlined raw node from a hash reference
    /// without the caller having to inspect the leading byte itself.
    pub fn is_list(&self) -> bool {
        matches!(self, RlpItem::List(_))
    }
}

/// RLP-encode a byte string.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else if data.len() < 56 {
        let mut result = vec![0x80 + data.len() as u8];
        result.extend_from_slice(data);
        result
    } else {
        let len_bytes = encode_length(data.len());
        let mut result = vec![0xb7 + len_bytes.len() as u8];
        result.extend_from_slice(&len_bytes);
        result.extend_from_slice(data);
        result
    }
}

/// Wrap already-RLP-encoded items in a list header. Unlike `encode_bytes`,
/// this does not re-encode the items — each entry may itself be a nested
/// list (an inlined child node embeds its own list encoding directly).
pub fn encode_list(encoded_items: &[Vec<u8>]) -> Vec<u8> {
    let total_len: usize = encoded_items.iter().map(|e| e.len()).sum();

    let mut result = Vec::with_capacity(total_len + 9);
    if total_len < 56 {
        result.push(0xc0 + total_len as u8);
    } else {
        let len_bytes = encode_length(total_len);
        result.push(0xf7 + len_bytes.len() as u8);
        result.extend_from_slice(&len_bytes);
    }
    for item in encoded_items {
        result.extend_from_slice(item);
    }
    result
}

fn encode_length(len: usize) -> Vec<u8> {
    let bytes = len.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    bytes[start..].to_vec()
}

/// Decode a single RLP item from the front of `data`, returning it along
/// with the number of bytes consumed.
pub fn decode(data: &[u8]) -> Result<(RlpItem, usize), TrieError> {
    let first = *data
        .first()
        .ok_or_else(|| TrieError::Codec("empty input".into()))?;

    match first {
        0x00..=0x7f => Ok((RlpItem::Bytes(vec![first]), 1)),

        0x80..=0xb7 => {
            let len = (first - 0x80) as usize;
            let body = take(data, 1, len)?;
            Ok((RlpItem::Bytes(body.to_vec()), 1 + len))
        }

        0xb8..=0xbf => {
            let len_of_len = (first - 0xb7) as usize;
            let len = decode_length(take(data, 1, len_of_len)?)?;
            let body = take(data, 1 + len_of_len, len)?;
            Ok((RlpItem::Bytes(body.to_vec()), 1 + len_of_len + len))
        }

        0xc0..=0xf7 => {
            let len = (first - 0xc0) as usize;
            let body = take(data, 1, len)?;
            Ok((RlpItem::List(decode_items(body)?), 1 + len))
        }

        0xf8..=0xff => {
            let len_of_len = (first - 0xf7) as usize;
            let len = decode_length(take(data, 1, len_of_len)?)?;
            let body = take(data, 1 + len_of_len, len)?;
            Ok((RlpItem::List(decode_items(body)?), 1 + len_of_len + len))
        }
    }
}

/// Decode `data` as a single top-level item, requiring every byte be
/// consumed (no trailing garbage). This is what node bodies pulled from the
/// store must satisfy.
pub fn decode_exact(data: &[u8]) -> Result<RlpItem, TrieError> {
    let (item, consumed) = decode(data)?;
    if consumed != data.len() {
        return Err(TrieError::Codec(format!(
            "trailing bytes after top-level item: consumed {consumed} of {}",
            data.len()
        )));
    }
    Ok(item)
}

fn decode_items(mut data: &[u8]) -> Result<Vec<RlpItem>, TrieError> {
    let mut items = Vec::new();
    while !data.is_empty() {
        let (item, consumed) = decode(data)?;
        items.push(item);
        data = &data[consumed..];
    }
    Ok(items)
}

fn decode_length(bytes: &[u8]) -> Result<usize, TrieError> {
    if bytes.is_empty() || bytes.len() > std::mem::size_of::<usize>() {
        return Err(TrieError::Codec("invalid length header".into()));
    }
    let mut buf = [0u8; std::mem::size_of::<usize>()];
    buf[std::mem::size_of::<usize>() - bytes.len()..].copy_from_slice(bytes);
    Ok(usize::from_be_bytes(buf))
}

fn take(data: &[u8], start: usize, len: usize) -> Result<&[u8], TrieError> {
    data.get(start..start + len)
        .ok_or_else(|| TrieError::Codec("truncated rlp input".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_bytes_roundtrip() {
        for data in [vec![], vec![0x01], vec![0x7f], vec![0x80], b"dog".to_vec()] {
            let encoded = encode_bytes(&data);
            let item = decode_exact(&encoded).unwrap();
            assert_eq!(item.as_bytes().unwrap(), data.as_slice());
        }
    }

    #[test]
    fn encode_decode_long_string() {
        let data = vec![0xAB; 200];
        let encoded = encode_bytes(&data);
        assert_eq!(encoded[0], 0xb8);
        let item = decode_exact(&encoded).unwrap();
        assert_eq!(item.as_bytes().unwrap(), data.as_slice());
    }

    #[test]
    fn encode_decode_list_roundtrip() {
        let a = encode_bytes(b"do");
        let b = encode_bytes(b"verb");
        let list = encode_list(&[a, b]);
        let item = decode_exact(&list).unwrap();
        let items = item.as_list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_bytes().unwrap(), b"do");
        assert_eq!(items[1].as_bytes().unwrap(), b"verb");
    }

    #[test]
    fn nested_list_is_list_not_bytes() {
        let inner = encode_list(&[encode_bytes(b"x")]);
        let outer = encode_list(&[inner.clone(), encode_bytes(b"y")]);
        let item = decode_exact(&outer).unwrap();
        let items = item.as_list().unwrap();
        assert!(items[0].is_list());
        assert!(!items[1].is_list());
    }

    #[test]
    fn truncated_input_errors() {
        let encoded = encode_bytes(b"dog");
        assert!(decode_exact(&encoded[..2]).is_err());
    }

    #[test]
    fn empty_string_is_single_0x80_byte() {
        assert_eq!(encode_bytes(&[]), vec![0x80]);
    }
}
