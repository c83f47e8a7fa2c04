//! Text field codec.
//!
//! Windows "XP" tags (XPKeywords, XPComment, ...) hold null-terminated
//! UTF-16LE stored as BYTE arrays. UserComment holds an 8-byte character-code
//! prefix followed by the text.

use super::tags::ByteOrder;

const USER_COMMENT_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const USER_COMMENT_UNICODE: &[u8; 8] = b"UNICODE\0";
const USER_COMMENT_JIS: &[u8; 8] = b"JIS\0\0\0\0\0";
const USER_COMMENT_UNDEFINED: &[u8; 8] = &[0; 8];

/// Encode a string as UTF-16LE bytes with one trailing null code unit.
pub fn encode_utf16le(s: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
    bytes.extend_from_slice(&[0, 0]);
    bytes
}

/// Decode null-terminated UTF-16LE bytes.
///
/// Returns `None` for an odd byte length or unpaired surrogates. Trailing
/// null code units are stripped.
pub fn decode_utf16le(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    decode_utf16(bytes, ByteOrder::LittleEndian)
}

fn decode_utf16(bytes: &[u8], order: ByteOrder) -> Option<String> {
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| match order {
            ByteOrder::LittleEndian => u16::from_le_bytes([c[0], c[1]]),
            ByteOrder::BigEndian => u16::from_be_bytes([c[0], c[1]]),
        })
        .collect();
    while units.last() == Some(&0) {
        units.pop();
    }
    String::from_utf16(&units).ok()
}

/// Encode a UserComment value: ASCII prefix for 7-bit text, UNICODE otherwise.
pub fn encode_user_comment(s: &str, order: ByteOrder) -> Vec<u8> {
    if s.is_ascii() {
        let mut data = USER_COMMENT_ASCII.to_vec();
        data.extend_from_slice(s.as_bytes());
        data
    } else {
        let mut data = USER_COMMENT_UNICODE.to_vec();
        data.extend(s.encode_utf16().flat_map(|c| match order {
            ByteOrder::LittleEndian => c.to_le_bytes(),
            ByteOrder::BigEndian => c.to_be_bytes(),
        }));
        data
    }
}

/// Decode a UserComment value.
///
/// UNICODE text follows the TIFF byte order. Data without a recognized
/// prefix is accepted when it is valid UTF-8; JIS is not supported.
pub fn decode_user_comment(bytes: &[u8], order: ByteOrder) -> Option<String> {
    let text = if bytes.len() >= 8 {
        let (prefix, body) = bytes.split_at(8);
        if prefix == USER_COMMENT_ASCII || prefix == USER_COMMENT_UNDEFINED {
            std::str::from_utf8(body).ok()?.to_string()
        } else if prefix == USER_COMMENT_UNICODE {
            if body.len() % 2 != 0 {
                return None;
            }
            decode_utf16(body, order)?
        } else if prefix == USER_COMMENT_JIS {
            return None;
        } else {
            std::str::from_utf8(bytes).ok()?.to_string()
        }
    } else {
        std::str::from_utf8(bytes).ok()?.to_string()
    };

    Some(text.trim_end_matches(['\0', ' ']).to_string())
}
