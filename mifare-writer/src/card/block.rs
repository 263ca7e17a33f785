//! Block codec
//!
//! Converts between logical text and the 16-byte block format of a MIFARE
//! Classic card. Encoding only truncates; padding to the full block size is
//! left to the transport that puts the bytes on the wire.

/// Size of one data block in bytes
pub const BLOCK_SIZE: usize = 16;

/// Suffix the card library appends when block content is not clean text
pub const HEX_DUMP_MARKER: &str = "[Hex:";

/// Prefix of error strings reported by the card library in place of data
pub const ERROR_PREFIX: &str = "ERROR";

/// Encode text for a single block
///
/// Truncates on encoded bytes, so a multi-byte character straddling the
/// 16-byte boundary is cut. No padding is added.
pub fn encode(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    bytes[..bytes.len().min(BLOCK_SIZE)].to_vec()
}

/// Decode raw block bytes into text
///
/// Bytes are read up to the first NUL, like a C string. Invalid UTF-8 is
/// replaced rather than rejected. A trailing `[Hex: ..]` diagnostic is cut off
/// together with the whitespace before it. Strings starting with `ERROR` are
/// returned untouched.
pub fn decode(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let text = String::from_utf8_lossy(&raw[..end]).into_owned();

    if text.starts_with(ERROR_PREFIX) {
        return text;
    }

    strip_hex_dump(&text).to_string()
}

/// Remove a `[Hex: ..]` suffix and the whitespace around the remaining text
pub fn strip_hex_dump(text: &str) -> &str {
    match text.find(HEX_DUMP_MARKER) {
        Some(idx) => text[..idx].trim(),
        None => text,
    }
}

/// Zero-pad (or cut) a payload to exactly one block
pub fn pad(payload: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    let len = payload.len().min(BLOCK_SIZE);
    block[..len].copy_from_slice(&payload[..len]);
    block
}

/// Render a block the way the card library does: printable text as-is,
/// anything else (a blank block included) followed by a hex dump of the
/// full block
pub fn render_with_hex(block: &[u8]) -> String {
    let end = block.iter().position(|&b| b == 0).unwrap_or(block.len());
    let text = &block[..end];
    let printable = text.iter().all(|b| b.is_ascii_graphic() || *b == b' ');
    let padding_clean = block[end..].iter().all(|&b| b == 0);

    if printable && padding_clean && end > 0 {
        return String::from_utf8_lossy(text).into_owned();
    }

    let visible: String = text
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect();
    let dump: Vec<String> = block.iter().map(|b| format!("{:02X}", b)).collect();
    format!("{} {} {}]", visible, HEX_DUMP_MARKER, dump.join(" "))
}
