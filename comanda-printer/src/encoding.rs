//! CP1252 encoding utilities for Western-European thermal printers
//!
//! Receipt printers sold into European venues interpret text in a single-byte
//! code page; Windows-1252 (ESC t 16 on Epson-compatible firmware) covers the
//! accented Latin characters and the Euro sign that receipts need.
//! This module provides utilities for:
//! - Calculating column widths
//! - Truncating/padding strings to a column budget
//! - Converting UTF-8 to CP1252 while preserving ESC/POS commands

/// Get the printed column width of a string
///
/// Every CP1252-encodable character occupies one column; characters outside
/// the code page are replaced by `?` at encode time and also count one.
pub fn cp_width(s: &str) -> usize {
    s.chars().count()
}

/// Truncate a string to fit within a column budget
pub fn truncate_cp(s: &str, max_width: usize) -> String {
    s.chars().take(max_width).collect()
}

/// Pad a string to a specific column width
///
/// If the string is longer than the width, it will be truncated.
pub fn pad_cp(s: &str, width: usize, align_right: bool) -> String {
    let current_width = cp_width(s);
    if current_width >= width {
        return truncate_cp(s, width);
    }
    let spaces = width - current_width;
    if align_right {
        format!("{}{}", " ".repeat(spaces), s)
    } else {
        format!("{}{}", s, " ".repeat(spaces))
    }
}

/// Convert mixed UTF-8 content (with ESC/POS commands) to CP1252
///
/// ASCII bytes (0x00-0x7F) pass through exactly as is, which protects
/// ESC/POS command sequences from being corrupted. Only bytes >= 0x80 are
/// treated as UTF-8 sequences and re-encoded as Windows-1252; characters
/// with no CP1252 mapping come out as `?`.
///
/// The printer is switched to code page 16 (WPC1252) at the start, and the
/// selection is re-issued after any embedded INIT command (ESC @), which
/// resets the code page on real hardware.
pub fn encode_cp1252(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len() + 8);

    // ESC t 16 - select character code table WPC1252
    result.extend_from_slice(&[0x1B, 0x74, 0x10]);

    let mut buffer = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        // INIT (ESC @) resets the code table; re-select after it
        if b == 0x1B && i + 1 < bytes.len() && bytes[i + 1] == 0x40 {
            flush_buffer(&mut buffer, &mut result);

            result.extend_from_slice(&[0x1B, 0x40]);
            result.extend_from_slice(&[0x1B, 0x74, 0x10]);

            i += 2;
            continue;
        }

        if b < 128 {
            // ASCII byte (command or ASCII text)
            flush_buffer(&mut buffer, &mut result);
            result.push(b);
        } else {
            // Non-ASCII byte (part of a UTF-8 sequence)
            buffer.push(b);
        }
        i += 1;
    }

    flush_buffer(&mut buffer, &mut result);

    result
}

/// Flush the non-ASCII buffer, converting UTF-8 to CP1252
fn flush_buffer(buffer: &mut Vec<u8>, result: &mut Vec<u8>) {
    if buffer.is_empty() {
        return;
    }

    let s = String::from_utf8_lossy(buffer);
    let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(&s);
    result.extend_from_slice(&encoded);
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cp_width() {
        assert_eq!(cp_width("hello"), 5);
        assert_eq!(cp_width("Café"), 4);
        assert_eq!(cp_width("12,50 €"), 7);
    }

    #[test]
    fn test_truncate_cp() {
        assert_eq!(truncate_cp("hello world", 5), "hello");
        assert_eq!(truncate_cp("Jamón ibérico", 6), "Jamón ");
        assert_eq!(truncate_cp("ok", 5), "ok");
    }

    #[test]
    fn test_pad_cp() {
        assert_eq!(pad_cp("hi", 5, false), "hi   ");
        assert_eq!(pad_cp("hi", 5, true), "   hi");
        assert_eq!(pad_cp("hello world", 5, false), "hello");
    }

    #[test]
    fn test_encode_preserves_commands() {
        // ESC a 1 (center) must survive encoding untouched
        let input = [0x1B, 0x61, 0x01, b'o', b'k'];
        let out = encode_cp1252(&input);
        // skip the leading code page select
        assert_eq!(&out[3..], &input[..]);
    }

    #[test]
    fn test_encode_euro_sign() {
        let out = encode_cp1252("€".as_bytes());
        // CP1252 maps the Euro sign to 0x80
        assert_eq!(out[3..], [0x80]);
    }

    #[test]
    fn test_encode_reselects_after_init() {
        let mut input = vec![b'a'];
        input.extend_from_slice(&[0x1B, 0x40]); // INIT
        input.push(b'b');
        let out = encode_cp1252(&input);
        // ESC t 16 must appear again right after ESC @
        let needle = [0x1B, 0x40, 0x1B, 0x74, 0x10];
        assert!(out.windows(needle.len()).any(|w| w == needle));
    }
}
