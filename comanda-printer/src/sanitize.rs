//! Customer-text sanitization
//!
//! Free text that ends up on a receipt (special instructions, customer
//! names) is attacker-controlled from the printer's point of view: an
//! embedded `ESC`/`GS`/`FS` byte would be executed as a command, not
//! printed. Everything below 0x20 except `\n` is stripped before the text
//! is handed to the builder.

/// Strip printer control characters from customer-supplied text
///
/// Removes all C0 control characters (0x00-0x1F) except `\n`, plus DEL
/// (0x7F). `\r` is dropped rather than kept so CRLF input collapses to a
/// single newline. Pure and idempotent.
pub fn sanitize_text(s: &str) -> String {
    s.chars()
        .filter(|&c| c == '\n' || (c >= ' ' && c != '\u{7f}'))
        .collect()
}
