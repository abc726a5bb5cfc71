//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data.

use crate::encoding::{cp_width, encode_cp1252};

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers.
/// All text is converted to CP1252 encoding by [`EscPosBuilder::build`].
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in columns
    ///
    /// Common widths:
    /// - 58mm paper: 32 columns
    /// - 80mm paper: 48 columns
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(4096);
        // Initialize printer (ESC @)
        buf.extend_from_slice(&[0x1B, 0x40]);
        Self { buf, width }
    }

    /// Get the configured paper width
    pub fn width(&self) -> usize {
        self.width
    }

    // === Text Output ===

    /// Write raw text (will be CP1252 encoded)
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    /// Print and feed n lines (ESC d n)
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x64, lines]);
        self
    }

    // === Alignment ===

    /// Align text to center
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    /// Align text to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    /// Align text to right
    pub fn right(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x02]);
        self
    }

    // === Text Style ===

    /// Enable bold text
    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    /// Disable bold text
    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    /// Double width and height
    pub fn double_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x11]);
        self
    }

    /// Double height only
    pub fn double_height(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x01]);
        self
    }

    /// Reset to normal size
    pub fn reset_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x00]);
        self
    }

    // === Separators ===

    /// Print a line of '=' characters
    pub fn sep_double(&mut self) -> &mut Self {
        self.line(&"=".repeat(self.width))
    }

    /// Print a line of '-' characters
    pub fn sep_single(&mut self) -> &mut Self {
        self.line(&"-".repeat(self.width))
    }

    // === Layout Helpers ===

    /// Print left and right text on the same line
    ///
    /// Left text is left-aligned, right text is right-aligned,
    /// with spaces filling the gap. A left text too long for the line is
    /// truncated so the right text keeps its column.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let rw = cp_width(right);

        if rw + 1 >= self.width {
            // Degenerate width, just print with a space
            self.text(left);
            self.text(" ");
            self.line(right);
            return self;
        }

        let budget = self.width - rw - 1;
        let left = crate::encoding::truncate_cp(left, budget);
        let lw = cp_width(&left);
        let spaces = self.width - lw - rw;
        self.text(&left);
        self.text(&" ".repeat(spaces));
        self.line(right);
        self
    }

    // === Paper Control ===

    /// Cut paper (full cut, GS V 0)
    pub fn cut(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x00]);
        self
    }

    /// Full cut with feed — feeds n lines then cuts.
    /// Uses GS V 66 n, which lets the printer manage cutter-to-head distance.
    /// This produces less top-margin waste on the next ticket compared to
    /// separate feed() + cut() calls.
    pub fn cut_feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x42, lines]);
        self
    }

    // === Raw Commands ===

    /// Write raw bytes directly
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    // === Build ===

    /// Build the final byte buffer with CP1252 encoding
    ///
    /// This converts all UTF-8 text to CP1252 while preserving ESC/POS
    /// commands.
    pub fn build(self) -> Vec<u8> {
        encode_cp1252(&self.buf)
    }

    /// Build without code-page conversion (for debugging or ASCII-only content)
    pub fn build_raw(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(48)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basic() {
        let mut b = EscPosBuilder::new(32);
        b.center()
            .double_size()
            .line("La Taberna")
            .reset_size()
            .left()
            .line("Calle Mayor 12");

        let data = b.build_raw();
        assert!(!data.is_empty());
        // Starts with INIT
        assert_eq!(&data[..2], &[0x1B, 0x40]);
    }

    #[test]
    fn test_line_lr() {
        let mut b = EscPosBuilder::new(20);
        b.line_lr("2 x Paella", "24,00");

        let data = b.build_raw();
        let s = String::from_utf8_lossy(&data);
        assert!(s.contains("2 x Paella"));
        assert!(s.contains("24,00\n"));
        // Line fills the configured width exactly
        let line = s.lines().next().unwrap();
        // strip the leading ESC @ bytes
        assert_eq!(line.trim_start_matches(['\u{1b}', '@']).len(), 20);
    }

    #[test]
    fn test_line_lr_truncates_long_left() {
        let mut b = EscPosBuilder::new(16);
        b.line_lr("a very long item name that overflows", "9,99");

        let data = b.build_raw();
        let s = String::from_utf8_lossy(&data);
        let line = s.lines().next().unwrap().trim_start_matches(['\u{1b}', '@']);
        assert_eq!(line.len(), 16);
        assert!(line.ends_with("9,99"));
    }

    #[test]
    fn test_separators() {
        let mut b = EscPosBuilder::new(10);
        b.sep_double();

        let data = b.build_raw();
        let s = String::from_utf8_lossy(&data);
        assert!(s.contains("=========="));
    }

    #[test]
    fn test_cut_feed() {
        let mut b = EscPosBuilder::new(48);
        b.cut_feed(3);
        let data = b.build_raw();
        assert!(data.windows(4).any(|w| w == [0x1D, 0x56, 0x42, 3]));
    }
}
