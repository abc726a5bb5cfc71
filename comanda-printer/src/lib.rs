//! # comanda-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building
//! - CP1252 encoding for Western-European receipt text
//! - Customer-text sanitization (control-sequence stripping)
//! - Network printing (TCP port 9100)
//!
//! Business logic (WHAT to print) should stay in application code:
//! - Receipt rendering and job scheduling → comanda-server
//!
//! ## Example
//!
//! ```ignore
//! use comanda_printer::{EscPosBuilder, NetworkPrinter, Printer};
//!
//! // Build ESC/POS content
//! let mut builder = EscPosBuilder::new(48);
//! builder.center();
//! builder.double_size();
//! builder.line("La Taberna");
//! builder.reset_size();
//! builder.sep_double();
//! builder.left();
//! builder.line_lr("2 x Paella", "24,00 €");
//! builder.cut_feed(3);
//!
//! // Send to network printer
//! let printer = NetworkPrinter::new("192.168.1.100", 9100)?;
//! printer.print(&builder.build()).await?;
//! ```

mod encoding;
mod error;
mod escpos;
mod printer;
mod sanitize;

// Re-exports
pub use encoding::{cp_width, encode_cp1252, pad_cp, truncate_cp};
pub use error::{PrintError, PrintResult};
pub use escpos::EscPosBuilder;
pub use printer::{NetworkPrinter, Printer};
pub use sanitize::sanitize_text;
