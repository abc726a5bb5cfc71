//! Receipt renderer
//!
//! Renders an order snapshot into ESC/POS bytes for thermal printers.
//! Pure and deterministic: identical input yields byte-identical output,
//! which the worker relies on when it re-renders after a restart that
//! predated byte persistence.

use comanda_printer::{EscPosBuilder, cp_width, sanitize_text};
use thiserror::Error;

use super::money::{fmt_eur, totals_consistent};
use super::types::{OrderData, OrderItem};

/// Validation failures that block job creation outright
///
/// These are the only errors surfaced synchronously at intake; everything
/// after job creation is absorbed by the retry queue.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Order has no line items")]
    EmptyOrder,

    #[error("Order total must be positive, got {0}")]
    NonPositiveTotal(f64),

    #[error("Totals block does not add up to {0}")]
    InconsistentTotals(f64),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Receipt renderer
///
/// One instance per paper width; stateless otherwise.
pub struct ReceiptRenderer {
    width: usize,
}

impl ReceiptRenderer {
    /// Create a renderer for the given paper width in columns
    ///
    /// Common widths:
    /// - 58mm paper: 32 columns
    /// - 80mm paper: 48 columns
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    /// Render an order to ESC/POS bytes
    pub fn render(&self, order: &OrderData) -> RenderResult<Vec<u8>> {
        self.validate(order)?;

        let mut b = EscPosBuilder::new(self.width);

        self.render_header(&mut b, order);
        self.render_items(&mut b, order);
        self.render_totals(&mut b, order);
        self.render_instructions(&mut b, order);
        self.render_footer(&mut b);

        Ok(b.build())
    }

    /// Fail fast on malformed order data
    fn validate(&self, order: &OrderData) -> RenderResult<()> {
        if order.items.is_empty() {
            return Err(RenderError::EmptyOrder);
        }
        if order.total <= 0.0 || !order.total.is_finite() {
            return Err(RenderError::NonPositiveTotal(order.total));
        }
        if !totals_consistent(
            order.subtotal,
            order.tax,
            order.delivery_fee,
            order.tip,
            order.total,
        ) {
            return Err(RenderError::InconsistentTotals(order.total));
        }
        Ok(())
    }

    /// Venue identity + order metadata
    fn render_header(&self, b: &mut EscPosBuilder, order: &OrderData) {
        b.center();
        b.double_size();
        b.bold();
        b.line(&order.venue.name);
        b.bold_off();
        b.reset_size();
        b.line(&order.venue.address);
        if let Some(ref phone) = order.venue.phone {
            b.line(&format!("Tel: {}", phone));
        }
        b.newline();

        b.left();
        b.bold();
        b.line("RECIBO DE PEDIDO");
        b.bold_off();
        b.line_lr(
            &format!("Pedido: {}", order.order_number),
            &format_timestamp(order.placed_at),
        );
        if let Some(ref name) = order.customer_name {
            b.line(&format!("Cliente: {}", sanitize_text(name)));
        }
        b.sep_double();
    }

    /// Itemized section: `qty x name` left, line total right
    fn render_items(&self, b: &mut EscPosBuilder, order: &OrderData) {
        for item in &order.items {
            self.render_item(b, item);
        }
        b.sep_single();
    }

    fn render_item(&self, b: &mut EscPosBuilder, item: &OrderItem) {
        let left = format!("{} x {}", item.quantity, sanitize_text(&item.name));
        b.line_lr(&left, &fmt_eur(item.total));

        // Unit price sub-line only when it adds information
        if item.quantity > 1 {
            b.line(&format!("    a {}", fmt_eur(item.unit_price)));
        }
    }

    /// Totals block; zero delivery fee and tip lines are omitted
    fn render_totals(&self, b: &mut EscPosBuilder, order: &OrderData) {
        b.line_lr("SUBTOTAL", &fmt_eur(order.subtotal));
        b.line_lr("IVA", &fmt_eur(order.tax));
        if order.delivery_fee > 0.0 {
            b.line_lr("ENVIO", &fmt_eur(order.delivery_fee));
        }
        if order.tip > 0.0 {
            b.line_lr("PROPINA", &fmt_eur(order.tip));
        }
        b.sep_single();

        // TOTAL in double-size: columns are twice as wide, so the layout
        // budget is half the paper width
        b.double_size();
        b.bold();
        let total_val = fmt_eur(order.total);
        let label = "TOTAL";
        let budget = self.width / 2;
        let lw = cp_width(label);
        let vw = cp_width(&total_val);
        if lw + vw < budget {
            b.text(label);
            b.text(&" ".repeat(budget - lw - vw));
            b.line(&total_val);
        } else {
            b.line(&format!("{} {}", label, total_val));
        }
        b.bold_off();
        b.reset_size();
    }

    /// Customer free text, stripped of anything the printer would execute
    fn render_instructions(&self, b: &mut EscPosBuilder, order: &OrderData) {
        let Some(ref raw) = order.special_instructions else {
            return;
        };
        let text = sanitize_text(raw);
        if text.trim().is_empty() {
            return;
        }

        b.newline();
        b.bold();
        b.line("NOTAS:");
        b.bold_off();
        for line in wrap(&text, self.width) {
            b.line(&line);
        }
    }

    fn render_footer(&self, b: &mut EscPosBuilder) {
        b.newline();
        b.center();
        b.line("Gracias por su pedido");
        b.cut_feed(4);
    }
}

impl Default for ReceiptRenderer {
    fn default() -> Self {
        Self::new(48)
    }
}

/// Format unix millis as a receipt timestamp (DD-MM-YYYY HH:MM, UTC)
fn format_timestamp(ts: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(ts) {
        Some(dt) => dt.format("%d-%m-%Y %H:%M").to_string(),
        None => String::from("--"),
    }
}

/// Hard-wrap text to the paper width, respecting existing newlines
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            out.push(String::new());
            continue;
        }
        let chars: Vec<char> = line.chars().collect();
        for chunk in chars.chunks(width.max(1)) {
            out.push(chunk.iter().collect());
        }
    }
    out
}
