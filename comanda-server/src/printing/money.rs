//! Money helpers using rust_decimal for precision
//!
//! Order amounts arrive as `f64` (the wire format of the order snapshot) and
//! are converted to `Decimal` for any arithmetic or comparison, then
//! formatted for the receipt. Receipts use the Spanish convention: comma
//! decimal separator, trailing Euro sign.

use rust_decimal::prelude::*;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Convert an f64 amount to Decimal
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Format an amount for the receipt: two decimals, comma separator, Euro sign
///
/// `34.1` -> `"34,10 €"`
pub fn fmt_eur(value: f64) -> String {
    let rounded = to_decimal(value).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2} €", rounded).replace('.', ",")
}

/// Check that the totals block adds up: subtotal + tax + delivery + tip
/// must equal total within [`MONEY_TOLERANCE`]
pub fn totals_consistent(subtotal: f64, tax: f64, delivery_fee: f64, tip: f64, total: f64) -> bool {
    let expected = to_decimal(subtotal) + to_decimal(tax) + to_decimal(delivery_fee) + to_decimal(tip);
    (expected - to_decimal(total)).abs() <= MONEY_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_eur() {
        assert_eq!(fmt_eur(34.1), "34,10 €");
        assert_eq!(fmt_eur(0.0), "0,00 €");
        assert_eq!(fmt_eur(7.005), "7,01 €");
        assert_eq!(fmt_eur(1250.5), "1250,50 €");
    }

    #[test]
    fn test_totals_consistent() {
        assert!(totals_consistent(28.50, 2.85, 1.95, 0.80, 34.10));
        // within one cent
        assert!(totals_consistent(28.50, 2.85, 1.95, 0.80, 34.11));
        assert!(!totals_consistent(28.50, 2.85, 1.95, 0.80, 35.00));
    }
}
