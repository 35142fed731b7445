//! Amount presentation helpers.
//!
//! Display-only: lakh/crore digit grouping and negatives in parentheses.
//! Stored values are never touched by this layer.

use num_format::{Buffer, CustomFormat, Grouping};
use once_cell::sync::Lazy;

static INDIAN_FORMAT: Lazy<CustomFormat> = Lazy::new(|| {
    CustomFormat::builder()
        .grouping(Grouping::Indian)
        .separator(",")
        .build()
        .expect("valid lakh/crore format")
});

/// Format an amount with Indian (lakh/crore) digit grouping and two
/// decimal places; negative amounts render in parentheses.
///
/// `-1234567.5` becomes `"(12,34,567.50)"`.
pub fn format_amount(amount: f64) -> String {
    let negative = amount < 0.0;
    let absolute = amount.abs();

    // Round to paise first so 0.999 carries into the integer part
    let total_paise = (absolute * 100.0).round() as u64;
    let whole = total_paise / 100;
    let fraction = total_paise % 100;

    let mut buffer = Buffer::default();
    buffer.write_formatted(&whole, &*INDIAN_FORMAT);

    let body = format!("{}.{:02}", buffer.as_str(), fraction);
    if negative {
        format!("({})", body)
    } else {
        body
    }
}

/// Format a balance cell: zero and positive plain, overspend in
/// parentheses.
pub fn format_balance(balance: f64) -> String {
    format_amount(balance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_amounts() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(123.0), "123.00");
        assert_eq!(format_amount(1_234.5), "1,234.50");
    }

    #[test]
    fn lakh_crore_grouping() {
        assert_eq!(format_amount(50_000.0), "50,000.00");
        assert_eq!(format_amount(100_000.0), "1,00,000.00");
        assert_eq!(format_amount(1_234_567.89), "12,34,567.89");
        assert_eq!(format_amount(123_456_789.0), "12,34,56,789.00");
    }

    #[test]
    fn negatives_in_parentheses() {
        assert_eq!(format_amount(-50_000.0), "(50,000.00)");
        assert_eq!(format_balance(-1_234_567.5), "(12,34,567.50)");
    }

    #[test]
    fn rounding_carries() {
        assert_eq!(format_amount(999.999), "1,000.00");
    }
}
