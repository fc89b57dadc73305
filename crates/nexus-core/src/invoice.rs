//! # Invoice Sequencer
//!
//! Invoice and purchase-order number formats.
//!
//! ```text
//! advance("INV-0099")  → "INV-0100"   last digit run, width kept
//! advance("SI-9")      → "SI-10"      width grows when it must
//! advance("A12B")      → "A13B"       trailing non-digits kept
//! advance("INV")       → "INV-1"      no digits: "-1" appended
//! ```

use chrono::{DateTime, Utc};

/// Starting invoice number for a fresh deployment.
pub const DEFAULT_INVOICE_SEED: &str = "1001";

/// Increments the last run of digits in `current`, keeping its width.
///
/// ## Example
/// ```rust
/// use nexus_core::invoice::advance;
///
/// assert_eq!(advance("INV-0099"), "INV-0100");
/// assert_eq!(advance("INV"), "INV-1");
/// ```
pub fn advance(current: &str) -> String {
    let bytes = current.as_bytes();
    let Some(end) = bytes.iter().rposition(|b| b.is_ascii_digit()).map(|i| i + 1) else {
        return format!("{}-1", current);
    };
    let start = bytes[..end]
        .iter()
        .rposition(|b| !b.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);

    let digits = &current[start..end];
    let incremented = increment_decimal(digits);

    format!("{}{}{}", &current[..start], incremented, &current[end..])
}

/// Adds one to a string of ASCII digits, carrying as far as needed.
///
/// Works on the text so digit runs longer than any integer type still
/// advance correctly.
fn increment_decimal(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for b in out.iter_mut().rev() {
        if *b == b'9' {
            *b = b'0';
        } else {
            *b += 1;
            return String::from_utf8_lossy(&out).into_owned();
        }
    }
    // All nines: widen by one
    let mut widened = String::with_capacity(out.len() + 1);
    widened.push('1');
    widened.push_str(&String::from_utf8_lossy(&out));
    widened
}

/// Purchase order number: `PO-YYYYMMDD-NNNN`, `sequence` counting from 1
/// within the day.
pub fn po_number(date: DateTime<Utc>, sequence: u32) -> String {
    format!("PO-{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// Prefix shared by all PO numbers generated on `date`.
pub fn po_number_prefix(date: DateTime<Utc>) -> String {
    format!("PO-{}-", date.format("%Y%m%d"))
}
