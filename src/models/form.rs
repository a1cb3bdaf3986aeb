//! Form ingestion boundary.
//!
//! Multipart text fields arrive as raw strings. The coercion rules that turn
//! them into typed values live here so the orchestrator only ever sees
//! already-typed requests.

use crate::models::attachment::Attachment;

/// Raw fields collected from a create submission.
#[derive(Debug, Default)]
pub struct RecordForm {
    pub id: Option<String>,
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub image: Option<Attachment>,
}

/// A create request with every field coerced to its final type.
#[derive(Debug, Clone)]
pub struct CreateRecordRequest {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub attachment: Option<Attachment>,
}

impl RecordForm {
    /// Apply the coercion rules: numeric fields fall back to 0, a missing name
    /// becomes empty.
    pub fn into_request(self) -> CreateRecordRequest {
        CreateRecordRequest {
            id: parse_int_or(self.id.as_deref(), 0),
            name: self.name.unwrap_or_default(),
            quantity: parse_int_or(self.quantity.as_deref(), 0),
            attachment: self.image,
        }
    }
}

/// Parse the leading decimal integer of `raw`, or return `default`.
///
/// Leading whitespace and a single `+`/`-` sign are accepted; parsing stops at
/// the first non-digit, so `"12abc"` yields 12 and `"3.9"` yields 3. Values
/// with no leading digits, or that overflow `i64`, yield `default`.
pub fn parse_int_or(raw: Option<&str>, default: i64) -> i64 {
    let Some(raw) = raw else {
        return default;
    };

    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return default;
    }

    let digits = &rest[..digits_len];
    let parsed = if negative {
        format!("-{digits}").parse::<i64>()
    } else {
        digits.parse::<i64>()
    };
    parsed.unwrap_or(default)
}

/// Strict integer parse used for identifiers that select existing records.
pub fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}
