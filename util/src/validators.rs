use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::code::CODE_LENGTH;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]+$").expect("valid code regex"));

/// Accepts `local@domain.tld`-shaped strings: one `@`, no whitespace, and a dot after the `@`.
pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && EMAIL_RE.is_match(email)
}

/// Trims and uppercases a code as typed by a student.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// True iff the uppercased code is exactly six ASCII letters or digits.
pub fn is_valid_code(code: &str) -> bool {
    let upper = code.to_uppercase();
    upper.chars().count() == CODE_LENGTH && CODE_RE.is_match(&upper)
}

/// A check-in is late only when it lands strictly after the threshold; one
/// exactly on the boundary is still on time.
pub fn is_late_check_in(
    check_in: DateTime<Utc>,
    session_start: DateTime<Utc>,
    threshold_minutes: u32,
) -> bool {
    check_in - session_start > Duration::minutes(i64::from(threshold_minutes))
}
