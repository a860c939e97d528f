//! Custom Askama template filters.

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a number of seconds as `m:ss`, e.g. the OTP resend cooldown.
///
/// Usage in templates: `{{ resend_in|mm_ss }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn mm_ss(secs: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_mm_ss(secs.to_string().parse().unwrap_or(0)))
}

fn format_mm_ss(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mm_ss() {
        assert_eq!(format_mm_ss(120), "2:00");
        assert_eq!(format_mm_ss(65), "1:05");
        assert_eq!(format_mm_ss(9), "0:09");
    }
}
