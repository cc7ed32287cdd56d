//! Human-readable byte sizes.

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Renders a byte count with a base-1024 unit and at most two decimals.
///
/// Trailing zeros are trimmed, so `1536` renders as `1.5 KB` and `2048` as
/// `2 KB`. Sizes beyond the largest unit stay in gigabytes.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_owned();
    }

    let mut exponent = 0;
    let mut threshold = 1024_u64;
    while exponent + 1 < UNITS.len() && bytes >= threshold {
        exponent += 1;
        threshold = threshold.saturating_mul(1024);
    }

    let scaled = bytes as f64 / 1024_f64.powi(exponent as i32);
    let rounded = format!("{scaled:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[exponent])
}
