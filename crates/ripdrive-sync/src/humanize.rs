//! Human-readable byte sizes for progress and summary text

const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Formats a byte count with 1024-based units and at most two decimals
///
/// A unit is chosen only once the value exceeds one of it, so `1024`
/// renders as `1024B` and `1536` as `1.5KB`.
#[must_use]
pub fn format_bytes(bytes: f64) -> String {
    let mut value = bytes;
    let mut unit = "B";
    for candidate in UNITS {
        if value / 1024.0 > 1.0 {
            value /= 1024.0;
            unit = candidate;
        } else {
            break;
        }
    }
    format!("{}{unit}", trim_decimals(value))
}

/// Convenience wrapper for integral sizes
#[must_use]
pub fn format_size(bytes: u64) -> String {
    format_bytes(bytes as f64)
}

fn trim_decimals(value: f64) -> String {
    let formatted = format!("{value:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
