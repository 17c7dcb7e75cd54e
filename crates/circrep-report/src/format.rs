use std::sync::LazyLock;

use regex::Regex;

static NUMERIC_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d.]+").expect("valid numeric-run regex"));

/// Label every `FTTx` circuit is reported with.
pub const FTTX_LABEL: &str = "20 Mbps.";

/// Formats an integer with `,` thousands separators (`1234567` → `1,234,567`).
#[must_use]
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Normalises a bandwidth descriptor into a display label.
///
/// - contains `FTTx` → `"20 Mbps."`
/// - first run of digits/dots parses as a number → `"<integer> Mbps."`
/// - otherwise the descriptor unchanged
#[must_use]
pub fn bandwidth_label(descriptor: &str) -> String {
    if descriptor.contains("FTTx") {
        return FTTX_LABEL.to_string();
    }

    NUMERIC_RUN
        .find(descriptor)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .map_or_else(
            || descriptor.to_string(),
            |n| format!("{} Mbps.", truncate(n)),
        )
}

/// Truncates toward zero, saturating at the `i64` range.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn truncate(value: f64) -> i64 {
    value.trunc() as i64
}
