//! Human-readable byte sizes.

const UNITS: [&str; 8] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"];

/// Format a byte count in binary units with no decimals, e.g. `12KiB`.
pub fn format_size(bytes: u64) -> String {
    format_size_prec(bytes, 0)
}

/// Format a byte count in binary units with `prec` decimals.
fn format_size_prec(bytes: u64, prec: usize) -> String {
    let mut num = bytes as f64;
    for unit in UNITS {
        if num.abs() < 1024.0 {
            return format!("{:.prec$}{}B", num, unit, prec = prec);
        }
        num /= 1024.0;
    }
    format!("{:.prec$}YiB", num, prec = prec)
}
