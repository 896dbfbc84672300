//! Minor-unit arithmetic and rendering.
//!
//! Storage and aggregation stay in integer kopiyky; only rendered values are
//! divided by 100. Rounding is half-even so repeated recomputation of the
//! same facts stays byte-identical.

/// Round to 2 decimal places, ties to even.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}

/// Round to 1 decimal place, ties to even.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round_ties_even() / 10.0
}

/// Convert minor units to major (UAH), rounded to 2 decimals.
pub fn minor_to_uah(v: i64) -> f64 {
    round2(v as f64 / 100.0)
}

/// Bucket share of `total`, in percent with one decimal. Zero when the total
/// is not positive.
pub fn share_pct(amount: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    round1(amount / total * 100.0)
}

/// `1 234.56 ₴` — thousands separated by thin spaces, always 2 decimals.
pub fn format_uah(v: f64) -> String {
    let negative = v < 0.0;
    let cents = (v.abs() * 100.0).round_ties_even() as i64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 8);
    let first = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - first) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{frac:02} ₴")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_to_uah_rounds_to_cents() {
        assert_eq!(minor_to_uah(15_000), 150.0);
        assert_eq!(minor_to_uah(-12_345), -123.45);
        assert_eq!(minor_to_uah(1), 0.01);
    }

    #[test]
    fn share_pct_one_decimal() {
        assert_eq!(share_pct(50.0, 150.0), 33.3);
        assert_eq!(share_pct(100.0, 0.0), 0.0);
    }

    #[test]
    fn format_uah_groups_thousands() {
        assert_eq!(format_uah(1234.56), "1 234.56 ₴");
        assert_eq!(format_uah(12.0), "12.00 ₴");
        assert_eq!(format_uah(1_234_567.8), "1 234 567.80 ₴");
        assert_eq!(format_uah(-950.5), "-950.50 ₴");
    }
}
