//! Display formatting for key-number values.
//!
//! The store never interprets values, so producers format with these before
//! merging.

/// `0.342` → `"34.2%"`.
pub fn percent(ratio: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, ratio * 100.0)
}

/// Fixed decimals with `,` between thousands: `1234567.0` → `"1,234,567.0"`.
pub fn grouped(value: f64, decimals: usize) -> String {
    let raw = format!("{:.*}", decimals, value);
    if !value.is_finite() {
        return raw;
    }
    let (sign, body) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw.as_str()),
    };
    let (int_part, frac_part) = match body.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (body, None),
    };

    let mut out = String::with_capacity(raw.len() + int_part.len() / 3);
    out.push_str(sign);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// `216_540_000.0` → `"216.5 million"`.
pub fn millions(value: f64, decimals: usize) -> String {
    format!("{} million", grouped(value / 1e6, decimals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_scales_ratio() {
        assert_eq!(percent(0.342, 1), "34.2%");
        assert_eq!(percent(0.41666, 1), "41.7%");
        assert_eq!(percent(0.00123, 2), "0.12%");
        assert_eq!(percent(1.0, 0), "100%");
    }

    #[test]
    fn grouped_inserts_separators() {
        assert_eq!(grouped(1234567.0, 1), "1,234,567.0");
        assert_eq!(grouped(999.0, 0), "999");
        assert_eq!(grouped(1000.0, 0), "1,000");
        assert_eq!(grouped(-1234.5, 1), "-1,234.5");
        assert_eq!(grouped(0.25, 2), "0.25");
        assert_eq!(grouped(f64::INFINITY, 0), "inf");
    }

    #[test]
    fn millions_suffix() {
        assert_eq!(millions(216_540_000.0, 1), "216.5 million");
        assert_eq!(millions(3_456_700_000.0, 1), "3,456.7 million");
    }
}
