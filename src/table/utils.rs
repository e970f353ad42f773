/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Coerce a spreadsheet cell to a number.
///
/// Thousands separators and stray spaces are dropped. Blank cells,
/// placeholders (`-`, `n/a`, `nan`) and anything else unparseable give `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = clean_str(raw)
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}' | '\n' | '\r'))
        .collect();
    match cleaned.to_ascii_lowercase().as_str() {
        "" | "-" | "n/a" | "na" | "nan" => None,
        _ => cleaned.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}
