//! Number parsing and display formatting shared by the field synchronizer and
//! the export table.

/// Parses user-typed numeric text, tolerating currency symbols, thousands
/// separators and a trailing percent sign.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%' | '_') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A base value usable as a percentage denominator.
pub fn valid_base(base: Option<f64>) -> Option<f64> {
    base.filter(|b| b.is_finite() && *b > 0.0)
}

pub fn percent_of(amount: f64, base: f64) -> f64 {
    amount / base * 100.0
}

pub fn amount_from_percent(percent: f64, base: f64) -> f64 {
    percent / 100.0 * base
}

pub fn round_currency(amount: f64) -> f64 {
    amount.round()
}

/// Whole currency units with thousands separators, e.g. `1,250,000`.
pub fn format_currency(amount: f64) -> String {
    let rounded = round_currency(amount);
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// At most two decimals, trailing zeros dropped: `20`, `12.5`, `3.75`.
pub fn format_percent(percent: f64) -> String {
    let rounded = (percent * 100.0).round() / 100.0;
    let text = format!("{rounded:.2}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn format_optional_currency(amount: Option<f64>) -> String {
    amount.map(format_currency).unwrap_or_else(|| "-".to_string())
}

pub fn format_optional_percent(percent: Option<f64>) -> String {
    percent
        .map(|p| format!("{}%", format_percent(p)))
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_strips_symbols_and_separators() {
        assert_eq!(parse_number("$1,250,000"), Some(1_250_000.0));
        assert_eq!(parse_number(" 20 % "), Some(20.0));
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number("-3"), Some(-3.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("$"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn format_currency_groups_thousands() {
        assert_eq!(format_currency(0.0), "0");
        assert_eq!(format_currency(999.4), "999");
        assert_eq!(format_currency(1000.0), "1,000");
        assert_eq!(format_currency(100_000.0), "100,000");
        assert_eq!(format_currency(1_250_000.0), "1,250,000");
        assert_eq!(format_currency(-45_500.0), "-45,500");
    }

    #[test]
    fn format_percent_trims_trailing_zeros() {
        assert_eq!(format_percent(20.0), "20");
        assert_eq!(format_percent(12.5), "12.5");
        assert_eq!(format_percent(3.756), "3.76");
        assert_eq!(format_percent(-0.001), "0");
    }

    #[test]
    fn valid_base_rejects_zero_negative_and_missing() {
        assert_eq!(valid_base(Some(500_000.0)), Some(500_000.0));
        assert_eq!(valid_base(Some(0.0)), None);
        assert_eq!(valid_base(Some(-1.0)), None);
        assert_eq!(valid_base(None), None);
        assert_eq!(valid_base(Some(f64::NAN)), None);
    }
}
