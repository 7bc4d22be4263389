//! Display codecs: pt-BR currency, Brazilian phone numbers, title-casing.
//!
//! Pure string helpers with no engine state. Amounts are stored as plain
//! numbers; these functions only exist at the edge where operators type and
//! read locale-formatted text ("1.234,50", "(11) 98765-4321").

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Format an amount as a pt-BR decimal string: thousands separated by `.`,
/// decimal comma, always two fraction digits. `1234.5` → `"1.234,50"`.
///
/// Non-finite input renders as `"0,00"`.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "0,00".to_string();
    }
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if negative && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped},{frac:02}")
}

/// Parse a pt-BR decimal string back into a number. `"1.234,50"` → `1234.5`.
///
/// Everything except digits and the decimal comma is stripped (so grouping
/// dots and an `R$` prefix are tolerated); the first comma is the decimal
/// separator and anything after a second comma is ignored. Unparseable input
/// yields `0.0`. A leading minus sign is preserved so callers can reject
/// negative amounts.
pub fn parse_currency(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let negative = trimmed.starts_with('-');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect();
    if cleaned.chars().all(|c| c == ',') {
        return 0.0;
    }

    let mut parts = cleaned.splitn(3, ',');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next().unwrap_or("");

    let mut numeric = String::with_capacity(cleaned.len() + 2);
    numeric.push_str(if int_part.is_empty() { "0" } else { int_part });
    numeric.push('.');
    numeric.push_str(if frac_part.is_empty() { "0" } else { frac_part });

    match numeric.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            if negative {
                -v
            } else {
                v
            }
        }
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Phone numbers
// ---------------------------------------------------------------------------

/// Strip everything except ASCII digits. This is the canonical form phones
/// are persisted in.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Format a digits-only phone for display.
///
/// 11 digits (mobile) → `(XX) XXXXX-XXXX`; 10 digits (landline) →
/// `(XX) XXXX-XXXX`. Partial input keeps the area code readable
/// (`(XX) rest`); anything shorter passes through untouched. Input beyond
/// 11 digits is truncated to the first 11.
pub fn format_phone(raw: &str) -> String {
    let digits = digits_only(raw);
    if digits.is_empty() {
        return String::new();
    }

    match digits.len() {
        10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        n if n >= 11 => {
            let d = &digits[..11];
            format!("({}) {}-{}", &d[..2], &d[2..7], &d[7..])
        }
        n if n > 2 => format!("({}) {}", &digits[..2], &digits[2..]),
        _ => digits,
    }
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Lowercase the whole string, then capitalize the first letter of each
/// space-separated word. Applied to customer and item names on input.
pub fn title_case(raw: &str) -> String {
    raw.to_lowercase()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_grouping_and_decimal_comma() {
        assert_eq!(format_currency(1234.5), "1.234,50");
        assert_eq!(format_currency(0.0), "0,00");
        assert_eq!(format_currency(15.0), "15,00");
        assert_eq!(format_currency(1_234_567.89), "1.234.567,89");
        assert_eq!(format_currency(-42.1), "-42,10");
        assert_eq!(format_currency(f64::NAN), "0,00");
    }

    #[test]
    fn parses_grouped_decimal_comma_strings() {
        assert_eq!(parse_currency("1.234,50"), 1234.50);
        assert_eq!(parse_currency("120,21"), 120.21);
        assert_eq!(parse_currency("R$ 15,00"), 15.0);
        assert_eq!(parse_currency(",5"), 0.5);
        assert_eq!(parse_currency(""), 0.0);
        assert_eq!(parse_currency("abc"), 0.0);
    }

    #[test]
    fn parse_keeps_leading_minus() {
        assert_eq!(parse_currency("-10,00"), -10.0);
    }

    #[test]
    fn parse_ignores_text_after_second_comma() {
        assert_eq!(parse_currency("1,2,3"), 1.2);
    }

    #[test]
    fn currency_round_trips_two_decimal_values() {
        for value in [0.10, 1.0, 49.90, 1234.50, 999_999.99] {
            assert_eq!(parse_currency(&format_currency(value)), value);
        }
    }

    #[test]
    fn formats_mobile_and_landline_phones() {
        assert_eq!(format_phone("11987654321"), "(11) 98765-4321");
        assert_eq!(format_phone("1187654321"), "(11) 8765-4321");
        assert_eq!(format_phone("(11) 98765-4321"), "(11) 98765-4321");
    }

    #[test]
    fn partial_phones_stay_readable() {
        assert_eq!(format_phone("119876"), "(11) 9876");
        assert_eq!(format_phone("11"), "11");
        assert_eq!(format_phone(""), "");
    }

    #[test]
    fn overlong_phones_truncate_to_eleven_digits() {
        assert_eq!(format_phone("119876543210000"), "(11) 98765-4321");
    }

    #[test]
    fn digits_only_strips_formatting() {
        assert_eq!(digits_only("(11) 98765-4321"), "11987654321");
    }

    #[test]
    fn title_cases_each_word() {
        assert_eq!(title_case("joão da silva"), "João Da Silva");
        assert_eq!(title_case("XEROX COLORIDA"), "Xerox Colorida");
        assert_eq!(title_case(""), "");
    }
}
