use super::ElementHints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneStyle {
    /// `(555) 123-4567`
    Parenthesized,
    /// `555-123-4567`
    Dashed,
    /// `+1 555 123 4567`
    International,
    /// US style for 10 digits, dash-grouped blocks of 3 otherwise.
    Default,
}

pub fn detect_phone_style(hints: &ElementHints) -> PhoneStyle {
    let placeholder = hints.placeholder_lower();
    if placeholder.contains('(') {
        PhoneStyle::Parenthesized
    } else if placeholder.contains('-') {
        PhoneStyle::Dashed
    } else if placeholder.contains('+') || placeholder.contains("country") {
        PhoneStyle::International
    } else {
        PhoneStyle::Default
    }
}

/// Reformats a phone number to the layout the placeholder suggests.
/// Values without any digits come back unchanged.
pub fn format_phone(value: &str, hints: &ElementHints) -> String {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return value.to_string();
    }

    let national = national_digits(&digits);
    match (detect_phone_style(hints), national) {
        (PhoneStyle::Parenthesized | PhoneStyle::Default, Some(n)) => {
            format!("({}) {}-{}", &n[..3], &n[3..6], &n[6..])
        }
        (PhoneStyle::Dashed, Some(n)) => format!("{}-{}-{}", &n[..3], &n[3..6], &n[6..]),
        (PhoneStyle::International, Some(n)) => {
            format!("+1 {} {} {}", &n[..3], &n[3..6], &n[6..])
        }
        (PhoneStyle::International, None) => format!("+{digits}"),
        (_, None) => group_in_threes(&digits),
    }
}

/// The 10-digit national number for US/Canada numbers, accepting a leading
/// country code `1`.
fn national_digits(digits: &str) -> Option<&str> {
    match digits.len() {
        10 => Some(digits),
        11 if digits.starts_with('1') => Some(&digits[1..]),
        _ => None,
    }
}

fn group_in_threes(digits: &str) -> String {
    digits
        .as_bytes()
        .chunks(3)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}
