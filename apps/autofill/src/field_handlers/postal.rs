/// Normalizes Canadian postal codes (`A1A 1A1`) and US ZIP / ZIP+4 codes.
/// Anything else is returned unchanged.
pub fn format_postal_code(value: &str) -> String {
    let trimmed = value.trim();

    if let Some(canadian) = canadian_postal_code(trimmed) {
        return canadian;
    }

    let us_shaped = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-' || c == ' ');
    if us_shaped {
        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        match digits.len() {
            5 => return digits,
            9 => return format!("{}-{}", &digits[..5], &digits[5..]),
            _ => {}
        }
    }

    value.to_string()
}

/// `A1A1A1` or `A1A 1A1`, any case.
fn canadian_postal_code(value: &str) -> Option<String> {
    let compact: String = match value.len() {
        6 => value.to_string(),
        7 if value.as_bytes()[3] == b' ' => value.replacen(' ', "", 1),
        _ => return None,
    };

    let shape_ok = compact.chars().enumerate().all(|(i, c)| {
        if i % 2 == 0 {
            c.is_ascii_alphabetic()
        } else {
            c.is_ascii_digit()
        }
    });
    if !shape_ok || compact.chars().count() != 6 {
        return None;
    }

    let upper = compact.to_ascii_uppercase();
    Some(format!("{} {}", &upper[..3], &upper[3..]))
}
