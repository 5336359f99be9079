use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::ElementHints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `YYYY-MM-DD`
    Iso,
    /// `YYYY-MM`, for `<input type="month">`.
    YearMonth,
    /// `MM/DD/YYYY`
    MonthDayYear,
    /// `DD/MM/YYYY`
    DayMonthYear,
    /// Token order taken from a `pattern` attribute.
    Ordered { parts: [DatePart; 3], separator: char },
}

/// Formats `value` for the target, or returns an empty string if the value
/// is not a recognizable date.
pub fn format_date(value: &str, hints: &ElementHints) -> String {
    match parse_date(value) {
        Some(date) => render(date, detect_date_format(hints)),
        None => String::new(),
    }
}

/// Target format, by priority: input type, placeholder, pattern, then US.
pub fn detect_date_format(hints: &ElementHints) -> DateFormat {
    match hints.input_type.as_deref() {
        Some("date") => return DateFormat::Iso,
        Some("month") => return DateFormat::YearMonth,
        _ => {}
    }

    let placeholder = hints.placeholder_lower();
    if placeholder.contains("mm/dd/yyyy") {
        return DateFormat::MonthDayYear;
    }
    if placeholder.contains("dd/mm/yyyy") {
        return DateFormat::DayMonthYear;
    }
    if placeholder.contains("yyyy-mm-dd") {
        return DateFormat::Iso;
    }

    if let Some(format) = hints.pattern.as_deref().and_then(format_from_pattern) {
        return format;
    }

    DateFormat::MonthDayYear
}

fn format_from_pattern(pattern: &str) -> Option<DateFormat> {
    let upper = pattern.to_uppercase();
    let year = upper.find("YYYY")?;
    let month = upper.find("MM")?;
    let day = upper.find("DD")?;

    let mut positioned = [
        (year, DatePart::Year, 4),
        (month, DatePart::Month, 2),
        (day, DatePart::Day, 2),
    ];
    positioned.sort_by_key(|(pos, ..)| *pos);

    let (first_pos, _, first_len) = positioned[0];
    let separator = upper[first_pos + first_len..]
        .chars()
        .next()
        .filter(|c| !c.is_alphanumeric())
        .unwrap_or('/');

    Some(DateFormat::Ordered {
        parts: [positioned[0].1, positioned[1].1, positioned[2].1],
        separator,
    })
}

fn render(date: NaiveDate, format: DateFormat) -> String {
    match format {
        DateFormat::Iso => date.format("%Y-%m-%d").to_string(),
        DateFormat::YearMonth => date.format("%Y-%m").to_string(),
        DateFormat::MonthDayYear => date.format("%m/%d/%Y").to_string(),
        DateFormat::DayMonthYear => date.format("%d/%m/%Y").to_string(),
        DateFormat::Ordered { parts, separator } => parts
            .iter()
            .map(|part| match part {
                DatePart::Year => date.format("%Y").to_string(),
                DatePart::Month => date.format("%m").to_string(),
                DatePart::Day => date.format("%d").to_string(),
            })
            .collect::<Vec<_>>()
            .join(&separator.to_string()),
    }
}

/// Parses the date shapes profiles and pages commonly carry. Month-only
/// values resolve to the first of the month.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }

    let first_of_month = format!("{value}-01");
    if let Ok(date) = NaiveDate::parse_from_str(&first_of_month, "%Y-%m-%d") {
        return Some(date);
    }
    let first_of_named_month = format!("1 {value}");
    for format in ["%d %B %Y", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&first_of_named_month, format) {
            return Some(date);
        }
    }
    None
}
