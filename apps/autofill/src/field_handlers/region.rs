use crate::dom::{DomError, Document, ElementHandle};

/// US states, DC, and Canadian provinces and territories.
pub const REGIONS: &[(&str, &str)] = &[
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("District of Columbia", "DC"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
    ("Alberta", "AB"),
    ("British Columbia", "BC"),
    ("Manitoba", "MB"),
    ("New Brunswick", "NB"),
    ("Newfoundland and Labrador", "NL"),
    ("Northwest Territories", "NT"),
    ("Nova Scotia", "NS"),
    ("Nunavut", "NU"),
    ("Ontario", "ON"),
    ("Prince Edward Island", "PE"),
    ("Quebec", "QC"),
    ("Saskatchewan", "SK"),
    ("Yukon", "YT"),
];

/// Two-letter code for a full state/province name, case-insensitive.
pub fn abbreviate(name: &str) -> Option<&'static str> {
    let name = name.trim();
    REGIONS
        .iter()
        .find(|(full, _)| full.eq_ignore_ascii_case(name))
        .map(|(_, abbr)| *abbr)
}

/// Full name for a two-letter code, case-insensitive.
pub fn full_name(abbreviation: &str) -> Option<&'static str> {
    let abbreviation = abbreviation.trim();
    REGIONS
        .iter()
        .find(|(_, abbr)| abbr.eq_ignore_ascii_case(abbreviation))
        .map(|(full, _)| *full)
}

/// Free-text state fields take the abbreviation when the input is a known
/// full name; anything else is kept as typed.
pub fn format_region_text(value: &str) -> String {
    abbreviate(value)
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

/// Selects the option for `value` in a state/province `<select>`.
///
/// Order: direct match on option text or value, then the abbreviation (or
/// full name, if `value` is already an abbreviation), then the first
/// non-placeholder option, then the first option. Returns `false` only when
/// the select has no options.
pub fn select_region(
    document: &mut Document,
    select: ElementHandle,
    value: &str,
) -> Result<bool, DomError> {
    let options = document.options(select);
    let value = value.trim();

    let matches = |doc: &Document, option: ElementHandle, wanted: &str| {
        doc.option_text(option).eq_ignore_ascii_case(wanted)
            || doc.option_value(option).trim().eq_ignore_ascii_case(wanted)
    };

    let direct = options.iter().copied().find(|&o| matches(document, o, value));
    let alternate = abbreviate(value).or_else(|| full_name(value));
    let via_table = || {
        alternate.and_then(|alt| options.iter().copied().find(|&o| matches(document, o, alt)))
    };
    let fallback = || {
        options
            .iter()
            .copied()
            .find(|&o| !is_placeholder_option(document, o))
            .or_else(|| options.first().copied())
    };

    match direct.or_else(via_table).or_else(fallback) {
        Some(option) => {
            document.select_option(select, option)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// "Select a state", "-- Choose --", or an option with an empty value.
pub(crate) fn is_placeholder_option(document: &Document, option: ElementHandle) -> bool {
    if document.option_value(option).trim().is_empty() {
        return true;
    }
    let text = document.option_text(option).to_lowercase();
    ["select", "choose", "please", "--"]
        .iter()
        .any(|p| text.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeSnapshot;
    use serde_json::json;

    fn select(options: serde_json::Value) -> Document {
        let snapshot: NodeSnapshot =
            serde_json::from_value(json!({ "tag": "select", "children": options })).unwrap();
        Document::from_snapshot(&snapshot)
    }

    fn option(value: &str, text: &str) -> serde_json::Value {
        json!({ "tag": "option", "attributes": { "value": value }, "children": [{ "text": text }] })
    }

    #[test]
    fn test_table_covers_states_dc_and_provinces() {
        assert_eq!(REGIONS.len(), 50 + 1 + 13);
        assert_eq!(abbreviate("california"), Some("CA"));
        assert_eq!(abbreviate("District of Columbia"), Some("DC"));
        assert_eq!(abbreviate("Quebec"), Some("QC"));
        assert_eq!(full_name("on"), Some("Ontario"));
        assert_eq!(abbreviate("Bavaria"), None);
    }

    #[test]
    fn test_free_text_abbreviates_known_names() {
        assert_eq!(format_region_text("California"), "CA");
        assert_eq!(format_region_text("CA"), "CA");
        assert_eq!(format_region_text("Bavaria"), "Bavaria");
    }

    #[test]
    fn test_select_prefers_direct_match() {
        let mut d = select(json!([
            option("", "Select a state"),
            option("CA", "California"),
            option("California", "Calif. (legacy)")
        ]));
        let root = d.root();
        assert!(select_region(&mut d, root, "California").unwrap());
        assert_eq!(d.selected_index(root), Some(1));
    }

    #[test]
    fn test_select_via_abbreviation() {
        let mut d = select(json!([option("", "--"), option("NY", "NY"), option("CA", "CA")]));
        let root = d.root();
        assert!(select_region(&mut d, root, "california").unwrap());
        assert_eq!(d.value(root), Some("CA"));
    }

    #[test]
    fn test_select_via_full_name_for_abbreviated_input() {
        let mut d = select(json!([option("1", "Ontario"), option("2", "Quebec")]));
        let root = d.root();
        assert!(select_region(&mut d, root, "QC").unwrap());
        assert_eq!(d.selected_index(root), Some(1));
    }

    #[test]
    fn test_select_falls_back_to_first_real_option() {
        let mut d = select(json!([option("", "Choose..."), option("AB", "Alberta")]));
        let root = d.root();
        assert!(select_region(&mut d, root, "Atlantis").unwrap());
        assert_eq!(d.selected_index(root), Some(1));
    }

    #[test]
    fn test_select_falls_back_to_first_option_when_all_placeholders() {
        let mut d = select(json!([option("", "Select"), option("", "-- none --")]));
        let root = d.root();
        assert!(select_region(&mut d, root, "Atlantis").unwrap());
        assert_eq!(d.selected_index(root), Some(0));
    }

    #[test]
    fn test_empty_select_selects_nothing() {
        let mut d = select(json!([]));
        let root = d.root();
        assert!(!select_region(&mut d, root, "California").unwrap());
    }
}
