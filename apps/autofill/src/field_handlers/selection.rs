use crate::dom::{ControlKind, DomError, Document, ElementHandle};

const TRUTHY: &[&str] = &["yes", "true", "y", "1", "on", "checked"];
const FALSY: &[&str] = &["no", "false", "n", "0", "off", "unchecked"];

/// Words shorter than this are ignored by fuzzy option matching.
const MIN_FUZZY_WORD_LEN: usize = 4;

/// Reads yes/no style strings as booleans.
pub fn parse_bool(value: &str) -> Option<bool> {
    let v = value.trim().to_lowercase();
    if TRUTHY.contains(&v.as_str()) {
        Some(true)
    } else if FALSY.contains(&v.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// The option a generic `<select>` should take for `target`: exact value,
/// then exact text, then the first option whose text contains every word of
/// the target that is at least four characters long.
pub fn find_matching_option(
    document: &Document,
    select: ElementHandle,
    target: &str,
) -> Option<ElementHandle> {
    let target = target.trim();
    let options = document.options(select);

    if let Some(&o) = options
        .iter()
        .find(|&&o| document.option_value(o).trim().eq_ignore_ascii_case(target))
    {
        return Some(o);
    }
    if let Some(&o) = options
        .iter()
        .find(|&&o| document.option_text(o).eq_ignore_ascii_case(target))
    {
        return Some(o);
    }

    let target_lower = target.to_lowercase();
    let words: Vec<&str> = target_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_FUZZY_WORD_LEN)
        .collect();
    if words.is_empty() {
        return None;
    }
    options.into_iter().find(|&o| {
        let text = document.option_text(o).to_lowercase();
        words.iter().all(|w| text.contains(w))
    })
}

/// Selects the matching option; `Ok(false)` when nothing matched.
pub fn select_matching_option(
    document: &mut Document,
    select: ElementHandle,
    target: &str,
) -> Result<bool, DomError> {
    match find_matching_option(document, select, target) {
        Some(option) => {
            document.select_option(select, option)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Sets a checkbox or radio from `target`.
///
/// Checkboxes take boolean-looking values directly; otherwise the box is
/// checked when its value or label mentions the target. For a radio group, a
/// boolean target picks the member that reads as the same boolean (falling
/// back to the element itself); other targets pick the first member whose
/// value or label contains the target. Returns whether anything was set.
pub fn set_choice(
    document: &mut Document,
    handle: ElementHandle,
    target: &str,
) -> Result<bool, DomError> {
    let wanted = parse_bool(target);

    match document.control_kind(handle) {
        Some(ControlKind::Checkbox) => match wanted {
            Some(checked) => {
                document.set_checked(handle, checked)?;
                Ok(true)
            }
            None if mentions(document, handle, target) => {
                document.set_checked(handle, true)?;
                Ok(true)
            }
            None => Ok(false),
        },
        Some(ControlKind::Radio) => {
            let group = document.radio_group(handle);
            let chosen = match wanted {
                Some(b) => group
                    .iter()
                    .copied()
                    .find(|&r| reads_as(document, r) == Some(b))
                    .or_else(|| b.then_some(handle)),
                None => group
                    .iter()
                    .copied()
                    .find(|&r| mentions(document, r, target)),
            };
            match chosen {
                Some(radio) => {
                    document.set_checked(radio, true)?;
                    Ok(true)
                }
                // "no" for a lone radio with no "no" sibling: leave it unchecked.
                None if wanted == Some(false) => {
                    document.set_checked(handle, false)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        _ => Err(DomError::TypeMismatch {
            operation: "check",
            tag: document.tag(handle).unwrap_or_default().to_string(),
        }),
    }
}

/// Boolean reading of a choice's value attribute, then its label.
fn reads_as(document: &Document, handle: ElementHandle) -> Option<bool> {
    document
        .attr(handle, "value")
        .and_then(parse_bool)
        .or_else(|| document.label_text(handle).as_deref().and_then(parse_bool))
}

/// Case-insensitive substring match of `target` against value and label.
fn mentions(document: &Document, handle: ElementHandle, target: &str) -> bool {
    let target = target.trim().to_lowercase();
    if target.is_empty() {
        return false;
    }
    let value = document.attr(handle, "value").unwrap_or_default().to_lowercase();
    let label = document.label_text(handle).unwrap_or_default().to_lowercase();
    value.contains(&target) || label.contains(&target)
}
