//! Field scanner: finds fillable controls in a page and classifies them.
//!
//! Read-only over the [`Document`]. Evidence extraction lives here; scoring
//! lives in [`patterns`] so it can be tested without markup.

pub mod confidence;
pub mod patterns;
pub mod registry;

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::dom::{ControlKind, Document, ElementHandle};
use crate::models::{ElementRef, Field, FieldType};

pub use confidence::{ConfidenceBand, ConfidenceSummary};
pub use patterns::{classify, SignalSet};
pub use registry::{ResolveError, ScanRegistry};

/// Input types that never hold profile data.
const SKIPPED_INPUT_TYPES: &[&str] = &[
    "hidden", "submit", "button", "reset", "image", "file", "password",
];

/// Confidence reported for controls the page marks as fillable
/// (`data-autofill`) but that match no pattern.
pub const GENERIC_FIELD_CONFIDENCE: f32 = 0.25;

const UNNAMED_FIELD: &str = "Unnamed field";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("element is not a form control")]
    NotAControl,
}

/// Scans the document and registers the detected controls as a new scan
/// session. Returns an empty list when nothing fillable is found.
pub fn scan_document(document: &Document, registry: &mut ScanRegistry) -> Vec<Field> {
    let mut detected: Vec<(ElementHandle, String, FieldType, f32)> = Vec::new();

    for handle in candidates(document) {
        let signals = match collect_signals(document, handle) {
            Ok(s) => s,
            Err(e) => {
                warn!("Skipping element {:?} during scan: {e}", handle);
                continue;
            }
        };
        let name = field_name(&signals);

        match classify(&signals) {
            Some(c) => detected.push((handle, name, c.field_type, c.confidence)),
            None if document.has_attr(handle, "data-autofill") => detected.push((
                handle,
                name,
                FieldType::Unclassified,
                GENERIC_FIELD_CONFIDENCE,
            )),
            None => debug!("No pattern matched for {name:?}"),
        }
    }

    let session = registry.register(
        document.generation(),
        detected.iter().map(|(h, ..)| *h).collect(),
    );

    let fields: Vec<Field> = detected
        .into_iter()
        .enumerate()
        .map(|(index, (_, name, field_type, confidence))| {
            Field::new(name, field_type, confidence, ElementRef { session, index })
        })
        .collect();

    debug!("Scan session {session} detected {} field(s)", fields.len());
    fields
}

/// Fillable controls in document order; one entry per radio group.
fn candidates(document: &Document) -> Vec<ElementHandle> {
    let mut seen_groups = HashSet::new();

    document
        .form_controls()
        .into_iter()
        .filter(|&h| is_fillable(document, h))
        .filter(|&h| match document.control_kind(h) {
            Some(ControlKind::Radio) => match document.attr(h, "name") {
                Some(name) if !name.is_empty() => seen_groups.insert(name.to_string()),
                _ => true,
            },
            _ => true,
        })
        .collect()
}

fn is_fillable(document: &Document, handle: ElementHandle) -> bool {
    if ["disabled", "readonly", "hidden"]
        .iter()
        .any(|a| document.has_attr(handle, a))
    {
        return false;
    }
    if document.attr(handle, "aria-hidden") == Some("true") {
        return false;
    }
    match document.input_type(handle) {
        Some(t) => !SKIPPED_INPUT_TYPES.contains(&t.as_str()),
        None => true,
    }
}

/// Gathers every evidence signal for one control.
pub fn collect_signals(document: &Document, handle: ElementHandle) -> Result<SignalSet, ScanError> {
    let kind = document.control_kind(handle).ok_or(ScanError::NotAControl)?;
    let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
    let attr = |name: &str| non_empty(document.attr(handle, name).map(str::to_string));

    // A radio's own label is one of its answers; the question sits in the legend.
    let label = match kind {
        ControlKind::Radio => non_empty(document.legend_text(handle)),
        _ => non_empty(document.label_text(handle)),
    };

    Ok(SignalSet {
        autocomplete: attr("autocomplete"),
        input_type: document.input_type(handle),
        label,
        aria_label: attr("aria-label"),
        name: attr("name"),
        id: attr("id"),
        placeholder: attr("placeholder"),
        nearby_text: non_empty(document.nearby_text(handle)),
    })
}

/// Human-readable name: label, aria-label, placeholder, name, then id.
fn field_name(signals: &SignalSet) -> String {
    [
        &signals.label,
        &signals.aria_label,
        &signals.placeholder,
        &signals.name,
        &signals.id,
    ]
    .into_iter()
    .flatten()
    .map(|s| s.trim().trim_end_matches('*').trim())
    .find(|s| !s.is_empty())
    .map(str::to_string)
    .unwrap_or_else(|| UNNAMED_FIELD.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeSnapshot;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        let snapshot: NodeSnapshot = serde_json::from_value(value).unwrap();
        Document::from_snapshot(&snapshot)
    }

    fn application_form() -> Document {
        doc(json!({
            "tag": "form",
            "children": [
                { "tag": "label", "attributes": { "for": "fn" }, "children": [{ "text": "First Name *" }] },
                { "tag": "input", "attributes": { "id": "fn", "name": "first_name", "autocomplete": "given-name" } },
                { "tag": "input", "attributes": { "type": "email", "name": "email" } },
                { "tag": "input", "attributes": { "placeholder": "Phone" } },
                { "tag": "input", "attributes": { "type": "hidden", "name": "email_token" } },
                { "tag": "input", "attributes": { "type": "password", "name": "password" } },
                { "tag": "input", "attributes": { "type": "submit", "value": "Apply" } },
                { "tag": "input", "attributes": { "name": "q_17" } },
                { "tag": "textarea", "attributes": { "name": "cover", "data-autofill": "true" } },
                { "tag": "fieldset", "children": [
                    { "tag": "legend", "children": [{ "text": "Country" }] },
                    { "tag": "input", "attributes": { "type": "radio", "name": "country", "value": "US" } },
                    { "tag": "input", "attributes": { "type": "radio", "name": "country", "value": "CA" } }
                ]},
                { "tag": "iframe", "children": [{ "tag": "input", "attributes": { "name": "last_name" } }] }
            ]
        }))
    }

    #[test]
    fn test_scan_detects_and_classifies_controls() {
        let d = application_form();
        let mut registry = ScanRegistry::new();
        let fields = scan_document(&d, &mut registry);

        let types: Vec<FieldType> = fields.iter().map(|f| f.field_type()).collect();
        assert_eq!(
            types,
            vec![
                FieldType::FirstName,
                FieldType::Email,
                FieldType::Phone,
                FieldType::Unclassified,
                FieldType::Country,
            ]
        );
        assert_eq!(fields[0].field_name, "First Name");
        assert!(fields[0].confidence() >= 0.8);
        assert!(fields[1].confidence() >= 0.8);
        assert!(fields[2].confidence() < 0.5);
        assert_eq!(fields[3].confidence(), GENERIC_FIELD_CONFIDENCE);
        assert!(fields.iter().all(|f| f.mapped_value.is_none()));
    }

    #[test]
    fn test_scan_registers_resolvable_refs() {
        let d = application_form();
        let mut registry = ScanRegistry::new();
        let fields = scan_document(&d, &mut registry);

        for (i, f) in fields.iter().enumerate() {
            assert_eq!(f.element_ref.index, i);
            let handle = registry.resolve(f.element_ref, &d).unwrap();
            assert!(d.control_kind(handle).is_some());
        }
    }

    #[test]
    fn test_radio_group_yields_one_field() {
        let d = application_form();
        let mut registry = ScanRegistry::new();
        let fields = scan_document(&d, &mut registry);
        let countries = fields
            .iter()
            .filter(|f| f.field_type() == FieldType::Country)
            .count();
        assert_eq!(countries, 1);
    }

    #[test]
    fn test_empty_page_yields_no_fields() {
        let d = doc(json!({ "tag": "body", "children": [{ "tag": "p", "children": [{ "text": "Hello" }] }] }));
        let mut registry = ScanRegistry::new();
        assert!(scan_document(&d, &mut registry).is_empty());
    }

    #[test]
    fn test_disabled_and_readonly_controls_are_skipped() {
        let d = doc(json!({
            "tag": "form",
            "children": [
                { "tag": "input", "attributes": { "name": "email", "disabled": "" } },
                { "tag": "input", "attributes": { "name": "phone", "readonly": "" } },
                { "tag": "input", "attributes": { "name": "city", "aria-hidden": "true" } }
            ]
        }));
        let mut registry = ScanRegistry::new();
        assert!(scan_document(&d, &mut registry).is_empty());
    }

    #[test]
    fn test_field_name_fallbacks() {
        let s = SignalSet {
            placeholder: Some("Enter city".into()),
            name: Some("city".into()),
            ..SignalSet::default()
        };
        assert_eq!(field_name(&s), "Enter city");
        assert_eq!(field_name(&SignalSet::default()), UNNAMED_FIELD);
    }

    #[test]
    fn test_collect_signals_rejects_non_controls() {
        let d = doc(json!({ "tag": "div" }));
        assert!(matches!(
            collect_signals(&d, d.root()),
            Err(ScanError::NotAControl)
        ));
    }

    #[test]
    fn test_confidence_always_in_unit_interval() {
        let d = application_form();
        let mut registry = ScanRegistry::new();
        for f in scan_document(&d, &mut registry) {
            assert!((0.0..=1.0).contains(&f.confidence()));
        }
    }
}
