//! Fill executor: writes mapped values into the document through the format
//! handlers and reports one outcome per field.
//!
//! A failure on one field is recorded against that field and the batch moves
//! on; nothing here returns early for the whole list.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dom::{ControlKind, DomError, DomEvent, Document, ElementHandle};
use crate::field_handlers::{
    format_date, format_phone, format_postal_code, format_region_text, select_matching_option,
    select_region, set_choice, ElementHints,
};
use crate::mapping::map_value;
use crate::models::{Field, FieldType, FillReport, FillResult, Profile};
use crate::scanner::{ResolveError, ScanRegistry};

pub const NO_DATA_REASON: &str = "no matching data";
pub const NO_OPTION_REASON: &str = "no matching option";
pub const UNFORMATTABLE_REASON: &str = "value could not be formatted";

#[derive(Debug, Error)]
pub enum FillError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Dom(#[from] DomError),
}

/// What happened to one field that had a value to write.
#[derive(Debug, PartialEq)]
enum Outcome {
    Written(String),
    NoOption,
    Unformattable,
}

/// Fills every field and aggregates the results.
///
/// Fields without a `mapped_value` are mapped from `profile` first when one
/// is given; with no value either way the field is skipped.
pub fn fill_fields(
    document: &mut Document,
    registry: &ScanRegistry,
    fields: &[Field],
    profile: Option<&Profile>,
    today: NaiveDate,
) -> FillReport {
    let results = fields
        .iter()
        .map(|field| {
            let value = field
                .mapped_value
                .clone()
                .or_else(|| profile.and_then(|p| map_value(field.field_type(), p, today)));

            let Some(value) = value else {
                return FillResult::skipped(field, NO_DATA_REASON);
            };

            match fill_field(document, registry, field, &value) {
                Ok(Outcome::Written(written)) => {
                    debug!("Filled {:?} ({:?})", field.field_name, field.field_type());
                    FillResult::filled(field, written)
                }
                Ok(Outcome::NoOption) => FillResult::skipped(field, NO_OPTION_REASON),
                Ok(Outcome::Unformattable) => FillResult::skipped(field, UNFORMATTABLE_REASON),
                Err(e) => {
                    warn!("Failed to fill {:?}: {e}", field.field_name);
                    FillResult::error(field, e.to_string())
                }
            }
        })
        .collect();

    let report = FillReport::from_results(results);
    info!(
        "Fill complete: {} filled, {} skipped, {} failed of {}",
        report.filled_count, report.skipped_count, report.error_count, report.total_fields
    );
    report
}

fn fill_field(
    document: &mut Document,
    registry: &ScanRegistry,
    field: &Field,
    value: &str,
) -> Result<Outcome, FillError> {
    let handle = registry.resolve(field.element_ref, document)?;
    let before = document.mutations().len();

    let outcome = write_value(document, handle, field.field_type(), value)?;

    if matches!(outcome, Outcome::Written(_)) {
        // For a radio group the checked member may not be the scanned one.
        let target = document.mutations()[before..]
            .last()
            .map(|m| m.element)
            .unwrap_or(handle);
        document.dispatch(target, DomEvent::Input)?;
        document.dispatch(target, DomEvent::Change)?;
    }
    Ok(outcome)
}

fn write_value(
    document: &mut Document,
    handle: ElementHandle,
    field_type: FieldType,
    value: &str,
) -> Result<Outcome, DomError> {
    match document.control_kind(handle) {
        Some(ControlKind::Select) => {
            let selected = if field_type == FieldType::State {
                select_region(document, handle, value)?
            } else {
                select_matching_option(document, handle, value)?
            };
            if !selected {
                return Ok(Outcome::NoOption);
            }
            let chosen = document.value(handle).unwrap_or_default().to_string();
            Ok(Outcome::Written(chosen))
        }
        Some(ControlKind::Checkbox | ControlKind::Radio) => {
            if set_choice(document, handle, value)? {
                Ok(Outcome::Written(value.to_string()))
            } else {
                Ok(Outcome::NoOption)
            }
        }
        Some(ControlKind::Input(_) | ControlKind::TextArea) => {
            let formatted = format_text(document, handle, field_type, value);
            if formatted.trim().is_empty() {
                return Ok(Outcome::Unformattable);
            }
            document.set_value(handle, &formatted)?;
            Ok(Outcome::Written(formatted))
        }
        None => Err(DomError::TypeMismatch {
            operation: "fill",
            tag: document.tag(handle).unwrap_or_default().to_string(),
        }),
    }
}

fn format_text(
    document: &Document,
    handle: ElementHandle,
    field_type: FieldType,
    value: &str,
) -> String {
    let hints = ElementHints::from_element(document, handle);
    if hints.is_date_like() {
        return format_date(value, &hints);
    }
    match field_type {
        FieldType::Phone => format_phone(value, &hints),
        FieldType::ZipCode => format_postal_code(value),
        FieldType::State => format_region_text(value),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MutationKind, NodeSnapshot};
    use crate::models::profile::{Address, Education, PersonalInfo};
    use crate::models::field::FillStatus;
    use crate::models::ElementRef;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn doc(value: serde_json::Value) -> Document {
        let snapshot: NodeSnapshot = serde_json::from_value(value).unwrap();
        Document::from_snapshot(&snapshot)
    }

    fn option(value: &str, text: &str) -> serde_json::Value {
        json!({ "tag": "option", "attributes": { "value": value }, "children": [{ "text": text }] })
    }

    /// Registers every form control as one scan session and pairs them with
    /// the given types, in document order.
    fn register(
        document: &Document,
        registry: &mut ScanRegistry,
        types: &[FieldType],
    ) -> Vec<Field> {
        let handles = document.form_controls();
        let session = registry.register(document.generation(), handles.clone());
        types
            .iter()
            .enumerate()
            .map(|(index, &ft)| Field::new(format!("{ft:?}"), ft, 0.9, ElementRef { session, index }))
            .collect()
    }

    fn application_form() -> Document {
        doc(json!({ "tag": "form", "children": [
            { "tag": "input", "attributes": { "name": "first" } },
            { "tag": "input", "attributes": { "name": "phone", "placeholder": "(555) 123-4567" } },
            { "tag": "input", "attributes": { "type": "date", "name": "start" } },
            { "tag": "select", "attributes": { "name": "state" }, "children": [
                option("", "Select a state"),
                option("CA", "California"),
                option("NY", "New York")
            ]},
            { "tag": "select", "attributes": { "name": "degree" }, "children": [
                option("ba", "Bachelor of Arts")
            ]},
            { "tag": "input", "attributes": { "type": "checkbox", "name": "relocate" } },
            { "tag": "input", "attributes": { "name": "zip" } },
            { "tag": "textarea", "attributes": { "name": "skills" } },
            { "tag": "input", "attributes": { "name": "website" } }
        ]}))
    }

    fn profile() -> Profile {
        Profile {
            personal_info: PersonalInfo {
                first_name: Some("Ada".into()),
                phone: Some("555-123-4567".into()),
                address: Address {
                    state: Some("California".into()),
                    zip: Some("941051234".into()),
                    ..Address::default()
                },
                ..PersonalInfo::default()
            },
            educations: vec![Education {
                degree: Some("Master of Science".into()),
                ..Education::default()
            }],
            skills: vec!["Python".into(), "Go".into()],
            ..Profile::default()
        }
    }

    #[test]
    fn test_fill_dispatches_by_control_and_type() {
        let mut d = application_form();
        let mut registry = ScanRegistry::new();
        let mut fields = register(
            &d,
            &mut registry,
            &[
                FieldType::FirstName,
                FieldType::Phone,
                FieldType::Unclassified,
                FieldType::State,
                FieldType::Degree,
                FieldType::Unclassified,
                FieldType::ZipCode,
                FieldType::Skills,
                FieldType::Portfolio,
            ],
        );
        fields[2].mapped_value = Some("2024-03-15".into());
        fields[5].mapped_value = Some("yes".into());

        let report = fill_fields(&mut d, &registry, &fields, Some(&profile()), today());

        let statuses: Vec<FillStatus> = report.results.iter().map(|r| r.status).collect();
        use FillStatus::{Filled, Skipped};
        assert_eq!(
            statuses,
            vec![Filled, Filled, Filled, Filled, Skipped, Filled, Filled, Filled, Skipped]
        );
        let values: Vec<Option<&str>> = report.results.iter().map(|r| r.value.as_deref()).collect();
        assert_eq!(values[0], Some("Ada"));
        assert_eq!(values[1], Some("(555) 123-4567"));
        assert_eq!(values[2], Some("2024-03-15"));
        assert_eq!(values[3], Some("CA"));
        assert_eq!(values[6], Some("94105-1234"));
        assert_eq!(values[7], Some("Python, Go"));
        assert_eq!(report.results[4].reason.as_deref(), Some(NO_OPTION_REASON));
        assert_eq!(report.results[8].reason.as_deref(), Some(NO_DATA_REASON));

        assert_eq!(report.filled_count, 7);
        assert_eq!(report.skipped_count, 2);
        assert_eq!(report.error_count, 0);
        assert!(report.success);

        let controls = d.form_controls();
        assert!(d.is_checked(controls[5]));
        assert_eq!(d.value(controls[3]), Some("CA"));
    }

    #[test]
    fn test_every_write_fires_input_then_change() {
        let mut d = application_form();
        let mut registry = ScanRegistry::new();
        let fields = register(&d, &mut registry, &[FieldType::FirstName, FieldType::Phone]);

        fill_fields(&mut d, &registry, &fields, Some(&profile()), today());

        assert_eq!(d.mutations().len(), 2);
        for m in d.mutations() {
            assert_eq!(m.events, vec![DomEvent::Input, DomEvent::Change]);
        }
        assert_eq!(
            d.mutations()[0].change,
            MutationKind::Value {
                value: "Ada".into()
            }
        );
    }

    #[test]
    fn test_missing_value_is_skipped_not_blanked() {
        let mut d = application_form();
        let mut registry = ScanRegistry::new();
        let fields = register(&d, &mut registry, &[FieldType::FirstName]);

        let report = fill_fields(&mut d, &registry, &fields, None, today());
        assert_eq!(report.results[0].status, FillStatus::Skipped);
        assert_eq!(report.results[0].reason.as_deref(), Some(NO_DATA_REASON));
        assert!(d.mutations().is_empty());
    }

    #[test]
    fn test_empty_string_value_is_not_treated_as_missing() {
        let mut d = application_form();
        let mut registry = ScanRegistry::new();
        let mut fields = register(&d, &mut registry, &[FieldType::FirstName]);
        fields[0].mapped_value = Some(String::new());

        let report = fill_fields(&mut d, &registry, &fields, Some(&profile()), today());
        assert_eq!(report.results[0].reason.as_deref(), Some(UNFORMATTABLE_REASON));
    }

    #[test]
    fn test_detached_element_fails_alone() {
        let mut d = application_form();
        let mut registry = ScanRegistry::new();
        let fields = register(&d, &mut registry, &[FieldType::FirstName, FieldType::Phone]);
        let first = d.form_controls()[0];
        d.detach(first).unwrap();

        let report = fill_fields(&mut d, &registry, &fields, Some(&profile()), today());
        assert_eq!(report.results[0].status, FillStatus::Error);
        assert_eq!(report.results[1].status, FillStatus::Filled);
        assert_eq!(report.error_count, 1);
        assert!(!report.success);
        assert_eq!(
            report.filled_count + report.skipped_count + report.error_count,
            report.total_fields
        );
    }

    #[test]
    fn test_disabled_element_is_an_error() {
        let mut d = doc(json!({ "tag": "form", "children": [
            { "tag": "input", "attributes": { "name": "first", "disabled": "" } }
        ]}));
        let mut registry = ScanRegistry::new();
        let fields = register(&d, &mut registry, &[FieldType::FirstName]);

        let report = fill_fields(&mut d, &registry, &fields, Some(&profile()), today());
        assert_eq!(report.results[0].status, FillStatus::Error);
        assert_eq!(
            report.results[0].reason.as_deref(),
            Some(DomError::Disabled.to_string().as_str())
        );
    }

    #[test]
    fn test_refs_from_replaced_document_are_stale() {
        let original = application_form();
        let mut registry = ScanRegistry::new();
        let fields = register(&original, &mut registry, &[FieldType::FirstName]);

        let mut replaced = application_form();
        let report = fill_fields(&mut replaced, &registry, &fields, Some(&profile()), today());
        assert_eq!(report.results[0].status, FillStatus::Error);
        assert_eq!(
            report.results[0].reason.as_deref(),
            Some(ResolveError::StaleDocument.to_string().as_str())
        );
    }

    #[test]
    fn test_unparseable_date_is_skipped() {
        let mut d = application_form();
        let mut registry = ScanRegistry::new();
        let mut fields = register(
            &d,
            &mut registry,
            &[FieldType::FirstName, FieldType::Phone, FieldType::Unclassified],
        );
        fields[2].mapped_value = Some("someday".into());

        let report = fill_fields(&mut d, &registry, &fields, Some(&profile()), today());
        assert_eq!(report.results[2].status, FillStatus::Skipped);
        assert_eq!(report.results[2].reason.as_deref(), Some(UNFORMATTABLE_REASON));
    }

    #[test]
    fn test_radio_events_fire_on_checked_member() {
        let mut d = doc(json!({ "tag": "fieldset", "children": [
            { "tag": "input", "attributes": { "type": "radio", "name": "auth", "value": "yes" } },
            { "tag": "input", "attributes": { "type": "radio", "name": "auth", "value": "no" } }
        ]}));
        let mut registry = ScanRegistry::new();
        let mut fields = register(&d, &mut registry, &[FieldType::Unclassified]);
        fields[0].mapped_value = Some("no".into());

        let report = fill_fields(&mut d, &registry, &fields, None, today());
        assert_eq!(report.results[0].status, FillStatus::Filled);

        let radios = d.form_controls();
        let last = d.mutations().last().unwrap();
        assert_eq!(last.element, radios[1]);
        assert_eq!(last.events, vec![DomEvent::Input, DomEvent::Change]);
    }
}
