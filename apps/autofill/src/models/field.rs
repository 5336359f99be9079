use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Semantic classification of a detected form control. Closed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    FirstName,
    LastName,
    FullName,
    Email,
    Phone,
    Address,
    City,
    State,
    ZipCode,
    Country,
    Linkedin,
    Github,
    Portfolio,
    CurrentCompany,
    CurrentPosition,
    YearsOfExperience,
    Education,
    Degree,
    School,
    Field,
    Skills,
    Unclassified,
}

impl FieldType {
    pub const ALL: [FieldType; 22] = [
        FieldType::FirstName,
        FieldType::LastName,
        FieldType::FullName,
        FieldType::Email,
        FieldType::Phone,
        FieldType::Address,
        FieldType::City,
        FieldType::State,
        FieldType::ZipCode,
        FieldType::Country,
        FieldType::Linkedin,
        FieldType::Github,
        FieldType::Portfolio,
        FieldType::CurrentCompany,
        FieldType::CurrentPosition,
        FieldType::YearsOfExperience,
        FieldType::Education,
        FieldType::Degree,
        FieldType::School,
        FieldType::Field,
        FieldType::Skills,
        FieldType::Unclassified,
    ];
}

/// Handle to a scanned element: the scan session it was registered in and its
/// slot in that session. Only meaningful to the page agent that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRef {
    pub session: Uuid,
    pub index: usize,
}

/// One detected fillable control.
///
/// `field_type` and `confidence` are fixed at scan time; only `mapped_value`
/// is filled in afterwards. `mapped_value == None` means "no profile data",
/// which is distinct from `Some("")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub field_name: String,
    field_type: FieldType,
    confidence: f32,
    pub element_ref: ElementRef,
    #[serde(default)]
    pub mapped_value: Option<String>,
}

impl Field {
    pub fn new(
        field_name: impl Into<String>,
        field_type: FieldType,
        confidence: f32,
        element_ref: ElementRef,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            field_type,
            confidence: confidence.clamp(0.0, 1.0),
            element_ref,
            mapped_value: None,
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStatus {
    Filled,
    Skipped,
    Error,
}

/// Outcome of one attempted field write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillResult {
    pub field_type: FieldType,
    pub element_ref: ElementRef,
    pub status: FillStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FillResult {
    pub fn filled(field: &Field, value: impl Into<String>) -> Self {
        Self {
            field_type: field.field_type(),
            element_ref: field.element_ref,
            status: FillStatus::Filled,
            value: Some(value.into()),
            reason: None,
        }
    }

    pub fn skipped(field: &Field, reason: impl Into<String>) -> Self {
        Self {
            field_type: field.field_type(),
            element_ref: field.element_ref,
            status: FillStatus::Skipped,
            value: None,
            reason: Some(reason.into()),
        }
    }

    pub fn error(field: &Field, reason: impl Into<String>) -> Self {
        Self {
            field_type: field.field_type(),
            element_ref: field.element_ref,
            status: FillStatus::Error,
            value: None,
            reason: Some(reason.into()),
        }
    }
}

/// Aggregate outcome of one fill batch (the `fillForm` response body).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillReport {
    /// True when no field ended in `error`.
    pub success: bool,
    pub filled_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub total_fields: usize,
    pub results: Vec<FillResult>,
}

impl FillReport {
    pub fn from_results(results: Vec<FillResult>) -> Self {
        let count = |status: FillStatus| results.iter().filter(|r| r.status == status).count();
        let filled_count = count(FillStatus::Filled);
        let skipped_count = count(FillStatus::Skipped);
        let error_count = count(FillStatus::Error);

        Self {
            success: error_count == 0,
            filled_count,
            skipped_count,
            error_count,
            total_fields: results.len(),
            results,
        }
    }
}
