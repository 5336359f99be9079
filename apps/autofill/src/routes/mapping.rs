use axum::Json;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::mapping::map_value;
use crate::models::{FieldType, Profile};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRequest {
    pub profile: Profile,
    pub field_types: Vec<FieldType>,
    /// Reference date for experience arithmetic. Defaults to today.
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedValue {
    pub field_type: FieldType,
    pub value: Option<String>,
}

#[derive(Serialize)]
pub struct MapResponse {
    pub values: Vec<MappedValue>,
}

/// POST /api/v1/map
/// Stateless: maps each requested field type against the posted profile.
pub async fn handle_map(Json(req): Json<MapRequest>) -> Result<Json<MapResponse>, AppError> {
    if req.field_types.is_empty() {
        return Err(AppError::Validation("fieldTypes must not be empty".to_string()));
    }
    let today = req.today.unwrap_or_else(|| Local::now().date_naive());

    let values = req
        .field_types
        .into_iter()
        .map(|field_type| MappedValue {
            field_type,
            value: map_value(field_type, &req.profile, today),
        })
        .collect();

    Ok(Json(MapResponse { values }))
}
