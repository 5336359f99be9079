use serde::{Deserialize, Serialize};

use crate::models::Field;

/// Lower bound of the high band.
pub const HIGH_CONFIDENCE: f32 = 0.8;
/// Lower bound of the medium band.
pub const MEDIUM_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: f32) -> Self {
        match confidence {
            c if c >= HIGH_CONFIDENCE => ConfidenceBand::High,
            c if c >= MEDIUM_CONFIDENCE => ConfidenceBand::Medium,
            _ => ConfidenceBand::Low,
        }
    }
}

/// Per-band field counts shown in the popup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceSummary {
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub total_fields: usize,
}

impl ConfidenceSummary {
    pub fn from_fields(fields: &[Field]) -> Self {
        fields
            .iter()
            .fold(ConfidenceSummary::default(), |mut summary, field| {
                match ConfidenceBand::of(field.confidence()) {
                    ConfidenceBand::High => summary.high_count += 1,
                    ConfidenceBand::Medium => summary.medium_count += 1,
                    ConfidenceBand::Low => summary.low_count += 1,
                }
                summary.total_fields += 1;
                summary
            })
    }
}
