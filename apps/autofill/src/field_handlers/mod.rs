//! Format handlers. Turn a raw profile value into what a particular control
//! expects, or perform the selection for option-type controls.
//!
//! Handlers never fail on bad data: unparseable input comes back unchanged or
//! empty, and the fill executor decides what that means for the field.

pub mod date;
pub mod phone;
pub mod postal;
pub mod region;
pub mod selection;

use crate::dom::{Document, ElementHandle};

pub use date::format_date;
pub use phone::format_phone;
pub use postal::format_postal_code;
pub use region::{format_region_text, select_region};
pub use selection::{select_matching_option, set_choice};

/// The parts of a target element that decide output format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementHints {
    pub tag: String,
    pub input_type: Option<String>,
    pub placeholder: Option<String>,
    pub pattern: Option<String>,
}

impl ElementHints {
    pub fn from_element(document: &Document, handle: ElementHandle) -> Self {
        Self {
            tag: document.tag(handle).unwrap_or_default().to_string(),
            input_type: document.input_type(handle),
            placeholder: document.attr(handle, "placeholder").map(str::to_string),
            pattern: document.attr(handle, "pattern").map(str::to_string),
        }
    }

    #[cfg(test)]
    pub fn with_placeholder(placeholder: &str) -> Self {
        Self {
            tag: "input".to_string(),
            input_type: Some("text".to_string()),
            placeholder: Some(placeholder.to_string()),
            pattern: None,
        }
    }

    #[cfg(test)]
    pub fn with_input_type(input_type: &str) -> Self {
        Self {
            tag: "input".to_string(),
            input_type: Some(input_type.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn placeholder_lower(&self) -> String {
        self.placeholder.as_deref().unwrap_or_default().to_lowercase()
    }

    /// True when the control expects a date: a date/month input, or a text
    /// input whose placeholder or pattern spells out a date layout.
    pub fn is_date_like(&self) -> bool {
        if matches!(self.input_type.as_deref(), Some("date") | Some("month")) {
            return true;
        }
        let placeholder = self.placeholder_lower();
        let pattern = self.pattern.as_deref().unwrap_or_default().to_uppercase();
        placeholder.contains("yyyy") || (pattern.contains("YYYY") && pattern.contains("MM"))
    }
}
