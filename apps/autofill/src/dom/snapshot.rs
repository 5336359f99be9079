//! Wire form of a page's markup as posted by the content script.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One node of a serialized page. Element nodes carry live form state
/// (`value`, `checked`, `selected`) in addition to their attributes, because
/// the attribute values reflect only the initial markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSnapshot {
    Element {
        tag: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<NodeSnapshot>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checked: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selected: Option<bool>,
    },
    Text {
        text: String,
    },
}

#[cfg(test)]
impl NodeSnapshot {
    pub fn text(text: impl Into<String>) -> Self {
        NodeSnapshot::Text { text: text.into() }
    }

    pub fn element(tag: impl Into<String>) -> Self {
        NodeSnapshot::Element {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            value: None,
            checked: None,
            selected: None,
        }
    }
}
