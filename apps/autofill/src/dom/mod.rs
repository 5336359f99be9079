//! Page document model.
//!
//! The content script serializes the live page into a [`NodeSnapshot`]; the
//! agent rebuilds it here as an arena of nodes addressed by [`ElementHandle`].
//! The scanner only reads from a [`Document`]; the fill executor writes through
//! the `set_*` / `select_option` / `dispatch` methods, which record every
//! change in a mutation log that the content script replays on the real page.

pub mod snapshot;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use snapshot::NodeSnapshot;

/// Containers the agent never looks into: cross-origin frames, shadow roots,
/// inert templates.
const BOUNDARY_TAGS: &[&str] = &["iframe", "frame", "object", "template", "#shadow-root"];

/// Elements whose text never contributes to labels or nearby text.
const NON_TEXT_TAGS: &[&str] = &["script", "style", "noscript"];

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("element is no longer attached to the page")]
    Detached,

    #[error("unknown element handle")]
    UnknownElement,

    #[error("element is disabled")]
    Disabled,

    #[error("element is not an option of the target select")]
    NotAnOption,

    #[error("cannot {operation} a <{tag}> element")]
    TypeMismatch { operation: &'static str, tag: String },
}

/// What kind of form control an element is, as far as writing goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    /// `<input>` of any text-like type; carries the lower-cased `type`.
    Input(String),
    Checkbox,
    Radio,
    Select,
    TextArea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomEvent {
    Input,
    Change,
}

/// New state written to an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MutationKind {
    Value { value: String },
    Checked { checked: bool },
    Selected { selected_index: usize, value: String },
    EventsOnly,
}

/// One recorded write, addressed three ways so the content script can find
/// the element again: handle, child-index path from the root, id/name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomMutation {
    pub element: ElementHandle,
    pub path: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub change: MutationKind,
    pub events: Vec<DomEvent>,
}

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attributes: BTreeMap<String, String>,
    value: String,
    checked: bool,
    selected: bool,
}

#[derive(Debug, Clone)]
enum NodeData {
    Text(String),
    Element(ElementData),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<usize>,
    children: Vec<usize>,
    data: NodeData,
    attached: bool,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: usize,
    generation: u64,
    mutations: Vec<DomMutation>,
}

impl Document {
    pub fn from_snapshot(snapshot: &NodeSnapshot) -> Self {
        let mut doc = Document {
            nodes: Vec::new(),
            root: 0,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            mutations: Vec::new(),
        };
        doc.root = doc.insert(snapshot, None);
        doc
    }

    fn insert(&mut self, snapshot: &NodeSnapshot, parent: Option<usize>) -> usize {
        let idx = self.nodes.len();
        match snapshot {
            NodeSnapshot::Text { text } => {
                self.nodes.push(Node {
                    parent,
                    children: Vec::new(),
                    data: NodeData::Text(text.clone()),
                    attached: true,
                });
            }
            NodeSnapshot::Element {
                tag,
                attributes,
                children,
                value,
                checked,
                selected,
            } => {
                let attributes: BTreeMap<String, String> = attributes
                    .iter()
                    .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                    .collect();
                let tag = tag.to_ascii_lowercase();
                let checked = checked.unwrap_or_else(|| attributes.contains_key("checked"));
                let selected = selected.unwrap_or_else(|| attributes.contains_key("selected"));
                let initial_value = value
                    .clone()
                    .or_else(|| attributes.get("value").cloned())
                    .unwrap_or_default();

                self.nodes.push(Node {
                    parent,
                    children: Vec::new(),
                    data: NodeData::Element(ElementData {
                        tag,
                        attributes,
                        value: initial_value,
                        checked,
                        selected,
                    }),
                    attached: true,
                });

                for child in children {
                    let child_idx = self.insert(child, Some(idx));
                    self.nodes[idx].children.push(child_idx);
                }

                // <textarea> carries its initial value as text content.
                if let NodeData::Element(el) = &self.nodes[idx].data {
                    if el.tag == "textarea" && value.is_none() {
                        let text = self.collect_text(idx, false);
                        if let NodeData::Element(el) = &mut self.nodes[idx].data {
                            el.value = text;
                        }
                    }
                }
            }
        }
        idx
    }

    /// Changes whenever the page is replaced; scan sessions are tied to it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub fn root(&self) -> ElementHandle {
        ElementHandle(self.root)
    }

    fn element(&self, handle: ElementHandle) -> Result<&ElementData, DomError> {
        match self.nodes.get(handle.0).map(|n| &n.data) {
            Some(NodeData::Element(el)) => Ok(el),
            _ => Err(DomError::UnknownElement),
        }
    }

    fn element_mut(&mut self, handle: ElementHandle) -> Result<&mut ElementData, DomError> {
        match self.nodes.get_mut(handle.0).map(|n| &mut n.data) {
            Some(NodeData::Element(el)) => Ok(el),
            _ => Err(DomError::UnknownElement),
        }
    }

    fn element_at_index(&self, idx: usize) -> Option<&ElementData> {
        match &self.nodes.get(idx)?.data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    pub fn tag(&self, handle: ElementHandle) -> Option<&str> {
        self.element(handle).ok().map(|el| el.tag.as_str())
    }

    pub fn attr(&self, handle: ElementHandle, name: &str) -> Option<&str> {
        self.element(handle)
            .ok()
            .and_then(|el| el.attributes.get(name))
            .map(String::as_str)
    }

    pub fn has_attr(&self, handle: ElementHandle, name: &str) -> bool {
        self.attr(handle, name).is_some()
    }

    pub fn is_attached(&self, handle: ElementHandle) -> bool {
        self.nodes.get(handle.0).is_some_and(|n| n.attached)
    }

    /// `type` attribute of an `<input>`, lower-cased, defaulting to `text`.
    pub fn input_type(&self, handle: ElementHandle) -> Option<String> {
        let el = self.element(handle).ok()?;
        if el.tag != "input" {
            return None;
        }
        Some(
            el.attributes
                .get("type")
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "text".to_string()),
        )
    }

    pub fn control_kind(&self, handle: ElementHandle) -> Option<ControlKind> {
        match self.tag(handle)? {
            "select" => Some(ControlKind::Select),
            "textarea" => Some(ControlKind::TextArea),
            "input" => match self.input_type(handle)?.as_str() {
                "checkbox" => Some(ControlKind::Checkbox),
                "radio" => Some(ControlKind::Radio),
                other => Some(ControlKind::Input(other.to_string())),
            },
            _ => None,
        }
    }

    pub fn value(&self, handle: ElementHandle) -> Option<&str> {
        self.element(handle).ok().map(|el| el.value.as_str())
    }

    #[cfg(test)]
    pub fn is_checked(&self, handle: ElementHandle) -> bool {
        self.element(handle).is_ok_and(|el| el.checked)
    }

    /// All `input`, `select` and `textarea` elements in document order,
    /// skipping anything behind a frame or shadow boundary.
    pub fn form_controls(&self) -> Vec<ElementHandle> {
        let mut out = Vec::new();
        self.walk_controls(self.root, &mut out);
        out
    }

    fn walk_controls(&self, idx: usize, out: &mut Vec<ElementHandle>) {
        let node = &self.nodes[idx];
        if !node.attached {
            return;
        }
        if let NodeData::Element(el) = &node.data {
            if BOUNDARY_TAGS.contains(&el.tag.as_str()) {
                return;
            }
            if matches!(el.tag.as_str(), "input" | "select" | "textarea") {
                out.push(ElementHandle(idx));
            }
        }
        for &child in &node.children {
            self.walk_controls(child, out);
        }
    }

    /// Whitespace-collapsed text of the subtree.
    pub fn text_content(&self, handle: ElementHandle) -> String {
        if handle.0 >= self.nodes.len() {
            return String::new();
        }
        self.collect_text(handle.0, false)
    }

    fn collect_text(&self, idx: usize, skip_controls: bool) -> String {
        let mut parts = Vec::new();
        self.gather_text(idx, skip_controls, &mut parts);
        collapse_whitespace(&parts.join(" "))
    }

    fn gather_text(&self, idx: usize, skip_controls: bool, parts: &mut Vec<String>) {
        let node = &self.nodes[idx];
        match &node.data {
            NodeData::Text(text) => parts.push(text.clone()),
            NodeData::Element(el) => {
                let tag = el.tag.as_str();
                if BOUNDARY_TAGS.contains(&tag) || NON_TEXT_TAGS.contains(&tag) {
                    return;
                }
                if skip_controls && matches!(tag, "select" | "textarea" | "input" | "option") {
                    return;
                }
                for &child in &node.children {
                    self.gather_text(child, skip_controls, parts);
                }
            }
        }
    }

    fn ancestors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.nodes[idx].parent, move |&p| self.nodes[p].parent)
    }

    /// Text of the `<label>` bound to this control, either through `for=id`
    /// or by wrapping it. Text of nested controls is excluded.
    pub fn label_text(&self, handle: ElementHandle) -> Option<String> {
        self.element(handle).ok()?;

        if let Some(id) = self.attr(handle, "id").filter(|id| !id.is_empty()) {
            let label = (0..self.nodes.len()).find(|&i| {
                self.nodes[i].attached
                    && self.element_at_index(i).is_some_and(|el| {
                        el.tag == "label" && el.attributes.get("for").map(String::as_str) == Some(id)
                    })
            });
            if let Some(label) = label {
                let text = self.collect_text(label, true);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }

        self.ancestors(handle.0)
            .find(|&a| self.element_at_index(a).is_some_and(|el| el.tag == "label"))
            .map(|label| self.collect_text(label, true))
            .filter(|t| !t.is_empty())
    }

    /// `<legend>` of the closest enclosing `<fieldset>`.
    pub fn legend_text(&self, handle: ElementHandle) -> Option<String> {
        let fieldset = self
            .ancestors(handle.0)
            .find(|&a| self.element_at_index(a).is_some_and(|el| el.tag == "fieldset"))?;
        self.nodes[fieldset]
            .children
            .iter()
            .find(|&&c| self.element_at_index(c).is_some_and(|el| el.tag == "legend"))
            .map(|&legend| self.collect_text(legend, true))
            .filter(|t| !t.is_empty())
    }

    /// Closest preceding static text, looking at earlier siblings of the
    /// element and then of its parent and grandparent. Text that sits before
    /// another control, or in a label bound to another control, belongs to
    /// that control and stops the search.
    pub fn nearby_text(&self, handle: ElementHandle) -> Option<String> {
        const MAX_LEVELS: usize = 3;
        const MAX_CHARS: usize = 120;

        let own_id = self.attr(handle, "id");
        let mut current = handle.0;
        for _ in 0..MAX_LEVELS {
            let parent = self.nodes.get(current)?.parent?;
            let siblings = &self.nodes[parent].children;
            let pos = siblings.iter().position(|&c| c == current)?;
            for &sibling in siblings[..pos].iter().rev() {
                if self.contains_control(sibling) {
                    return None;
                }
                let bound_elsewhere = self.element_at_index(sibling).is_some_and(|el| {
                    el.tag == "label"
                        && el.attributes.get("for").is_some_and(|f| Some(f.as_str()) != own_id)
                });
                if bound_elsewhere {
                    return None;
                }
                let text = self.collect_text(sibling, true);
                if !text.is_empty() {
                    return Some(text.chars().take(MAX_CHARS).collect());
                }
            }
            current = parent;
        }
        None
    }

    fn contains_control(&self, idx: usize) -> bool {
        match &self.nodes[idx].data {
            NodeData::Text(_) => false,
            NodeData::Element(el) => {
                matches!(el.tag.as_str(), "input" | "select" | "textarea")
                    || (!BOUNDARY_TAGS.contains(&el.tag.as_str())
                        && self.nodes[idx]
                            .children
                            .iter()
                            .any(|&c| self.contains_control(c)))
            }
        }
    }

    /// `<option>` elements of a select, including those inside `<optgroup>`.
    pub fn options(&self, select: ElementHandle) -> Vec<ElementHandle> {
        let Some(node) = self.nodes.get(select.0) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for &child in &node.children {
            match self.element_at_index(child).map(|el| el.tag.as_str()) {
                Some("option") => out.push(ElementHandle(child)),
                Some("optgroup") => out.extend(
                    self.nodes[child]
                        .children
                        .iter()
                        .filter(|&&c| self.element_at_index(c).is_some_and(|el| el.tag == "option"))
                        .map(|&c| ElementHandle(c)),
                ),
                _ => {}
            }
        }
        out
    }

    pub fn option_text(&self, option: ElementHandle) -> String {
        self.text_content(option)
    }

    /// `value` attribute of an option, falling back to its text as browsers do.
    pub fn option_value(&self, option: ElementHandle) -> String {
        self.attr(option, "value")
            .map(str::to_string)
            .unwrap_or_else(|| self.option_text(option))
    }

    #[cfg(test)]
    pub fn selected_index(&self, select: ElementHandle) -> Option<usize> {
        self.options(select)
            .iter()
            .position(|&o| self.element(o).is_ok_and(|el| el.selected))
    }

    /// Radio buttons sharing this radio's `name`, in document order.
    pub fn radio_group(&self, radio: ElementHandle) -> Vec<ElementHandle> {
        let Some(name) = self.attr(radio, "name").filter(|n| !n.is_empty()) else {
            return vec![radio];
        };
        self.form_controls()
            .into_iter()
            .filter(|&c| {
                self.control_kind(c) == Some(ControlKind::Radio) && self.attr(c, "name") == Some(name)
            })
            .collect()
    }

    fn writable(&self, handle: ElementHandle) -> Result<&ElementData, DomError> {
        let el = self.element(handle)?;
        if !self.is_attached(handle) {
            return Err(DomError::Detached);
        }
        if el.attributes.contains_key("disabled") {
            return Err(DomError::Disabled);
        }
        Ok(el)
    }

    pub fn set_value(&mut self, handle: ElementHandle, value: &str) -> Result<(), DomError> {
        self.writable(handle)?;
        match self.control_kind(handle) {
            Some(ControlKind::Input(_)) | Some(ControlKind::TextArea) => {}
            _ => {
                return Err(DomError::TypeMismatch {
                    operation: "set the value of",
                    tag: self.tag(handle).unwrap_or_default().to_string(),
                })
            }
        }
        self.element_mut(handle)?.value = value.to_string();
        self.record(
            handle,
            MutationKind::Value {
                value: value.to_string(),
            },
        );
        Ok(())
    }

    /// Checking a radio unchecks the rest of its group, as the browser would.
    pub fn set_checked(&mut self, handle: ElementHandle, checked: bool) -> Result<(), DomError> {
        self.writable(handle)?;
        match self.control_kind(handle) {
            Some(ControlKind::Checkbox) => {}
            Some(ControlKind::Radio) => {
                if checked {
                    for other in self.radio_group(handle) {
                        if other != handle {
                            self.element_mut(other)?.checked = false;
                        }
                    }
                }
            }
            _ => {
                return Err(DomError::TypeMismatch {
                    operation: "check",
                    tag: self.tag(handle).unwrap_or_default().to_string(),
                })
            }
        }
        self.element_mut(handle)?.checked = checked;
        self.record(handle, MutationKind::Checked { checked });
        Ok(())
    }

    pub fn select_option(
        &mut self,
        select: ElementHandle,
        option: ElementHandle,
    ) -> Result<(), DomError> {
        self.writable(select)?;
        if self.control_kind(select) != Some(ControlKind::Select) {
            return Err(DomError::TypeMismatch {
                operation: "select an option of",
                tag: self.tag(select).unwrap_or_default().to_string(),
            });
        }
        let options = self.options(select);
        let selected_index = options
            .iter()
            .position(|&o| o == option)
            .ok_or(DomError::NotAnOption)?;

        for &o in &options {
            self.element_mut(o)?.selected = o == option;
        }
        let value = self.option_value(option);
        self.element_mut(select)?.value = value.clone();
        self.record(
            select,
            MutationKind::Selected {
                selected_index,
                value,
            },
        );
        Ok(())
    }

    /// Fires a synthetic event so page scripts observe the write.
    pub fn dispatch(&mut self, handle: ElementHandle, event: DomEvent) -> Result<(), DomError> {
        self.element(handle)?;
        if !self.is_attached(handle) {
            return Err(DomError::Detached);
        }
        if !self.mutations.last().is_some_and(|m| m.element == handle) {
            self.record(handle, MutationKind::EventsOnly);
        }
        if let Some(last) = self.mutations.last_mut() {
            last.events.push(event);
        }
        Ok(())
    }

    fn record(&mut self, handle: ElementHandle, change: MutationKind) {
        let mutation = DomMutation {
            element: handle,
            path: self.path(handle),
            id: self.attr(handle, "id").map(str::to_string),
            name: self.attr(handle, "name").map(str::to_string),
            change,
            events: Vec::new(),
        };
        self.mutations.push(mutation);
    }

    /// Child-index path from the root to the element.
    pub fn path(&self, handle: ElementHandle) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = handle.0;
        while let Some(parent) = self.nodes.get(current).and_then(|n| n.parent) {
            match self.nodes[parent].children.iter().position(|&c| c == current) {
                Some(pos) => path.push(pos),
                None => break,
            }
            current = parent;
        }
        path.reverse();
        path
    }

    pub fn mutations(&self) -> &[DomMutation] {
        &self.mutations
    }

    /// Hands over the writes recorded since the last call.
    pub fn take_mutations(&mut self) -> Vec<DomMutation> {
        std::mem::take(&mut self.mutations)
    }

    /// The element at a child-index path from the root, as produced by
    /// [`Document::path`].
    pub fn element_at(&self, path: &[usize]) -> Option<ElementHandle> {
        let mut idx = self.root;
        for &pos in path {
            idx = *self.nodes.get(idx)?.children.get(pos)?;
        }
        matches!(self.nodes[idx].data, NodeData::Element(_)).then_some(ElementHandle(idx))
    }

    /// Removes the element and its subtree from the page. Handles into the
    /// subtree stay valid as identifiers but refuse writes.
    pub fn detach(&mut self, handle: ElementHandle) -> Result<(), DomError> {
        self.element(handle)?;
        if let Some(parent) = self.nodes[handle.0].parent {
            self.nodes[parent].children.retain(|&c| c != handle.0);
        }
        let mut stack = vec![handle.0];
        while let Some(idx) = stack.pop() {
            self.nodes[idx].attached = false;
            stack.extend(self.nodes[idx].children.iter().copied());
        }
        Ok(())
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
