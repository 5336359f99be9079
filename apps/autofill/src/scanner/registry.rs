//! Scan-session registry: maps the `elementRef`s handed out by a scan back to
//! document elements, and notices when they have gone stale.

use std::collections::VecDeque;

use thiserror::Error;
use uuid::Uuid;

use crate::dom::{Document, ElementHandle};
use crate::models::ElementRef;

/// Older sessions are forgotten once this many newer scans exist.
const MAX_SESSIONS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("scan session is unknown or has expired; rescan the page")]
    UnknownSession,

    #[error("page changed since it was scanned; rescan the page")]
    StaleDocument,

    #[error("element reference is out of range for its scan session")]
    NoSuchElement,

    #[error("element was removed from the page after scanning")]
    Detached,
}

#[derive(Debug, Clone)]
struct ScanSession {
    id: Uuid,
    generation: u64,
    handles: Vec<ElementHandle>,
}

#[derive(Debug, Clone, Default)]
pub struct ScanRegistry {
    sessions: VecDeque<ScanSession>,
}

impl ScanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handles of one scan and returns its session id.
    pub fn register(&mut self, generation: u64, handles: Vec<ElementHandle>) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.push_back(ScanSession {
            id,
            generation,
            handles,
        });
        while self.sessions.len() > MAX_SESSIONS {
            self.sessions.pop_front();
        }
        id
    }

    pub fn resolve(
        &self,
        element_ref: ElementRef,
        document: &Document,
    ) -> Result<ElementHandle, ResolveError> {
        let session = self
            .sessions
            .iter()
            .find(|s| s.id == element_ref.session)
            .ok_or(ResolveError::UnknownSession)?;

        if session.generation != document.generation() {
            return Err(ResolveError::StaleDocument);
        }

        let handle = *session
            .handles
            .get(element_ref.index)
            .ok_or(ResolveError::NoSuchElement)?;

        if !document.is_attached(handle) {
            return Err(ResolveError::Detached);
        }
        Ok(handle)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeSnapshot;
    use serde_json::json;

    fn doc() -> Document {
        let snapshot: NodeSnapshot = serde_json::from_value(json!({
            "tag": "form",
            "children": [{ "tag": "input", "attributes": { "name": "email" } }]
        }))
        .unwrap();
        Document::from_snapshot(&snapshot)
    }

    #[test]
    fn test_resolves_registered_handle() {
        let d = doc();
        let mut registry = ScanRegistry::new();
        let input = d.form_controls()[0];
        let session = registry.register(d.generation(), vec![input]);

        let handle = registry
            .resolve(ElementRef { session, index: 0 }, &d)
            .unwrap();
        assert_eq!(handle, input);
    }

    #[test]
    fn test_unknown_session_and_out_of_range() {
        let d = doc();
        let mut registry = ScanRegistry::new();
        let session = registry.register(d.generation(), vec![d.form_controls()[0]]);

        assert_eq!(
            registry.resolve(ElementRef { session: Uuid::new_v4(), index: 0 }, &d),
            Err(ResolveError::UnknownSession)
        );
        assert_eq!(
            registry.resolve(ElementRef { session, index: 3 }, &d),
            Err(ResolveError::NoSuchElement)
        );
    }

    #[test]
    fn test_replaced_document_is_stale() {
        let old = doc();
        let mut registry = ScanRegistry::new();
        let session = registry.register(old.generation(), vec![old.form_controls()[0]]);

        let new = doc();
        assert_eq!(
            registry.resolve(ElementRef { session, index: 0 }, &new),
            Err(ResolveError::StaleDocument)
        );
    }

    #[test]
    fn test_detached_element_is_reported() {
        let mut d = doc();
        let mut registry = ScanRegistry::new();
        let input = d.form_controls()[0];
        let session = registry.register(d.generation(), vec![input]);
        d.detach(input).unwrap();

        assert_eq!(
            registry.resolve(ElementRef { session, index: 0 }, &d),
            Err(ResolveError::Detached)
        );
    }

    #[test]
    fn test_old_sessions_are_evicted() {
        let d = doc();
        let mut registry = ScanRegistry::new();
        let first = registry.register(d.generation(), vec![]);
        for _ in 0..MAX_SESSIONS {
            registry.register(d.generation(), vec![]);
        }
        assert_eq!(registry.len(), MAX_SESSIONS);
        assert_eq!(
            registry.resolve(ElementRef { session: first, index: 0 }, &d),
            Err(ResolveError::UnknownSession)
        );
    }
}
