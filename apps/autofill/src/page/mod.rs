//! Page-context agent.
//!
//! Each open tab gets one [`PageAgent`] task that owns the tab's [`Document`]
//! and scan registry. Everything else talks to it through a
//! [`PageAgentHandle`], so scans and fills against one page never interleave.

use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dom::{Document, DomMutation, ElementHandle, NodeSnapshot};
use crate::fill::fill_fields;
use crate::models::{Field, FillReport, Profile};
use crate::scanner::{scan_document, ScanRegistry};

const REQUEST_QUEUE_DEPTH: usize = 32;

/// Requests the orchestrator can send into a page.
#[derive(Debug, Clone)]
pub enum PageRequest {
    ScanPage,
    FillForm {
        profile_data: Option<Profile>,
        fields: Vec<Field>,
    },
    ReplaceDocument(NodeSnapshot),
    /// Elements the page removed, by child-index path from the root. All
    /// paths are read against the document as it was before this request.
    Detach { paths: Vec<Vec<usize>> },
    /// Drains the writes recorded since the last call.
    Mutations,
}

/// `fillForm` reply: the aggregated report.
pub type FillFormResponse = FillReport;

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PageResponse {
    Scan { fields: Vec<Field> },
    Fill(FillFormResponse),
    Replaced { generation: u64 },
    Detached { detached: usize },
    Mutations { mutations: Vec<DomMutation> },
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("page agent is not running")]
    Closed,

    #[error("page agent dropped the request without answering")]
    NoResponse,
}

/// The seam the orchestrator sends page requests through.
#[async_trait]
pub trait PageChannel: Send + Sync {
    async fn request(&self, request: PageRequest) -> Result<PageResponse, ChannelError>;
}

type Envelope = (PageRequest, oneshot::Sender<PageResponse>);

pub struct PageAgent {
    document: Document,
    registry: ScanRegistry,
}

impl PageAgent {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            registry: ScanRegistry::new(),
        }
    }

    /// Starts the agent on its own task. It stops once every handle is dropped.
    pub fn spawn(document: Document) -> PageAgentHandle {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        tokio::spawn(Self::new(document).run(rx));
        PageAgentHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Envelope>) {
        debug!("Page agent started (generation {})", self.document.generation());
        while let Some((request, reply)) = rx.recv().await {
            let response = self.handle(request);
            if reply.send(response).is_err() {
                debug!("Page request caller went away before the reply");
            }
        }
        debug!("Page agent stopped");
    }

    pub fn handle(&mut self, request: PageRequest) -> PageResponse {
        match request {
            PageRequest::ScanPage => PageResponse::Scan {
                fields: scan_document(&self.document, &mut self.registry),
            },
            PageRequest::FillForm { fields, .. } if fields.is_empty() => PageResponse::Error {
                error: "no fields to fill".to_string(),
            },
            PageRequest::FillForm {
                profile_data,
                fields,
            } => PageResponse::Fill(fill_fields(
                &mut self.document,
                &self.registry,
                &fields,
                profile_data.as_ref(),
                Local::now().date_naive(),
            )),
            PageRequest::ReplaceDocument(snapshot) => {
                self.document = Document::from_snapshot(&snapshot);
                info!("Page document replaced (generation {})", self.document.generation());
                PageResponse::Replaced {
                    generation: self.document.generation(),
                }
            }
            PageRequest::Detach { paths } => PageResponse::Detached {
                detached: self.detach(&paths),
            },
            PageRequest::Mutations => PageResponse::Mutations {
                mutations: self.document.take_mutations(),
            },
        }
    }

    fn detach(&mut self, paths: &[Vec<usize>]) -> usize {
        let targets: Vec<ElementHandle> = paths
            .iter()
            .filter_map(|path| {
                let found = self.document.element_at(path);
                if found.is_none() {
                    warn!("No element at path {path:?}");
                }
                found
            })
            .collect();

        let detached = targets
            .into_iter()
            .filter(|&handle| match self.document.detach(handle) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Could not detach {handle:?}: {e}");
                    false
                }
            })
            .count();
        info!("Detached {detached} element(s) from the page");
        detached
    }
}

#[derive(Debug, Clone)]
pub struct PageAgentHandle {
    tx: mpsc::Sender<Envelope>,
}

impl PageAgentHandle {
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl PageChannel for PageAgentHandle {
    async fn request(&self, request: PageRequest) -> Result<PageResponse, ChannelError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((request, reply_tx))
            .await
            .map_err(|_| ChannelError::Closed)?;
        reply_rx.await.map_err(|_| ChannelError::NoResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::PersonalInfo;
    use crate::models::field::FillStatus;
    use crate::models::FieldType;
    use serde_json::json;

    fn snapshot() -> NodeSnapshot {
        serde_json::from_value(json!({ "tag": "form", "children": [
            { "tag": "input", "attributes": { "id": "email", "type": "email", "name": "email" } },
            { "tag": "input", "attributes": { "name": "first_name", "autocomplete": "given-name" } }
        ]}))
        .unwrap()
    }

    fn profile() -> Profile {
        Profile {
            personal_info: PersonalInfo {
                email: Some("ada@example.com".into()),
                ..PersonalInfo::default()
            },
            ..Profile::default()
        }
    }

    async fn scan(handle: &PageAgentHandle) -> Vec<Field> {
        match handle.request(PageRequest::ScanPage).await.unwrap() {
            PageResponse::Scan { fields } => fields,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scan_then_fill_through_handle() {
        let handle = PageAgent::spawn(Document::from_snapshot(&snapshot()));
        let fields = scan(&handle).await;
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field_type(), FieldType::Email);

        let response = handle
            .request(PageRequest::FillForm {
                profile_data: Some(profile()),
                fields,
            })
            .await
            .unwrap();
        let PageResponse::Fill(report) = response else {
            panic!("expected a fill report");
        };
        assert_eq!(report.results[0].status, FillStatus::Filled);
        assert_eq!(report.results[1].status, FillStatus::Skipped);

        let PageResponse::Mutations { mutations } =
            handle.request(PageRequest::Mutations).await.unwrap()
        else {
            panic!("expected mutations");
        };
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].id.as_deref(), Some("email"));
    }

    #[tokio::test]
    async fn test_mutations_are_drained_on_read() {
        let handle = PageAgent::spawn(Document::from_snapshot(&snapshot()));
        let fields = scan(&handle).await;
        let fill = PageRequest::FillForm {
            profile_data: Some(profile()),
            fields,
        };
        handle.request(fill.clone()).await.unwrap();

        let drain = || async {
            match handle.request(PageRequest::Mutations).await.unwrap() {
                PageResponse::Mutations { mutations } => mutations,
                other => panic!("unexpected response: {other:?}"),
            }
        };
        assert_eq!(drain().await.len(), 1);
        assert!(drain().await.is_empty());

        handle.request(fill).await.unwrap();
        assert_eq!(drain().await.len(), 1);
    }

    #[tokio::test]
    async fn test_detached_element_fails_only_its_field() {
        let handle = PageAgent::spawn(Document::from_snapshot(&snapshot()));
        let fields = scan(&handle).await;

        let response = handle
            .request(PageRequest::Detach {
                paths: vec![vec![0], vec![7, 3]],
            })
            .await
            .unwrap();
        assert!(matches!(response, PageResponse::Detached { detached: 1 }));

        let mut profile = profile();
        profile.personal_info.first_name = Some("Ada".into());
        let PageResponse::Fill(report) = handle
            .request(PageRequest::FillForm {
                profile_data: Some(profile),
                fields,
            })
            .await
            .unwrap()
        else {
            panic!("expected a fill report");
        };
        assert_eq!(report.results[0].status, FillStatus::Error);
        assert_eq!(report.results[1].status, FillStatus::Filled);
        assert_eq!(report.error_count + report.filled_count, report.total_fields);
    }

    #[tokio::test]
    async fn test_fill_after_replace_reports_stale_fields() {
        let handle = PageAgent::spawn(Document::from_snapshot(&snapshot()));
        let fields = scan(&handle).await;

        let replaced = handle
            .request(PageRequest::ReplaceDocument(snapshot()))
            .await
            .unwrap();
        assert!(matches!(replaced, PageResponse::Replaced { .. }));

        let PageResponse::Fill(report) = handle
            .request(PageRequest::FillForm {
                profile_data: Some(profile()),
                fields,
            })
            .await
            .unwrap()
        else {
            panic!("expected a fill report");
        };
        assert_eq!(report.results[0].status, FillStatus::Error);
    }

    #[tokio::test]
    async fn test_fill_with_no_fields_is_an_error_response() {
        let handle = PageAgent::spawn(Document::from_snapshot(&snapshot()));
        let response = handle
            .request(PageRequest::FillForm {
                profile_data: None,
                fields: Vec::new(),
            })
            .await
            .unwrap();
        assert!(matches!(response, PageResponse::Error { .. }));
    }

    #[tokio::test]
    async fn test_request_to_stopped_agent_is_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = PageAgentHandle { tx };
        assert!(handle.is_closed());
        assert_eq!(
            handle.request(PageRequest::ScanPage).await.unwrap_err(),
            ChannelError::Closed
        );
    }

    #[test]
    fn test_responses_serialize_as_message_bodies() {
        let body = serde_json::to_value(PageResponse::Error {
            error: "boom".into(),
        })
        .unwrap();
        assert_eq!(body, json!({ "error": "boom" }));

        let body = serde_json::to_value(PageResponse::Scan { fields: Vec::new() }).unwrap();
        assert_eq!(body, json!({ "fields": [] }));
    }
}
