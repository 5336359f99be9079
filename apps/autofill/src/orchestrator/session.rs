use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Field, FillReport, Profile};
use crate::profile_client::{Credential, SessionUser};
use crate::scanner::{ConfidenceBand, ConfidenceSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Scanning,
    Scanned,
    Filling,
}

impl SessionPhase {
    /// A login, scan or fill is waiting on another context.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            SessionPhase::Authenticating | SessionPhase::Scanning | SessionPhase::Filling
        )
    }
}

/// Informational outcomes that are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Notice {
    NoFormDetected,
    ScanTimedOut,
}

impl Notice {
    pub fn user_message(self) -> &'static str {
        match self {
            Notice::NoFormDetected => "No form detected on this page.",
            Notice::ScanTimedOut => {
                "The page did not answer the scan in time, so no form was detected. \
                 Reload the page and scan again."
            }
        }
    }
}

/// A fetched profile, tagged with the account it was fetched for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedProfile {
    pub user: SessionUser,
    pub profile: Profile,
    pub fetched_at: DateTime<Utc>,
}

impl CachedProfile {
    pub fn new(user: SessionUser, profile: Profile) -> Self {
        Self {
            user,
            profile,
            fetched_at: Utc::now(),
        }
    }

    pub fn belongs_to(&self, credential: &Credential) -> bool {
        self.user == credential.user
    }

    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(self.fetched_at) < ttl,
            Err(_) => true,
        }
    }
}

/// Everything one popup lifecycle knows. Reset wholesale on logout.
#[derive(Debug, Clone)]
pub struct PopupSession {
    pub phase: SessionPhase,
    pub credential: Option<Credential>,
    pub profile: Option<CachedProfile>,
    pub fields: Vec<Field>,
    pub last_report: Option<FillReport>,
    pub notice: Option<Notice>,
    /// Bumped on logout so late replies from before it are discarded.
    pub epoch: u64,
}

impl Default for PopupSession {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Unauthenticated,
            credential: None,
            profile: None,
            fields: Vec::new(),
            last_report: None,
            notice: None,
            epoch: 0,
        }
    }
}

impl PopupSession {
    /// Phase to return to when an in-flight operation fails.
    pub fn settled_phase(&self) -> SessionPhase {
        match (&self.credential, self.fields.is_empty(), self.notice) {
            (None, ..) => SessionPhase::Unauthenticated,
            (Some(_), false, _) | (Some(_), true, Some(_)) => SessionPhase::Scanned,
            (Some(_), true, None) => SessionPhase::Authenticated,
        }
    }

    /// The cached profile, if it is still fresh and was fetched for the
    /// current credential.
    pub fn fresh_profile(&self, ttl: Duration) -> Option<&Profile> {
        let credential = self.credential.as_ref()?;
        self.profile
            .as_ref()
            .filter(|c| c.belongs_to(credential) && c.is_fresh(ttl, Utc::now()))
            .map(|c| &c.profile)
    }

    pub fn summary(&self, ttl: Duration) -> SessionSummary {
        SessionSummary {
            phase: self.phase,
            user: self.credential.as_ref().map(|c| c.user.clone()),
            profile_cached: self.fresh_profile(ttl).is_some(),
            fields: self.fields.iter().cloned().map(FieldView::from).collect(),
            confidence: ConfidenceSummary::from_fields(&self.fields),
            last_report: self.last_report.clone(),
            notice: self.notice,
            message: self.notice.map(Notice::user_message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    #[serde(flatten)]
    pub field: Field,
    pub band: ConfidenceBand,
}

impl From<Field> for FieldView {
    fn from(field: Field) -> Self {
        let band = ConfidenceBand::of(field.confidence());
        Self { field, band }
    }
}

/// What the popup renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub phase: SessionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    pub profile_cached: bool,
    pub fields: Vec<FieldView>,
    pub confidence: ConfidenceSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<FillReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}
