//! Popup control flow.
//!
//! One [`Orchestrator`] per popup lifecycle. It owns the [`PopupSession`] and
//! drives login → scan → map → fill, talking to the page only through a
//! [`PageChannel`] and to the backend only through a [`ProfileService`].
//! Every cross-context call carries a timeout; on failure the session settles
//! back to its last stable phase.
//!
//! State: `Unauthenticated → Authenticating → Authenticated → Scanning →
//! Scanned → Filling → Scanned`, with `logout` returning to
//! `Unauthenticated` from anywhere.

pub mod session;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::mapping::map_fields;
use crate::models::Profile;
use crate::page::{ChannelError, PageChannel, PageRequest, PageResponse};
use crate::profile_client::{Credential, ProfileError, ProfileService, SessionUser};
use crate::store::{self, KeyValueStore, StoreError};

pub use session::{CachedProfile, Notice, PopupSession, SessionPhase, SessionSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub scan: Duration,
    pub fill: Duration,
    pub network: Duration,
    pub profile_ttl: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            scan: Duration::from_secs(5),
            fill: Duration::from_secs(5),
            network: Duration::from_secs(10),
            profile_ttl: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("another operation is already in progress")]
    Busy,

    #[error("not logged in")]
    NotAuthenticated,

    #[error("no scanned fields to fill")]
    NothingToFill,

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("page channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("page reported an error: {0}")]
    Page(String),

    #[error("unexpected page response to {0}")]
    UnexpectedResponse(&'static str),

    #[error("profile service error: {0}")]
    Profile(#[from] ProfileError),

    #[error("session store error: {0}")]
    Store(#[from] StoreError),

    #[error("session ended while {0} was in flight")]
    SessionEnded(&'static str),
}

impl OrchestratorError {
    /// The text the popup shows for this failure.
    pub fn user_message(&self) -> String {
        match self {
            OrchestratorError::Busy => {
                "Another operation is still running. Please wait for it to finish.".into()
            }
            OrchestratorError::NotAuthenticated => "Please log in first.".into(),
            OrchestratorError::NothingToFill => {
                "No form fields to fill. Scan the page first.".into()
            }
            OrchestratorError::Timeout { operation, .. }
                if matches!(*operation, "login" | "profile fetch") =>
            {
                "The profile service did not respond in time. Please try again.".into()
            }
            OrchestratorError::Timeout { .. } => {
                "The page did not respond in time. Reload the page and try again.".into()
            }
            OrchestratorError::Channel(_) | OrchestratorError::UnexpectedResponse(_) => {
                "Could not talk to the page. Reload the page and try again.".into()
            }
            OrchestratorError::Page(message) => format!("The page reported an error: {message}"),
            OrchestratorError::Profile(ProfileError::Unauthorized) => {
                "Your email or password was not accepted, or your session expired. \
                 Please log in again."
                    .into()
            }
            OrchestratorError::Profile(e) if e.is_transient() => {
                "Could not reach the profile service. Please try again.".into()
            }
            OrchestratorError::Profile(_) => {
                "The profile service could not complete the request.".into()
            }
            OrchestratorError::Store(_) => "Could not save your session on this device.".into(),
            OrchestratorError::SessionEnded(_) => {
                "You were logged out before the operation finished.".into()
            }
        }
    }

    /// Worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrchestratorError::Busy
            | OrchestratorError::Timeout { .. }
            | OrchestratorError::Channel(_) => true,
            OrchestratorError::Profile(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub struct Orchestrator {
    session: Arc<Mutex<PopupSession>>,
    profiles: Arc<dyn ProfileService>,
    store: Arc<dyn KeyValueStore>,
    timeouts: Timeouts,
    prefetch: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        profiles: Arc<dyn ProfileService>,
        store: Arc<dyn KeyValueStore>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(PopupSession::default())),
            profiles,
            store,
            timeouts,
            prefetch: Mutex::new(None),
        }
    }

    pub async fn summary(&self) -> SessionSummary {
        self.session.lock().await.summary(self.timeouts.profile_ttl)
    }

    /// Re-hydrates the credential and a still-fresh profile from the store.
    /// Returns whether a logged-in session was restored.
    pub async fn restore(&self) -> Result<bool, OrchestratorError> {
        let token = self.store.get(store::AUTH_TOKEN).await?;
        let user = store::get_json::<SessionUser>(self.store.as_ref(), store::CURRENT_USER)
            .await
            .unwrap_or_else(|e| {
                warn!("Ignoring stored user: {e}");
                None
            });

        let (Some(token), Some(user)) = (token, user) else {
            debug!("No stored session to restore");
            return Ok(false);
        };

        let cached = store::get_json::<CachedProfile>(self.store.as_ref(), store::PROFILE_DATA)
            .await
            .unwrap_or_else(|e| {
                warn!("Ignoring stored profile: {e}");
                None
            })
            .filter(|c| c.user == user && c.is_fresh(self.timeouts.profile_ttl, Utc::now()));

        let mut session = self.session.lock().await;
        if session.phase.is_in_flight() {
            return Err(OrchestratorError::Busy);
        }
        info!("Restored session for {}", user.email);
        session.credential = Some(Credential { token, user });
        session.profile = cached;
        session.phase = session.settled_phase();
        Ok(true)
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionSummary, OrchestratorError> {
        let epoch = {
            let mut session = self.session.lock().await;
            if session.phase.is_in_flight() {
                return Err(OrchestratorError::Busy);
            }
            session.phase = SessionPhase::Authenticating;
            session.epoch
        };

        let attempt = timeout(self.timeouts.network, self.profiles.login(email, password));
        let result = match attempt.await {
            Ok(Ok(credential)) => Ok(credential),
            Ok(Err(e)) => Err(OrchestratorError::from(e)),
            Err(_) => Err(OrchestratorError::Timeout {
                operation: "login",
                after: self.timeouts.network,
            }),
        };

        let credential = match result {
            Ok(credential) => credential,
            Err(e) => {
                warn!("Login failed: {e}");
                let mut session = self.session.lock().await;
                if session.epoch == epoch {
                    *session = PopupSession {
                        epoch: session.epoch,
                        ..PopupSession::default()
                    };
                }
                return Err(e);
            }
        };

        if let Err(e) = self.persist_credential(&credential).await {
            warn!("Could not persist credential: {e}");
        }

        {
            let mut session = self.session.lock().await;
            if session.epoch != epoch {
                return Err(OrchestratorError::SessionEnded("login"));
            }
            let keep_profile = session
                .profile
                .as_ref()
                .is_some_and(|c| c.belongs_to(&credential));
            if !keep_profile {
                session.profile = None;
                if let Err(e) = self.store.remove(store::PROFILE_DATA).await {
                    warn!("Could not clear stored profile: {e}");
                }
            }
            session.credential = Some(credential.clone());
            session.fields.clear();
            session.last_report = None;
            session.notice = None;
            session.phase = SessionPhase::Authenticated;
        }
        info!("Logged in as {}", credential.user.email);

        self.spawn_prefetch(credential, epoch).await;
        Ok(self.summary().await)
    }

    /// Fetches the profile on a background task and caches it.
    async fn spawn_prefetch(&self, credential: Credential, epoch: u64) {
        let session = self.session.clone();
        let profiles = self.profiles.clone();
        let store = self.store.clone();
        let network = self.timeouts.network;

        let handle = tokio::spawn(async move {
            match timeout(network, profiles.fetch_profile(&credential)).await {
                Ok(Ok(profile)) => {
                    let cached = CachedProfile::new(credential.user.clone(), profile);
                    let mut session = session.lock().await;
                    if !owns_session(&session, &cached, epoch) {
                        debug!("Discarding prefetched profile for an ended session");
                        return;
                    }
                    persist_profile(store.as_ref(), &cached).await;
                    cache_profile(&mut session, cached);
                    debug!("Profile prefetched");
                }
                Ok(Err(e)) => warn!("Profile prefetch failed: {e}"),
                Err(_) => warn!("Profile prefetch timed out after {network:?}"),
            }
        });

        if let Some(previous) = self.prefetch.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Cached profile if fresh, else a fetch (with the network timeout).
    async fn ensure_profile(
        &self,
        credential: &Credential,
        epoch: u64,
    ) -> Result<Profile, OrchestratorError> {
        if let Some(profile) = self
            .session
            .lock()
            .await
            .fresh_profile(self.timeouts.profile_ttl)
        {
            return Ok(profile.clone());
        }

        let fetch = timeout(self.timeouts.network, self.profiles.fetch_profile(credential));
        let profile = match fetch.await {
            Ok(result) => result?,
            Err(_) => {
                return Err(OrchestratorError::Timeout {
                    operation: "profile fetch",
                    after: self.timeouts.network,
                })
            }
        };

        let cached = CachedProfile::new(credential.user.clone(), profile.clone());
        let mut session = self.session.lock().await;
        if owns_session(&session, &cached, epoch) {
            persist_profile(self.store.as_ref(), &cached).await;
            session.profile = Some(cached);
        }
        Ok(profile)
    }

    /// Scans the page. A page that does not answer in time counts as "no
    /// form detected", not as a failure.
    pub async fn scan(
        &self,
        channel: &dyn PageChannel,
    ) -> Result<SessionSummary, OrchestratorError> {
        let epoch = {
            let mut session = self.session.lock().await;
            if session.phase.is_in_flight() {
                return Err(OrchestratorError::Busy);
            }
            if session.credential.is_none() {
                return Err(OrchestratorError::NotAuthenticated);
            }
            session.phase = SessionPhase::Scanning;
            session.epoch
        };

        let reply = timeout(self.timeouts.scan, channel.request(PageRequest::ScanPage));
        let outcome = match reply.await {
            Ok(Ok(PageResponse::Scan { fields })) => Ok((fields, None)),
            Ok(Ok(PageResponse::Error { error })) => Err(OrchestratorError::Page(error)),
            Ok(Ok(_)) => Err(OrchestratorError::UnexpectedResponse("scan")),
            Ok(Err(e)) => Err(OrchestratorError::Channel(e)),
            Err(_) => {
                warn!("Scan timed out after {:?}", self.timeouts.scan);
                Ok((Vec::new(), Some(Notice::ScanTimedOut)))
            }
        };

        let mut session = self.session.lock().await;
        if session.epoch != epoch {
            return Err(OrchestratorError::SessionEnded("scan"));
        }

        match outcome {
            Ok((mut fields, notice)) => {
                if let Some(profile) = session.fresh_profile(self.timeouts.profile_ttl) {
                    map_fields(&mut fields, profile, Local::now().date_naive());
                }
                info!("Scan found {} field(s)", fields.len());
                session.notice = match notice {
                    Some(n) => Some(n),
                    None if fields.is_empty() => Some(Notice::NoFormDetected),
                    None => None,
                };
                session.fields = fields;
                session.last_report = None;
                session.phase = SessionPhase::Scanned;
                Ok(session.summary(self.timeouts.profile_ttl))
            }
            Err(e) => {
                warn!("Scan failed: {e}");
                session.phase = session.settled_phase();
                Err(e)
            }
        }
    }

    /// Fills the scanned fields. Only valid from `Scanned` with at least one
    /// field.
    pub async fn fill(
        &self,
        channel: &dyn PageChannel,
    ) -> Result<SessionSummary, OrchestratorError> {
        let (epoch, credential, mut fields) = {
            let mut session = self.session.lock().await;
            if session.phase.is_in_flight() {
                return Err(OrchestratorError::Busy);
            }
            let Some(credential) = session.credential.clone() else {
                return Err(OrchestratorError::NotAuthenticated);
            };
            if session.phase != SessionPhase::Scanned || session.fields.is_empty() {
                return Err(OrchestratorError::NothingToFill);
            }
            session.phase = SessionPhase::Filling;
            (session.epoch, credential, session.fields.clone())
        };

        let outcome = match self.ensure_profile(&credential, epoch).await {
            Ok(profile) => {
                map_fields(&mut fields, &profile, Local::now().date_naive());
                let request = PageRequest::FillForm {
                    profile_data: Some(profile),
                    fields: fields.clone(),
                };
                match timeout(self.timeouts.fill, channel.request(request)).await {
                    Ok(Ok(PageResponse::Fill(report))) => Ok(report),
                    Ok(Ok(PageResponse::Error { error })) => Err(OrchestratorError::Page(error)),
                    Ok(Ok(_)) => Err(OrchestratorError::UnexpectedResponse("fill")),
                    Ok(Err(e)) => Err(OrchestratorError::Channel(e)),
                    Err(_) => Err(OrchestratorError::Timeout {
                        operation: "fill",
                        after: self.timeouts.fill,
                    }),
                }
            }
            Err(e) => Err(e),
        };

        let mut session = self.session.lock().await;
        if session.epoch != epoch {
            return Err(OrchestratorError::SessionEnded("fill"));
        }
        session.phase = SessionPhase::Scanned;

        match outcome {
            Ok(report) => {
                info!(
                    "Filled {}/{} field(s), {} error(s)",
                    report.filled_count, report.total_fields, report.error_count
                );
                session.fields = fields;
                session.last_report = Some(report);
                Ok(session.summary(self.timeouts.profile_ttl))
            }
            Err(e) => {
                warn!("Fill failed: {e}");
                Err(e)
            }
        }
    }

    /// Drops the session from any phase and clears the stored credential and
    /// profile. Replies to operations still in flight are discarded.
    pub async fn logout(&self) -> Result<(), OrchestratorError> {
        if let Some(prefetch) = self.prefetch.lock().await.take() {
            prefetch.abort();
        }
        {
            let mut session = self.session.lock().await;
            *session = PopupSession {
                epoch: session.epoch + 1,
                ..PopupSession::default()
            };
        }

        for key in [store::AUTH_TOKEN, store::CURRENT_USER, store::PROFILE_DATA] {
            self.store.remove(key).await?;
        }
        info!("Logged out");
        Ok(())
    }

    async fn persist_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        self.store
            .set(store::AUTH_TOKEN, credential.token.clone())
            .await?;
        store::set_json(self.store.as_ref(), store::CURRENT_USER, &credential.user).await
    }

    #[cfg(test)]
    async fn prefetch_finished(&self) {
        if let Some(handle) = self.prefetch.lock().await.take() {
            let _ = handle.await;
        }
    }
}

/// The profile was fetched in this session, for the account still logged in.
fn owns_session(session: &PopupSession, cached: &CachedProfile, epoch: u64) -> bool {
    session.epoch == epoch
        && session
            .credential
            .as_ref()
            .is_some_and(|c| cached.belongs_to(c))
}

/// Called with the session lock held, so a concurrent logout cannot clear the
/// store before this write lands.
async fn persist_profile(store: &dyn KeyValueStore, cached: &CachedProfile) {
    if let Err(e) = store::set_json(store, store::PROFILE_DATA, cached).await {
        warn!("Could not persist profile: {e}");
    }
}

/// Stores a freshly fetched profile and maps any fields already scanned.
fn cache_profile(session: &mut PopupSession, cached: CachedProfile) {
    if !session.fields.is_empty() {
        map_fields(&mut session.fields, &cached.profile, Local::now().date_naive());
    }
    session.profile = Some(cached);
}
