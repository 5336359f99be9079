//! Profile service client. The only place the agent talks to the profile API.
//!
//! Two calls: `POST {base}/auth/login` for a bearer token and
//! `GET {base}/profile` for the user's profile. Both retry 429 and 5xx
//! responses with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Profile;

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("credentials were rejected")]
    Unauthorized,

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl ProfileError {
    /// Network-level failures the user can simply retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ProfileError::Http(e) => e.is_timeout() || e.is_connect(),
            ProfileError::Exhausted { .. } => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub email: String,
}

/// Bearer token plus the user it was issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorMessage },
    Flat { error: String },
    Message { message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

impl ErrorBody {
    fn into_message(self) -> String {
        match self {
            ErrorBody::Nested { error } => error.message,
            ErrorBody::Flat { error } => error,
            ErrorBody::Message { message } => message,
        }
    }
}

/// What the orchestrator needs from the profile backend.
#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<Credential, ProfileError>;

    async fn fetch_profile(&self, credential: &Credential) -> Result<Profile, ProfileError>;
}

#[derive(Clone)]
pub struct ProfileClient {
    client: Client,
    base_url: String,
    retry_base: Duration,
}

impl ProfileClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProfileError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_base: DEFAULT_RETRY_BASE,
        })
    }

    /// First retry waits `base`, then doubles.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends the request built by `build`, retrying on 429, 5xx and network
    /// errors. 401 is never retried.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, ProfileError> {
        let mut last_error: Option<ProfileError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = self.retry_base * (1 << (attempt - 1));
                warn!(
                    "Profile API attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match build().send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ProfileError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                return Err(ProfileError::Unauthorized);
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Profile API returned {}: {}", status, body);
                last_error = Some(ProfileError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorBody>(&body)
                    .map(ErrorBody::into_message)
                    .unwrap_or(body);
                return Err(ProfileError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(ProfileError::Exhausted {
            attempts: MAX_ATTEMPTS,
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no response".to_string()),
        })
    }
}

#[async_trait]
impl ProfileService for ProfileClient {
    async fn login(&self, email: &str, password: &str) -> Result<Credential, ProfileError> {
        let url = self.url("auth/login");
        let body = LoginRequest { email, password };

        let response = self.send(|| self.client.post(&url).json(&body)).await?;
        let text = response.text().await?;
        let credential: Credential = serde_json::from_str(&text)?;

        debug!("Logged in as {}", credential.user.email);
        Ok(credential)
    }

    async fn fetch_profile(&self, credential: &Credential) -> Result<Profile, ProfileError> {
        let url = self.url("profile");

        let response = self
            .send(|| self.client.get(&url).bearer_auth(&credential.token))
            .await?;
        let text = response.text().await?;
        let profile: Profile = serde_json::from_str(&text)?;

        debug!(
            "Fetched profile: {} work experience(s), {} education(s), {} skill(s)",
            profile.work_experiences.len(),
            profile.educations.len(),
            profile.skills.len()
        );
        Ok(profile)
    }
}
