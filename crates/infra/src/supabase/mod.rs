//! HTTP adapters for a Supabase project: PostgREST for rows and RPC,
//! GoTrue for identity and the admin user API.

mod admin;
mod auth;
mod rest;

pub use admin::{AdminUserOutcome, SupabaseAdmin};
pub use auth::SupabaseIdentityResolver;
pub use rest::{PostgrestAuditLog, PostgrestRecordStore, SupabaseTenantResolver};

use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("supabase client configuration error: {0}")]
    Configuration(String),
    #[error("supabase transport error: {0}")]
    Transport(String),
    #[error("supabase status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("supabase response decode error: {0}")]
    InvalidResponse(String),
}

impl SupabaseError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => StatusCode::from_u16(*status).ok(),
            _ => None,
        }
    }

    /// The upstream message without the status prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Which key a request is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyRole {
    Anon,
    ServiceRole,
}

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, SupabaseError> {
        let base_url = config.supabase_url.trim().trim_end_matches('/').to_string();
        url::Url::parse(&base_url).map_err(|err| {
            SupabaseError::Configuration(format!("invalid SUPABASE_URL '{base_url}': {err}"))
        })?;
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|err| SupabaseError::Configuration(err.to_string()))?;
        Ok(Self {
            http,
            base_url,
            anon_key: config.supabase_anon_key.trim().to_string(),
            service_role_key: config.supabase_service_role_key.trim().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_service_role(&self) -> bool {
        !self.service_role_key.is_empty()
    }

    pub(crate) fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Adds `apikey` and, unless `bearer` overrides it, the key itself as bearer.
    pub(crate) fn sign(
        &self,
        request: RequestBuilder,
        role: KeyRole,
        bearer: Option<&str>,
    ) -> Result<RequestBuilder, SupabaseError> {
        let key = match role {
            KeyRole::Anon => &self.anon_key,
            KeyRole::ServiceRole => &self.service_role_key,
        };
        if key.is_empty() {
            let name = match role {
                KeyRole::Anon => "SUPABASE_ANON_KEY",
                KeyRole::ServiceRole => "SUPABASE_SERVICE_ROLE_KEY",
            };
            return Err(SupabaseError::Configuration(format!("{name} is not configured")));
        }
        Ok(request
            .header("apikey", key)
            .bearer_auth(bearer.unwrap_or(key))
            .header("accept", "application/json"))
    }

    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, SupabaseError> {
        let response = request
            .send()
            .await
            .map_err(|err| SupabaseError::Transport(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SupabaseError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    pub(crate) async fn send_json(&self, request: RequestBuilder) -> Result<Value, SupabaseError> {
        let response = self.send(request).await?;
        let text = response
            .text()
            .await
            .map_err(|err| SupabaseError::InvalidResponse(err.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| SupabaseError::InvalidResponse(err.to_string()))
    }
}

/// PostgREST answers `{message, code, details, hint}`; GoTrue uses `msg` or
/// `error_description`. Falls back to the raw body.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|value| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|field| value.get(*field).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}
