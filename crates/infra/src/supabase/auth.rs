use caresync_domain::identity::{Actor, Credential, IdentityError};
use caresync_domain::ports::BoxFuture;
use caresync_domain::ports::identity::IdentityResolver;
use caresync_domain::util::parse_rfc3339;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::{KeyRole, SupabaseClient, SupabaseError};
use crate::auth::access_token;

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<String>,
    #[serde(default)]
    banned_until: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

impl GoTrueUser {
    fn is_banned(&self, now: OffsetDateTime) -> bool {
        match self.banned_until.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(raw) => parse_rfc3339(raw).is_none_or(|until| until > now),
        }
    }

    fn into_actor(self, now: OffsetDateTime) -> Result<Actor, IdentityError> {
        if self.is_banned(now) {
            return Err(IdentityError::AccountDisabled);
        }
        let email_verified = self.email_confirmed_at.is_some()
            || self
                .user_metadata
                .get("email_verified")
                .and_then(Value::as_bool)
                .unwrap_or(false);
        let email = self
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .ok_or(IdentityError::IncompleteAccount)?;
        Ok(Actor::new(self.id, email, email_verified))
    }
}

/// Verifies credentials with a GoTrue `GET /auth/v1/user` round trip.
#[derive(Clone)]
pub struct SupabaseIdentityResolver {
    client: SupabaseClient,
}

impl SupabaseIdentityResolver {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn fetch_user(&self, token: &str) -> Result<GoTrueUser, SupabaseError> {
        let request = self.client.http().get(self.client.auth_url("user"));
        let request = self.client.sign(request, KeyRole::Anon, Some(token))?;
        let body = self.client.send_json(request).await?;
        serde_json::from_value(body).map_err(|err| SupabaseError::InvalidResponse(err.to_string()))
    }
}

fn classify(err: SupabaseError) -> IdentityError {
    match err.status() {
        Some(StatusCode::BAD_REQUEST)
        | Some(StatusCode::UNAUTHORIZED)
        | Some(StatusCode::FORBIDDEN)
        | Some(StatusCode::NOT_FOUND)
        | Some(StatusCode::UNPROCESSABLE_ENTITY) => {
            tracing::debug!(error = %err, "identity provider rejected credential");
        }
        _ => {
            tracing::error!(error = %err, "identity provider call failed");
        }
    }
    IdentityError::InvalidCredential
}

impl IdentityResolver for SupabaseIdentityResolver {
    fn provider(&self) -> &'static str {
        "supabase-gotrue"
    }

    fn resolve(&self, credential: &Credential) -> BoxFuture<'_, Result<Actor, IdentityError>> {
        let token = access_token(credential);
        Box::pin(async move {
            let token = token.ok_or(IdentityError::InvalidCredential)?;
            let user = self.fetch_user(&token).await.map_err(classify)?;
            user.into_actor(OffsetDateTime::now_utc())
        })
    }
}
