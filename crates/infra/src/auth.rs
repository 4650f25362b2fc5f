//! Local verification of Supabase access tokens and session cookie decoding.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use caresync_domain::identity::{Actor, Credential, IdentityError};
use caresync_domain::ports::BoxFuture;
use caresync_domain::ports::identity::IdentityResolver;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::Value;

use crate::config::AppConfig;

pub const SUPABASE_AUDIENCE: &str = "authenticated";
const SESSION_BASE64_PREFIX: &str = "base64-";

/// Extracts the access token a credential carries.
///
/// Bearer values are used as-is. Session cookies may hold the raw token, a
/// JSON session object (or the legacy `[access, refresh, ...]` array), or
/// that JSON base64-encoded behind a `base64-` prefix. Percent-encoded
/// cookie values are decoded first.
pub fn access_token(credential: &Credential) -> Option<String> {
    let value = credential.value().trim();
    if value.is_empty() {
        return None;
    }
    match credential {
        Credential::Bearer(_) => Some(value.to_string()),
        Credential::SessionCookie(_) => session_access_token(value),
    }
}

fn session_access_token(raw: &str) -> Option<String> {
    let value = if raw.starts_with('%') {
        percent_decode(raw)
    } else {
        raw.to_string()
    };

    if let Some(encoded) = value.strip_prefix(SESSION_BASE64_PREFIX) {
        let unpadded = encoded.trim_end_matches('=');
        let decoded = URL_SAFE_NO_PAD
            .decode(unpadded)
            .or_else(|_| URL_SAFE.decode(encoded))
            .or_else(|_| STANDARD.decode(encoded))
            .ok()?;
        let text = String::from_utf8(decoded).ok()?;
        return token_from_session_json(&text);
    }

    if value.starts_with('{') || value.starts_with('[') {
        return token_from_session_json(&value);
    }

    looks_like_jwt(&value).then_some(value)
}

fn token_from_session_json(text: &str) -> Option<String> {
    let session: Value = serde_json::from_str(text).ok()?;
    let token = match &session {
        Value::Object(map) => map.get("access_token"),
        Value::Array(items) => items.first(),
        _ => None,
    }?;
    token
        .as_str()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn looks_like_jwt(value: &str) -> bool {
    let segments: Vec<&str> = value.split('.').collect();
    segments.len() == 3 && segments.iter().all(|segment| !segment.is_empty())
}

fn percent_decode(value: &str) -> String {
    // form_urlencoded treats '+' as space, which never occurs in a session value.
    url::form_urlencoded::parse(format!("v={value}").as_bytes())
        .next()
        .map(|(_, decoded)| decoded.into_owned())
        .unwrap_or_else(|| value.to_string())
}

#[derive(Debug, Deserialize)]
struct SupabaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    app_metadata: Value,
    #[serde(default)]
    user_metadata: Value,
}

/// Verifies HS256 access tokens signed with the project's JWT secret.
#[derive(Clone)]
pub struct JwtIdentityResolver {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityResolver {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[SUPABASE_AUDIENCE]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.supabase_jwt_secret)
    }

    fn verify(&self, token: &str) -> Result<Actor, IdentityError> {
        let data = decode::<SupabaseClaims>(token, &self.key, &self.validation).map_err(|err| {
            tracing::debug!(error = %err, "access token rejected");
            IdentityError::InvalidCredential
        })?;
        let claims = data.claims;

        if claims.sub.trim().is_empty() {
            return Err(IdentityError::InvalidCredential);
        }
        if flag(&claims.app_metadata, "disabled") {
            return Err(IdentityError::AccountDisabled);
        }
        let email = claims
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .ok_or(IdentityError::IncompleteAccount)?;

        Ok(Actor::new(
            claims.sub,
            email,
            flag(&claims.user_metadata, "email_verified"),
        ))
    }
}

fn flag(metadata: &Value, name: &str) -> bool {
    metadata.get(name).and_then(Value::as_bool).unwrap_or(false)
}

impl IdentityResolver for JwtIdentityResolver {
    fn provider(&self) -> &'static str {
        "supabase-jwt"
    }

    fn resolve(&self, credential: &Credential) -> BoxFuture<'_, Result<Actor, IdentityError>> {
        let outcome = access_token(credential)
            .ok_or(IdentityError::InvalidCredential)
            .and_then(|token| self.verify(&token));
        Box::pin(async move { outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "test-jwt-secret";

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }

    fn token(claims: Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode token")
    }

    fn valid_claims() -> Value {
        json!({
            "sub": "u1",
            "email": "nurse@caresync.test",
            "aud": "authenticated",
            "exp": now() + 600,
            "user_metadata": { "email_verified": true },
        })
    }

    #[tokio::test]
    async fn valid_token_resolves_actor() {
        let resolver = JwtIdentityResolver::new(SECRET);
        let actor = resolver
            .resolve(&Credential::bearer(token(valid_claims())))
            .await
            .unwrap();
        assert_eq!(actor, Actor::new("u1", "nurse@caresync.test", true));
    }

    #[tokio::test]
    async fn garbage_and_expired_tokens_are_invalid() {
        let resolver = JwtIdentityResolver::new(SECRET);
        let err = resolver.resolve(&Credential::bearer("garbage")).await.unwrap_err();
        assert_eq!(err, IdentityError::InvalidCredential);

        let mut claims = valid_claims();
        claims["exp"] = json!(now() - 3_600);
        let err = resolver.resolve(&Credential::bearer(token(claims))).await.unwrap_err();
        assert_eq!(err, IdentityError::InvalidCredential);
    }

    #[tokio::test]
    async fn wrong_audience_is_invalid() {
        let resolver = JwtIdentityResolver::new(SECRET);
        let mut claims = valid_claims();
        claims["aud"] = json!("anon");
        let err = resolver.resolve(&Credential::bearer(token(claims))).await.unwrap_err();
        assert_eq!(err, IdentityError::InvalidCredential);
    }

    #[tokio::test]
    async fn disabled_and_emailless_accounts_are_classified() {
        let resolver = JwtIdentityResolver::new(SECRET);

        let mut disabled = valid_claims();
        disabled["app_metadata"] = json!({ "disabled": true });
        let err = resolver.resolve(&Credential::bearer(token(disabled))).await.unwrap_err();
        assert_eq!(err, IdentityError::AccountDisabled);

        let mut emailless = valid_claims();
        emailless["email"] = json!("");
        let err = resolver.resolve(&Credential::bearer(token(emailless))).await.unwrap_err();
        assert_eq!(err, IdentityError::IncompleteAccount);
    }

    #[test]
    fn session_cookie_formats_yield_the_access_token() {
        let jwt = token(valid_claims());
        let session = json!({ "access_token": jwt, "refresh_token": "r1" }).to_string();

        let raw = Credential::session_cookie(jwt.clone());
        let plain_json = Credential::session_cookie(session.clone());
        let encoded = Credential::session_cookie(format!(
            "base64-{}",
            URL_SAFE_NO_PAD.encode(session.as_bytes())
        ));
        let legacy = Credential::session_cookie(json!([jwt, "r1", null]).to_string());

        for credential in [raw, plain_json, encoded, legacy] {
            assert_eq!(access_token(&credential).as_deref(), Some(jwt.as_str()));
        }
    }

    #[test]
    fn percent_encoded_session_json_is_decoded() {
        let cookie = Credential::session_cookie("%7B%22access_token%22%3A%22a.b.c%22%7D");
        assert_eq!(access_token(&cookie).as_deref(), Some("a.b.c"));
    }

    #[test]
    fn unrecognised_cookie_yields_nothing() {
        assert_eq!(access_token(&Credential::session_cookie("not-a-session")), None);
        assert_eq!(access_token(&Credential::session_cookie("base64-!!!")), None);
    }
}
