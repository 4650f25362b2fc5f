use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A verified caller. Owned by the identity provider; never persisted here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub email: String,
    pub email_verified: bool,
}

impl Actor {
    pub fn new(id: impl Into<String>, email: impl Into<String>, email_verified: bool) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            email_verified,
        }
    }
}

/// Raw caller credential as it arrived on the request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
    SessionCookie(String),
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    pub fn session_cookie(value: impl Into<String>) -> Self {
        Self::SessionCookie(value.into())
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Bearer(value) | Self::SessionCookie(value) => value,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "bearer",
            Self::SessionCookie(_) => "session_cookie",
        }
    }

    pub fn is_blank(&self) -> bool {
        self.value().trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential::{}(<redacted>)", self.kind())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error("account disabled")]
    AccountDisabled,
    #[error("account has no email address")]
    IncompleteAccount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_leaks_the_token() {
        let credential = Credential::bearer("eyJhbGciOiJIUzI1NiJ9.secret.sig");
        let rendered = format!("{credential:?}");
        assert_eq!(rendered, "Credential::bearer(<redacted>)");
    }

    #[test]
    fn whitespace_credentials_are_blank() {
        assert!(Credential::session_cookie("   ").is_blank());
        assert!(!Credential::bearer("abc").is_blank());
    }
}
