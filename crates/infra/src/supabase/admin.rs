use reqwest::StatusCode;
use serde_json::{Value, json};

use super::{KeyRole, SupabaseClient, SupabaseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminUserOutcome {
    Created { user_id: String },
    AlreadyExists,
}

/// GoTrue admin API, service-role only.
#[derive(Clone)]
pub struct SupabaseAdmin {
    client: SupabaseClient,
}

impl SupabaseAdmin {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Creates a confirmed email/password user. An existing account is left untouched.
    pub async fn ensure_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AdminUserOutcome, SupabaseError> {
        if !self.client.has_service_role() {
            return Err(SupabaseError::Configuration(
                "SUPABASE_SERVICE_ROLE_KEY is required for admin calls".to_string(),
            ));
        }
        let body = json!({
            "email": email,
            "password": password,
            "email_confirm": true,
        });
        let request = self
            .client
            .http()
            .post(self.client.auth_url("admin/users"))
            .json(&body);
        let request = self.client.sign(request, KeyRole::ServiceRole, None)?;

        match self.client.send_json(request).await {
            Ok(user) => {
                let user_id = user
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        SupabaseError::InvalidResponse("created user has no id".to_string())
                    })?
                    .to_string();
                Ok(AdminUserOutcome::Created { user_id })
            }
            Err(err) if is_duplicate(&err) => Ok(AdminUserOutcome::AlreadyExists),
            Err(err) => Err(err),
        }
    }
}

fn is_duplicate(err: &SupabaseError) -> bool {
    let conflict = matches!(
        err.status(),
        Some(StatusCode::UNPROCESSABLE_ENTITY) | Some(StatusCode::CONFLICT)
    );
    let message = err.message().to_ascii_lowercase();
    conflict && (message.contains("already") || message.contains("exists"))
}
