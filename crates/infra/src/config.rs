use std::time::Duration;

use serde::Deserialize;

/// Placeholder HS256 secret for local runs; refused in production.
pub const DEV_JWT_SECRET: &str = "dev-jwt-secret";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub port: u16,
    pub log_level: String,
    /// `memory` or `supabase`.
    pub data_backend: String,
    /// `jwt` (local HS256 verification) or `supabase` (GoTrue round trip).
    pub identity_backend: String,
    /// `memory` or `redis`.
    pub idempotency_backend: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub tenant_rpc: String,
    pub dev_default_tenant_id: String,
    pub redis_url: String,
    pub http_timeout_ms: u64,
    pub seed_admin_email: String,
    pub seed_admin_password: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("port", 3000)?
            .set_default("log_level", "info")?
            .set_default("data_backend", "memory")?
            .set_default("identity_backend", "jwt")?
            .set_default("idempotency_backend", "memory")?
            .set_default(
                "supabase_url",
                env_or("NEXT_PUBLIC_SUPABASE_URL", "http://127.0.0.1:54321"),
            )?
            .set_default("supabase_anon_key", env_or("NEXT_PUBLIC_SUPABASE_ANON_KEY", ""))?
            .set_default("supabase_service_role_key", "")?
            .set_default("supabase_jwt_secret", DEV_JWT_SECRET)?
            .set_default("tenant_rpc", "get_user_tenant_id")?
            .set_default("dev_default_tenant_id", "")?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("http_timeout_ms", 10_000)?
            .set_default("seed_admin_email", "")?
            .set_default("seed_admin_password", "")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        let config: Self = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that must not reach a production deployment.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if !self.is_production() || self.uses_supabase_identity() {
            return Ok(());
        }
        let secret = self.supabase_jwt_secret.trim();
        if secret.is_empty() || secret == DEV_JWT_SECRET {
            return Err(config::ConfigError::Message(
                "SUPABASE_JWT_SECRET must be set when verifying tokens locally in production"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn is_test(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("test")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms.max(1))
    }

    pub fn uses_supabase_data(&self) -> bool {
        self.data_backend.eq_ignore_ascii_case("supabase")
    }

    pub fn uses_supabase_identity(&self) -> bool {
        self.identity_backend.eq_ignore_ascii_case("supabase")
    }

    pub fn uses_redis_idempotency(&self) -> bool {
        self.idempotency_backend.eq_ignore_ascii_case("redis")
    }

    /// Fallback tenant for the in-memory directory; `None` when unset.
    pub fn dev_default_tenant(&self) -> Option<&str> {
        let value = self.dev_default_tenant_id.trim();
        (!value.is_empty()).then_some(value)
    }
}

fn env_or(name: &str, fallback: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        app_env: "test".to_string(),
        port: 0,
        log_level: "info".to_string(),
        data_backend: "memory".to_string(),
        identity_backend: "jwt".to_string(),
        idempotency_backend: "memory".to_string(),
        supabase_url: "http://127.0.0.1:54321".to_string(),
        supabase_anon_key: "anon-key".to_string(),
        supabase_service_role_key: "service-role-key".to_string(),
        supabase_jwt_secret: "test-jwt-secret".to_string(),
        tenant_rpc: "get_user_tenant_id".to_string(),
        dev_default_tenant_id: String::new(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        http_timeout_ms: 2_000,
        seed_admin_email: String::new(),
        seed_admin_password: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_default_tenant_is_none() {
        let mut config = test_config();
        assert_eq!(config.dev_default_tenant(), None);
        config.dev_default_tenant_id = " tenant-a ".to_string();
        assert_eq!(config.dev_default_tenant(), Some("tenant-a"));
    }

    #[test]
    fn backend_switches_are_case_insensitive() {
        let mut config = test_config();
        config.data_backend = "Supabase".to_string();
        config.idempotency_backend = "REDIS".to_string();
        assert!(config.uses_supabase_data());
        assert!(config.uses_redis_idempotency());
        assert!(!config.uses_supabase_identity());
    }

    #[test]
    fn production_rejects_the_placeholder_jwt_secret() {
        let mut config = test_config();
        config.app_env = "production".to_string();
        config.supabase_jwt_secret = DEV_JWT_SECRET.to_string();
        assert!(config.validate().is_err());

        config.supabase_jwt_secret = "   ".to_string();
        assert!(config.validate().is_err());

        config.supabase_jwt_secret = "a-real-secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn placeholder_secret_is_allowed_outside_local_production_verification() {
        let mut config = test_config();
        config.supabase_jwt_secret = DEV_JWT_SECRET.to_string();
        assert!(config.validate().is_ok());

        config.app_env = "production".to_string();
        config.identity_backend = "supabase".to_string();
        assert!(config.validate().is_ok());
    }
}
