use anyhow::Context;
use caresync_infra::supabase::{AdminUserOutcome, SupabaseAdmin, SupabaseClient};
use caresync_infra::{config::AppConfig, logging::init_tracing};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config)?;

    let email = config.seed_admin_email.trim();
    let password = config.seed_admin_password.as_str();
    if email.is_empty() || password.is_empty() {
        warn!("SEED_ADMIN_EMAIL or SEED_ADMIN_PASSWORD not set; nothing to seed");
        return Ok(());
    }

    let client = SupabaseClient::from_config(&config).context("supabase client")?;
    info!(url = client.base_url(), email, "seeding admin account");

    match SupabaseAdmin::new(client).ensure_user(email, password).await {
        Ok(AdminUserOutcome::Created { user_id }) => {
            info!(%user_id, email, "admin account created");
        }
        Ok(AdminUserOutcome::AlreadyExists) => {
            info!(email, "admin account already exists; left untouched");
        }
        Err(err) => {
            tracing::error!(error = %err, email, "admin seeding failed");
            return Err(err).context("seed admin account");
        }
    }

    Ok(())
}
