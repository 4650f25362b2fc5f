use std::sync::Arc;

use anyhow::Context;
use caresync_domain::access::AccessResolver;
use caresync_domain::audit::AuditRecorder;
use caresync_domain::idempotency::{
    IdempotencyConfig, IdempotencyService, InMemoryIdempotencyStore,
};
use caresync_domain::ports::audit::AuditLogRepository;
use caresync_domain::ports::health::HealthProbe;
use caresync_domain::ports::idempotency::IdempotencyStore;
use caresync_domain::ports::identity::IdentityResolver;
use caresync_domain::ports::records::RecordStore;
use caresync_domain::ports::tenant::TenantResolver;
use caresync_domain::shifts::ShiftActionService;
use caresync_domain::tenant::TenantId;
use caresync_domain::upsert::RecordUpsertPipeline;
use caresync_infra::auth::JwtIdentityResolver;
use caresync_infra::config::AppConfig;
use caresync_infra::health::{MemoryHealthProbe, SupabaseHealthProbe};
use caresync_infra::idempotency::RedisIdempotencyStore;
use caresync_infra::repositories::{InMemoryAuditLog, InMemoryRecordStore, InMemoryTenantDirectory};
use caresync_infra::supabase::{
    PostgrestAuditLog, PostgrestRecordStore, SupabaseClient, SupabaseIdentityResolver,
    SupabaseTenantResolver,
};

/// The ports a running server is wired against.
#[derive(Clone)]
pub struct Adapters {
    pub identity: Arc<dyn IdentityResolver>,
    pub tenants: Arc<dyn TenantResolver>,
    pub records: Arc<dyn RecordStore>,
    pub audit_log: Arc<dyn AuditLogRepository>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub health: Arc<dyn HealthProbe>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub access: AccessResolver,
    pub shifts: ShiftActionService,
    pub idempotency: IdempotencyService,
    pub health: Arc<dyn HealthProbe>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let adapters = build_adapters(&config).await?;
        tracing::info!(
            data_backend = %config.data_backend,
            identity_provider = adapters.identity.provider(),
            idempotency_backend = %config.idempotency_backend,
            "adapters ready"
        );
        Ok(Self::from_adapters(config, adapters))
    }

    pub fn from_adapters(config: AppConfig, adapters: Adapters) -> Self {
        let access = AccessResolver::new(adapters.identity, adapters.tenants);
        let pipeline = RecordUpsertPipeline::new(adapters.records);
        let audit = AuditRecorder::new(adapters.audit_log);
        Self {
            config,
            access,
            shifts: ShiftActionService::new(pipeline, audit),
            idempotency: IdempotencyService::new(
                adapters.idempotency,
                IdempotencyConfig::default(),
            ),
            health: adapters.health,
        }
    }
}

async fn build_adapters(config: &AppConfig) -> anyhow::Result<Adapters> {
    let needs_supabase = config.uses_supabase_data() || config.uses_supabase_identity();
    let client = if needs_supabase {
        Some(SupabaseClient::from_config(config).context("supabase client")?)
    } else {
        None
    };

    let identity: Arc<dyn IdentityResolver> = match &client {
        Some(client) if config.uses_supabase_identity() => {
            Arc::new(SupabaseIdentityResolver::new(client.clone()))
        }
        _ => Arc::new(JwtIdentityResolver::from_config(config)),
    };

    let (records, audit_log, tenants, health): (
        Arc<dyn RecordStore>,
        Arc<dyn AuditLogRepository>,
        Arc<dyn TenantResolver>,
        Arc<dyn HealthProbe>,
    ) = match &client {
        Some(client) if config.uses_supabase_data() => (
            Arc::new(PostgrestRecordStore::new(client.clone())),
            Arc::new(PostgrestAuditLog::new(client.clone())),
            Arc::new(SupabaseTenantResolver::new(
                client.clone(),
                config.tenant_rpc.clone(),
            )),
            Arc::new(SupabaseHealthProbe::new(client.base_url())),
        ),
        _ => {
            let directory = match config.dev_default_tenant() {
                Some(tenant) => InMemoryTenantDirectory::with_fallback(TenantId::new(tenant)),
                None => InMemoryTenantDirectory::new(),
            };
            if config.is_production() {
                tracing::warn!("in-memory data backend selected in production");
            }
            (
                Arc::new(InMemoryRecordStore::new()),
                Arc::new(InMemoryAuditLog::new()),
                Arc::new(directory),
                Arc::new(MemoryHealthProbe),
            )
        }
    };

    let idempotency: Arc<dyn IdempotencyStore> = if config.uses_redis_idempotency() {
        Arc::new(
            RedisIdempotencyStore::connect(&config.redis_url)
                .await
                .context("redis idempotency store")?,
        )
    } else {
        Arc::new(InMemoryIdempotencyStore::new())
    };

    Ok(Adapters {
        identity,
        tenants,
        records,
        audit_log,
        idempotency,
        health,
    })
}
