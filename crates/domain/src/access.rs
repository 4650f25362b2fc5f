use std::sync::Arc;

use crate::DomainResult;
use crate::identity::{Actor, Credential, IdentityError};
use crate::ports::identity::IdentityResolver;
use crate::ports::tenant::TenantResolver;
use crate::tenant::{TenantError, TenantId};

/// Who is calling and which tenant every write of this request lands in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestScope {
    pub actor: Actor,
    pub tenant: TenantId,
}

/// Resolves a fresh [`RequestScope`] per call; nothing is cached between requests.
#[derive(Clone)]
pub struct AccessResolver {
    identity: Arc<dyn IdentityResolver>,
    tenants: Arc<dyn TenantResolver>,
}

impl AccessResolver {
    pub fn new(identity: Arc<dyn IdentityResolver>, tenants: Arc<dyn TenantResolver>) -> Self {
        Self { identity, tenants }
    }

    pub fn identity_provider(&self) -> &'static str {
        self.identity.provider()
    }

    pub async fn authenticate(&self, credential: &Credential) -> Result<Actor, IdentityError> {
        if credential.is_blank() {
            return Err(IdentityError::InvalidCredential);
        }
        let result = self.identity.resolve(credential).await;
        if let Err(err) = &result {
            tracing::info!(
                provider = self.identity.provider(),
                credential = credential.kind(),
                reason = %err,
                "credential rejected"
            );
        }
        result
    }

    pub async fn tenant_for(&self, actor: &Actor) -> Result<TenantId, TenantError> {
        let result = self.tenants.resolve_tenant(actor).await;
        match &result {
            Err(TenantError::LookupFailed(message)) => {
                tracing::error!(actor_id = %actor.id, error = %message, "tenant lookup failed");
            }
            Err(TenantError::NoTenantAssigned) => {
                tracing::warn!(actor_id = %actor.id, "actor has no tenant");
            }
            Ok(_) => {}
        }
        result
    }

    pub async fn resolve(&self, credential: &Credential) -> DomainResult<RequestScope> {
        let actor = self.authenticate(credential).await?;
        let tenant = self.tenant_for(&actor).await?;
        Ok(RequestScope { actor, tenant })
    }
}
