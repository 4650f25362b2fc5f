use crate::identity::Actor;
use crate::tenant::{TenantError, TenantId};

use super::BoxFuture;

pub trait TenantResolver: Send + Sync {
    fn resolve_tenant(&self, actor: &Actor) -> BoxFuture<'_, Result<TenantId, TenantError>>;
}
