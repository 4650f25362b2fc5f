use crate::identity::{Actor, Credential, IdentityError};

use super::BoxFuture;

/// Maps a raw credential to a verified [`Actor`], one implementation per provider.
pub trait IdentityResolver: Send + Sync {
    fn provider(&self) -> &'static str;

    fn resolve(&self, credential: &Credential) -> BoxFuture<'_, Result<Actor, IdentityError>>;
}
