use serde_json::{Map, Value};
use thiserror::Error;

use crate::tenant::TenantId;

use super::BoxFuture;

/// A persisted or about-to-be-persisted row, keyed by column name.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The backend refused the write; the message is passed through verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("store response invalid: {0}")]
    InvalidResponse(String),
}

pub trait RecordStore: Send + Sync {
    /// Insert-or-merge keyed by `conflict_key`. Returns the stored row.
    fn upsert(
        &self,
        table: &str,
        conflict_key: &[&str],
        row: &Row,
    ) -> BoxFuture<'_, Result<Row, StoreError>>;

    /// Patch the row with `id` inside `tenant`. `None` when no such row is visible.
    fn update(
        &self,
        table: &str,
        tenant: &TenantId,
        id: &str,
        patch: &Row,
    ) -> BoxFuture<'_, Result<Option<Row>, StoreError>>;

    fn delete(
        &self,
        table: &str,
        tenant: &TenantId,
        id: &str,
    ) -> BoxFuture<'_, Result<Option<Row>, StoreError>>;
}
