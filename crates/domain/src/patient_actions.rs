//! Server-side form actions for patient records.
//!
//! Each action resolves the caller's scope from the credential, pushes the
//! untyped form payload through [`RecordUpsertPipeline`] with the entity's
//! schema, audits the committed write and hands back the stored row.

use serde_json::Value;

use crate::DomainResult;
use crate::access::{AccessResolver, RequestScope};
use crate::audit::{AuditAction, AuditRecorder};
use crate::entities::{
    CLINICAL_SUMMARY, PATIENT_ADDRESS, PATIENT_ADMIN_INFO, PATIENT_FINANCIAL, PATIENT_PERSONAL,
    SUPPORT_MEMBER, SUPPORT_MEMBER_REF, SUPPORT_PROFILE,
};
use crate::error::DomainError;
use crate::identity::Credential;
use crate::ports::records::Row;
use crate::schema::RecordSchema;
use crate::upsert::RecordUpsertPipeline;

#[derive(Clone)]
pub struct PatientRecordActions {
    access: AccessResolver,
    pipeline: RecordUpsertPipeline,
    audit: AuditRecorder,
}

impl PatientRecordActions {
    pub fn new(
        access: AccessResolver,
        pipeline: RecordUpsertPipeline,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            access,
            pipeline,
            audit,
        }
    }

    pub async fn upsert_patient_address(
        &self,
        credential: &Credential,
        payload: Value,
    ) -> DomainResult<Row> {
        self.upsert_with(&PATIENT_ADDRESS, credential, payload).await
    }

    pub async fn upsert_patient_admin_info(
        &self,
        credential: &Credential,
        payload: Value,
    ) -> DomainResult<Row> {
        self.upsert_with(&PATIENT_ADMIN_INFO, credential, payload).await
    }

    pub async fn upsert_clinical_summary(
        &self,
        credential: &Credential,
        payload: Value,
    ) -> DomainResult<Row> {
        self.upsert_with(&CLINICAL_SUMMARY, credential, payload).await
    }

    pub async fn upsert_patient_financial(
        &self,
        credential: &Credential,
        payload: Value,
    ) -> DomainResult<Row> {
        self.upsert_with(&PATIENT_FINANCIAL, credential, payload).await
    }

    pub async fn upsert_patient_personal(
        &self,
        credential: &Credential,
        payload: Value,
    ) -> DomainResult<Row> {
        self.upsert_with(&PATIENT_PERSONAL, credential, payload).await
    }

    pub async fn upsert_support_member(
        &self,
        credential: &Credential,
        payload: Value,
    ) -> DomainResult<Row> {
        self.upsert_with(&SUPPORT_MEMBER, credential, payload).await
    }

    pub async fn upsert_support_profile(
        &self,
        credential: &Credential,
        payload: Value,
    ) -> DomainResult<Row> {
        self.upsert_with(&SUPPORT_PROFILE, credential, payload).await
    }

    /// Payload is `{ "id": <uuid> }`; the delete is filtered by the caller's tenant.
    pub async fn delete_support_member(
        &self,
        credential: &Credential,
        payload: Value,
    ) -> DomainResult<Row> {
        let scope = self.access.resolve(credential).await?;
        let payload = match payload {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        let reference = SUPPORT_MEMBER_REF
            .validate(&payload)
            .map_err(DomainError::ValidationFailed)?;
        let id = reference
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let row = self.pipeline.delete(&SUPPORT_MEMBER, &id, &scope.tenant).await?;
        self.audit_write(
            &SUPPORT_MEMBER,
            &scope,
            &id,
            AuditAction::Delete,
            Value::Object(row.clone()),
        )
        .await;
        Ok(row)
    }

    async fn upsert_with(
        &self,
        schema: &RecordSchema,
        credential: &Credential,
        payload: Value,
    ) -> DomainResult<Row> {
        let scope = self.access.resolve(credential).await?;
        let persisted = self.pipeline.upsert(schema, payload, &scope.tenant).await?;

        let entity_id = persisted.id().unwrap_or_default().to_string();
        let action = persisted.operation.audit_action();
        self.audit_write(
            schema,
            &scope,
            &entity_id,
            action,
            Value::Object(persisted.row.clone()),
        )
        .await;
        Ok(persisted.row)
    }

    async fn audit_write(
        &self,
        schema: &RecordSchema,
        scope: &RequestScope,
        entity_id: &str,
        action: AuditAction,
        payload: Value,
    ) {
        self.audit
            .record(
                schema.table,
                entity_id,
                action,
                &scope.actor.id,
                &scope.tenant,
                payload,
            )
            .await;
    }
}
