//! Schemas for every tenant-scoped record the application writes.

use crate::schema::{FieldKind, FieldSpec, RecordSchema};

const PATIENT_KEY: &[&str] = &["patient_id", "tenant_id"];
const ID_KEY: &[&str] = &["id"];

const ID: FieldSpec = FieldSpec::optional("id", FieldKind::Uuid);
const TENANT_ID: FieldSpec = FieldSpec::required("tenant_id", FieldKind::text(1));
const PATIENT_ID: FieldSpec = FieldSpec::required("patient_id", FieldKind::Uuid);

pub const SUPPORT_PERMISSIONS: &[&str] = &[
    "view_records",
    "receive_alerts",
    "manage_schedule",
    "financial_contact",
    "legal_guardian",
];

pub const PATIENT_ADDRESS: RecordSchema = RecordSchema {
    table: "patient_addresses",
    conflict_key: PATIENT_KEY,
    fields: &[
        ID,
        TENANT_ID,
        PATIENT_ID,
        FieldSpec::required("zip_code", FieldKind::bounded_text(8, 9)),
        FieldSpec::required("street", FieldKind::text(2)),
        FieldSpec::required("number", FieldKind::text(1)),
        FieldSpec::optional("complement", FieldKind::text(0)),
        FieldSpec::required("neighborhood", FieldKind::text(2)),
        FieldSpec::required("city", FieldKind::text(2)),
        FieldSpec::required("state", FieldKind::bounded_text(2, 2)),
        FieldSpec::optional("zone", FieldKind::Enum(&["urban", "rural"])),
        FieldSpec::optional("reference_point", FieldKind::text(0)),
        FieldSpec::nullable(
            "latitude",
            FieldKind::Number {
                min: Some(-90.0),
                max: Some(90.0),
            },
        ),
        FieldSpec::nullable(
            "longitude",
            FieldKind::Number {
                min: Some(-180.0),
                max: Some(180.0),
            },
        ),
        FieldSpec::optional("access_notes", FieldKind::text(0)),
    ],
};

pub const PATIENT_ADMIN_INFO: RecordSchema = RecordSchema {
    table: "patient_admin_info",
    conflict_key: PATIENT_KEY,
    fields: &[
        ID,
        TENANT_ID,
        PATIENT_ID,
        FieldSpec::required(
            "status",
            FieldKind::Enum(&["active", "inactive", "on_hold", "discharged", "deceased"]),
        ),
        FieldSpec::required(
            "care_modality",
            FieldKind::Enum(&[
                "home_care",
                "hospital_at_home",
                "outpatient",
                "remote_monitoring",
            ]),
        ),
        FieldSpec::optional(
            "complexity",
            FieldKind::Enum(&["low", "medium", "high", "critical"]),
        ),
        FieldSpec::nullable("admission_date", FieldKind::Date),
        FieldSpec::nullable("discharge_date", FieldKind::Date),
        FieldSpec::optional("contract_number", FieldKind::text(1)),
        FieldSpec::nullable("coordinator_id", FieldKind::Uuid),
        FieldSpec::optional("notes", FieldKind::text(0)),
    ],
};

const MEDICATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("name", FieldKind::text(2)),
    FieldSpec::optional("dosage", FieldKind::text(1)),
    FieldSpec::optional("frequency", FieldKind::text(1)),
];

pub const CLINICAL_SUMMARY: RecordSchema = RecordSchema {
    table: "patient_clinical_summaries",
    conflict_key: PATIENT_KEY,
    fields: &[
        ID,
        TENANT_ID,
        PATIENT_ID,
        FieldSpec::required("main_diagnosis", FieldKind::text(2)),
        FieldSpec::optional("icd_code", FieldKind::bounded_text(3, 8)),
        FieldSpec::required(
            "allergies",
            FieldKind::List {
                item: &FieldKind::text(2),
                max_items: None,
            },
        ),
        FieldSpec::optional(
            "medications",
            FieldKind::List {
                item: &FieldKind::Object(MEDICATION_FIELDS),
                max_items: None,
            },
        ),
        FieldSpec::optional(
            "risk_flags",
            FieldKind::List {
                item: &FieldKind::Enum(&[
                    "fall",
                    "pressure_injury",
                    "infection",
                    "bronchoaspiration",
                    "polypharmacy",
                ]),
                max_items: None,
            },
        ),
        FieldSpec::optional("observations", FieldKind::text(0)),
    ],
};

pub const PATIENT_FINANCIAL: RecordSchema = RecordSchema {
    table: "patient_financial_info",
    conflict_key: PATIENT_KEY,
    fields: &[
        ID,
        TENANT_ID,
        PATIENT_ID,
        FieldSpec::required(
            "payer_type",
            FieldKind::Enum(&["private", "health_plan", "public", "mixed"]),
        ),
        FieldSpec::optional("insurer_name", FieldKind::text(2)),
        FieldSpec::optional("plan_number", FieldKind::text(1)),
        FieldSpec::optional("card_number", FieldKind::text(1)),
        FieldSpec::optional(
            "billing_day",
            FieldKind::Integer {
                min: Some(1),
                max: Some(31),
            },
        ),
        FieldSpec::optional(
            "monthly_fee",
            FieldKind::Number {
                min: Some(0.0),
                max: None,
            },
        ),
        FieldSpec::optional(
            "payment_method",
            FieldKind::Enum(&["pix", "boleto", "credit_card", "bank_transfer"]),
        ),
        FieldSpec::optional("responsible_name", FieldKind::text(2)),
        FieldSpec::optional("responsible_document", FieldKind::text(11)),
    ],
};

pub const PATIENT_PERSONAL: RecordSchema = RecordSchema {
    table: "patients",
    conflict_key: ID_KEY,
    fields: &[
        ID,
        TENANT_ID,
        FieldSpec::required("full_name", FieldKind::text(2)),
        FieldSpec::optional("social_name", FieldKind::text(2)),
        FieldSpec::required("birth_date", FieldKind::Date),
        FieldSpec::required(
            "gender",
            FieldKind::Enum(&["female", "male", "other", "not_informed"]),
        ),
        FieldSpec::required("document_number", FieldKind::text(11)),
        FieldSpec::optional("phone", FieldKind::text(8)),
        FieldSpec::optional("email", FieldKind::Email),
        FieldSpec::optional("mother_name", FieldKind::text(2)),
    ],
};

pub const SUPPORT_MEMBER: RecordSchema = RecordSchema {
    table: "patient_support_members",
    conflict_key: ID_KEY,
    fields: &[
        ID,
        TENANT_ID,
        PATIENT_ID,
        FieldSpec::required("name", FieldKind::text(2)),
        FieldSpec::required("relationship", FieldKind::text(2)),
        FieldSpec::required("phone", FieldKind::text(8)),
        FieldSpec::optional("email", FieldKind::Email),
        FieldSpec::optional("is_primary", FieldKind::Boolean),
        FieldSpec::required(
            "permissions",
            FieldKind::List {
                item: &FieldKind::Enum(SUPPORT_PERMISSIONS),
                max_items: None,
            },
        ),
        FieldSpec::optional("notes", FieldKind::text(0)),
    ],
};

/// Payload accepted by the support-member delete action.
pub const SUPPORT_MEMBER_REF: RecordSchema = RecordSchema {
    table: "patient_support_members",
    conflict_key: ID_KEY,
    fields: &[FieldSpec::required("id", FieldKind::Uuid)],
};

pub const SUPPORT_PROFILE: RecordSchema = RecordSchema {
    table: "patient_support_profiles",
    conflict_key: PATIENT_KEY,
    fields: &[
        ID,
        TENANT_ID,
        PATIENT_ID,
        FieldSpec::required(
            "living_situation",
            FieldKind::Enum(&["alone", "with_family", "with_caregiver", "institution"]),
        ),
        FieldSpec::required("has_legal_guardian", FieldKind::Boolean),
        FieldSpec::nullable("primary_caregiver_id", FieldKind::Uuid),
        FieldSpec::optional("visiting_hours", FieldKind::text(0)),
        FieldSpec::optional("support_notes", FieldKind::text(0)),
    ],
};

pub const SHIFT_PRESENCE: RecordSchema = RecordSchema {
    table: "shift_presence",
    conflict_key: &["shift_id", "user_id"],
    fields: &[
        ID,
        TENANT_ID,
        FieldSpec::required("shift_id", FieldKind::bounded_text(1, 128)),
        FieldSpec::required("user_id", FieldKind::text(1)),
        FieldSpec::required(
            "state",
            FieldKind::Enum(&["offline", "online", "on_break", "unresponsive"]),
        ),
        FieldSpec::nullable("meta", FieldKind::Json),
        FieldSpec::required("last_seen_at", FieldKind::Timestamp),
    ],
};

pub const SHIFT_POST: RecordSchema = RecordSchema {
    table: "shift_posts",
    conflict_key: ID_KEY,
    fields: &[
        ID,
        TENANT_ID,
        FieldSpec::required("shift_id", FieldKind::bounded_text(1, 128)),
        FieldSpec::required("author_id", FieldKind::text(1)),
        FieldSpec::required("content", FieldKind::bounded_text(1, 4000)),
        FieldSpec::required("pinned", FieldKind::Boolean),
        FieldSpec::required(
            "attachments",
            FieldKind::List {
                item: &FieldKind::Json,
                max_items: Some(10),
            },
        ),
    ],
};

pub const SHIFT: RecordSchema = RecordSchema {
    table: "shifts",
    conflict_key: ID_KEY,
    fields: &[
        FieldSpec::required(
            "status",
            FieldKind::Enum(&[
                "scheduled",
                "published",
                "assigned",
                "in_progress",
                "completed",
                "cancelled",
            ]),
        ),
        FieldSpec::nullable("meta", FieldKind::Json),
    ],
};
