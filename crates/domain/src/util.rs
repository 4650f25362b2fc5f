use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// Identifier for rows whose id is assigned server-side.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Time-ordered identifier for append-only entries.
pub fn new_event_id() -> String {
    Uuid::now_v7().to_string()
}

pub fn now_rfc3339() -> String {
    format_rfc3339(OffsetDateTime::now_utc())
}

pub fn format_rfc3339(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub fn parse_rfc3339(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).ok()
}

/// Accepts only the canonical hyphenated form, the one Postgres echoes back.
pub fn is_hyphenated_uuid(value: &str) -> bool {
    value.len() == 36 && Uuid::parse_str(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_canonical_uuids() {
        assert!(is_hyphenated_uuid(&new_record_id()));
        assert!(is_hyphenated_uuid(&new_event_id()));
        assert!(!is_hyphenated_uuid("3f2b9c1e8a7d4e6f9b0c1d2e3f4a5b6c"));
        assert!(!is_hyphenated_uuid("s1"));
    }

    #[test]
    fn rfc3339_round_trips_through_parse() {
        let now = now_rfc3339();
        assert!(parse_rfc3339(&now).is_some());
        assert!(parse_rfc3339("yesterday").is_none());
    }
}
