use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use crate::error::ApiError;

/// A field counts as missing when absent, `null` or an empty string.
pub fn require_fields(body: &Value, fields: &[&str], message: &str) -> Result<(), ApiError> {
    let missing = fields.iter().any(|field| match body.get(*field) {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(_) => false,
    });
    if missing {
        return Err(ApiError::BadRequest(message.to_string()));
    }
    Ok(())
}

/// Decodes an already-parsed JSON body into `T` and runs its field rules.
pub fn decode<T: DeserializeOwned + Validate>(body: Value) -> Result<T, ApiError> {
    let value: T = serde_json::from_value(body)
        .map_err(|err| ApiError::BadRequest(format!("invalid request body: {err}")))?;
    value
        .validate()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_strings_and_nulls_are_missing() {
        let fields = ["shiftId", "content"];
        let message = "shiftId and content are required";
        let complete = json!({ "shiftId": "s1", "content": "hi" });
        assert!(require_fields(&complete, &fields, message).is_ok());
        for body in [
            json!({ "shiftId": "s1" }),
            json!({ "shiftId": "s1", "content": "" }),
            json!({ "shiftId": null, "content": "hi" }),
            json!("not an object"),
        ] {
            let err = require_fields(&body, &fields, message).unwrap_err();
            assert_eq!(err.to_string(), message);
        }
    }
}
