use crate::store::StoreError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn store_err(id: &str, e: &StoreError) -> serde_json::Value {
    let details = match e {
        StoreError::Duplicate { table, fields } => Some(json!({
            "table": table,
            "fields": fields,
        })),
        StoreError::NotFound { entity, key } => Some(json!({
            "entity": entity,
            "key": key,
        })),
        StoreError::Invalid { field, .. } => Some(json!({ "field": field })),
        StoreError::Db(_) => None,
    };
    err(id, e.code(), e.to_string(), details)
}

pub fn not_found(id: &str, entity: &'static str, key: &str) -> serde_json::Value {
    store_err(
        id,
        &StoreError::NotFound {
            entity,
            key: key.to_string(),
        },
    )
}

/// Error line for input that could not be parsed far enough to read an id.
pub fn bad_json(message: impl Into<String>) -> serde_json::Value {
    json!({
        "ok": false,
        "error": {
            "code": "bad_json",
            "message": message.into(),
        }
    })
}
