use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::{GradeSymbol, Hundredths};
use chrono::NaiveDate;
use rusqlite::Connection;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Trimmed string param; blank counts as absent.
pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .and_then(|s| if s.is_empty() { None } else { Some(s) })
}

pub fn optional_i64(req: &Request, key: &str) -> Result<Option<i64>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be an integer", key),
                None,
            )
        }),
    }
}

pub fn grade_symbol(req: &Request, raw: &str) -> Result<GradeSymbol, serde_json::Value> {
    GradeSymbol::parse(raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("unknown grade symbol: {}", raw),
            None,
        )
    })
}

/// Accepts a JSON number or a decimal string. Either way the literal text is
/// parsed (serde_json keeps number text with `arbitrary_precision`), so an
/// over-long fraction is rejected instead of being rounded through f64.
pub fn score_param(req: &Request, key: &str) -> Result<Option<Hundredths>, serde_json::Value> {
    let text = match req.params.get(key) {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(_) => {
            return Err(err(
                &req.id,
                "bad_params",
                format!("{} must be a number", key),
                None,
            ))
        }
    };
    Hundredths::parse_score(&text)
        .map(Some)
        .map_err(|e| err(&req.id, "bad_params", format!("{}: {}", key, e), None))
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
