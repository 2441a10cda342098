use crate::calc::{CalcSettings, RoundingMode};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

const CALC_KEY: &str = "setup.calc";

/// Saved calc settings merged over the defaults. A malformed saved value
/// falls back to the defaults rather than blocking every summary.
pub fn load_calc_settings(conn: &rusqlite::Connection) -> anyhow::Result<CalcSettings> {
    let Some(saved) = db::settings_get_json(conn, CALC_KEY)? else {
        return Ok(CalcSettings::default());
    };
    match serde_json::from_value::<CalcSettings>(saved) {
        Ok(v) => Ok(v),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed calc settings");
            Ok(CalcSettings::default())
        }
    }
}

fn apply_calc_patch(current: &mut CalcSettings, patch: &Map<String, Value>) -> Result<(), String> {
    for (k, v) in patch {
        match k.as_str() {
            "roundingMode" => {
                let Some(mode) = v.as_str().and_then(RoundingMode::parse) else {
                    return Err("roundingMode must be \"halfUp\" or \"halfEven\"".to_string());
                };
                current.rounding_mode = mode;
            }
            _ => return Err(format!("unknown calc field: {}", k)),
        }
    }
    Ok(())
}

fn calc_json(settings: &CalcSettings) -> Value {
    json!({ "roundingMode": settings.rounding_mode.as_str() })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match load_calc_settings(conn) {
        Ok(calc) => ok(&req.id, json!({ "calc": calc_json(&calc) })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(section) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    if section != "calc" {
        return err(&req.id, "bad_params", "unknown section", None);
    }
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_calc_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = apply_calc_patch(&mut current, patch) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, CALC_KEY, &calc_json(&current)) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
