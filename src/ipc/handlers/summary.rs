use crate::backend::SqliteBackend;
use crate::config;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::summary::{build_report, ReportMode, ReportRequest, SummaryError};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::{json, Value};

fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Query-string style flag: any non-empty string except "0"/"false" is on.
fn parse_flag(v: &Value) -> Option<bool> {
    match v {
        Value::Null => None,
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().map(|x| x != 0.0).unwrap_or(false)),
        Value::String(s) => {
            let t = s.trim();
            Some(!(t.is_empty() || t == "0" || t.eq_ignore_ascii_case("false")))
        }
        _ => None,
    }
}

fn optional_flag(req: &Request, key: &str) -> Result<Option<bool>, Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) => match parse_flag(v) {
            Some(b) => Ok(Some(b)),
            None if v.is_null() => Ok(None),
            None => Err(err(
                &req.id,
                "bad_params",
                format!("{} must be boolean, number or string", key),
                Some(json!({ key: v })),
            )),
        },
    }
}

fn parse_as_of(req: &Request) -> Result<DateTime<Utc>, Value> {
    match req.params.get("asOf") {
        None | Some(Value::Null) => Ok(Utc::now()),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| {
                err(
                    &req.id,
                    "bad_params",
                    format!("asOf must be an RFC 3339 timestamp: {}", e),
                    None,
                )
            }),
        Some(_) => Err(err(&req.id, "bad_params", "asOf must be a string", None)),
    }
}

fn summary_err(req: &Request, e: SummaryError) -> Value {
    err(&req.id, e.code(), e.to_string(), e.details())
}

fn handle_summary(state: &mut AppState, req: &Request, mode: ReportMode) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let group_slug = match required_str(req, "group") {
        Ok(v) => v,
        Err(e) => return e,
    };
    // An empty prefix is legal and selects no items.
    let problem_prefix = match required_str(req, "problemPrefix") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ranked = match optional_flag(req, "ranked") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let zero_row = match optional_flag(req, "zeroRow") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let as_of = match parse_as_of(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let requester = req
        .params
        .get("requester")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let cfg = match config::load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let request = ReportRequest {
        mode,
        group_slug,
        problem_prefix,
        ranked: ranked.unwrap_or(cfg.summary.ranked_by_default),
        zero_row: zero_row.unwrap_or(cfg.display.show_zero_row_by_default),
        requester,
        require_superuser: cfg.summary.require_superuser,
        identity_delimiter: cfg.summary.identity_delimiter.clone(),
        as_of,
    };

    let backend = SqliteBackend::new(conn);
    match build_report(&backend, &request) {
        Ok(report) => ok(&req.id, report.to_json(cfg.display.time_format)),
        Err(e) => summary_err(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "summary.overall" => Some(handle_summary(state, req, ReportMode::Overall)),
        "summary.completion" => Some(handle_summary(state, req, ReportMode::Completion)),
        _ => None,
    }
}
