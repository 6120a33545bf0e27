use crate::db;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Env var holding the tracing filter directive.
pub const LOG_ENV: &str = "SUMMARYD_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Summary,
    Display,
}

impl SetupSection {
    pub const ALL: [SetupSection; 2] = [SetupSection::Summary, SetupSection::Display];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "summary" => Some(Self::Summary),
            "display" => Some(Self::Display),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Display => "display",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Summary => "setup.summary",
            Self::Display => "setup.display",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Summary => json!({
            "identityDelimiter": "_",
            "rankedByDefault": false,
            "requireSuperuser": true
        }),
        SetupSection::Display => json!({
            "showZeroRowByDefault": false,
            "timeFormat": "seconds"
        }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    Seconds,
    Hms,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySettings {
    pub identity_delimiter: String,
    pub ranked_by_default: bool,
    pub require_superuser: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    pub show_zero_row_by_default: bool,
    pub time_format: TimeFormat,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub summary: SummarySettings,
    pub display: DisplaySettings,
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_string_len(v: &Value, key: &str, min_len: usize, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let n = s.chars().count();
    if n < min_len || n > max_len {
        return Err(format!("{} length must be in {}..={}", key, min_len, max_len));
    }
    Ok(s.to_string())
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Summary => match k.as_str() {
                // Not trimmed: a space is a legitimate delimiter.
                "identityDelimiter" => {
                    obj.insert(k.clone(), Value::String(parse_string_len(v, k, 1, 4)?));
                }
                "rankedByDefault" | "requireSuperuser" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown summary field: {}", k)),
            },
            SetupSection::Display => match k.as_str() {
                "showZeroRowByDefault" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "timeFormat" => {
                    let f = parse_string_len(v, k, 1, 16)?.trim().to_ascii_lowercase();
                    if f != "seconds" && f != "hms" {
                        return Err("timeFormat must be one of: seconds, hms".into());
                    }
                    obj.insert(k.clone(), Value::String(f));
                }
                _ => return Err(format!("unknown display field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

pub fn load(conn: &Connection) -> anyhow::Result<Config> {
    Ok(Config {
        summary: serde_json::from_value(load_section(conn, SetupSection::Summary)?)?,
        display: serde_json::from_value(load_section(conn, SetupSection::Display)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn
    }

    #[test]
    fn defaults_apply_without_saved_settings() {
        let cfg = load(&conn()).expect("load");
        assert_eq!(cfg.summary.identity_delimiter, "_");
        assert!(!cfg.summary.ranked_by_default);
        assert!(cfg.summary.require_superuser);
        assert_eq!(cfg.display.time_format, TimeFormat::Seconds);
    }

    #[test]
    fn patch_validation_rejects_bad_values() {
        let mut cur = default_section(SetupSection::Summary);
        let bad = json!({ "identityDelimiter": "" });
        assert!(merge_section_patch(SetupSection::Summary, &mut cur, bad.as_object().unwrap()).is_err());
        let unknown = json!({ "colour": "red" });
        assert!(
            merge_section_patch(SetupSection::Summary, &mut cur, unknown.as_object().unwrap())
                .is_err()
        );

        let mut disp = default_section(SetupSection::Display);
        let fmt = json!({ "timeFormat": "HMS" });
        merge_section_patch(SetupSection::Display, &mut disp, fmt.as_object().unwrap())
            .expect("merge");
        assert_eq!(disp["timeFormat"], "hms");
    }

    #[test]
    fn malformed_saved_values_fall_back_to_defaults() {
        let conn = conn();
        db::settings_set_json(
            &conn,
            SetupSection::Summary.key(),
            &json!({ "identityDelimiter": 7, "rankedByDefault": true }),
        )
        .expect("set");
        let cfg = load(&conn).expect("load");
        assert_eq!(cfg.summary.identity_delimiter, "_");
    }

    #[test]
    fn saved_values_override_defaults() {
        let conn = conn();
        db::settings_set_json(
            &conn,
            SetupSection::Summary.key(),
            &json!({ "identityDelimiter": "|", "rankedByDefault": true }),
        )
        .expect("set");
        let cfg = load(&conn).expect("load");
        assert_eq!(cfg.summary.identity_delimiter, "|");
        assert!(cfg.summary.ranked_by_default);
    }
}
