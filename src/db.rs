use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("summaryd.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS organizations(
            slug TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            username TEXT PRIMARY KEY,
            is_superuser INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // last_name carries the composite identity string, e.g. 201_12_DelaCruz_Juan.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS members(
            id TEXT PRIMARY KEY,
            organization_slug TEXT NOT NULL,
            username TEXT NOT NULL,
            last_name TEXT NOT NULL,
            FOREIGN KEY(organization_slug) REFERENCES organizations(slug)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_members_org ON members(organization_slug, last_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS problems(
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            points REAL NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS contests(
            key TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            start_time TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id TEXT PRIMARY KEY,
            problem_code TEXT NOT NULL,
            member_id TEXT NOT NULL,
            points REAL,
            date TEXT NOT NULL,
            FOREIGN KEY(problem_code) REFERENCES problems(code),
            FOREIGN KEY(member_id) REFERENCES members(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_pair ON submissions(problem_code, member_id)",
        [],
    )?;

    // Workspaces created before contest tracking have no contest_key column.
    ensure_submissions_contest_key(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn ensure_submissions_contest_key(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "submissions", "contest_key")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE submissions ADD COLUMN contest_key TEXT REFERENCES contests(key)",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
