use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "timetable.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_state(
            id INTEGER PRIMARY KEY CHECK (id = 1),
            snapshot_json TEXT NOT NULL,
            saved_at TEXT NOT NULL
        )",
        [],
    )?;
    // Workspaces created before derived-view caching have no hash column.
    ensure_timetable_state_content_hash(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshot_exports(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_name TEXT NOT NULL,
            path TEXT NOT NULL,
            grade TEXT NOT NULL,
            exported_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshot_exports_grade ON snapshot_exports(grade)",
        [],
    )?;

    Ok(conn)
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

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}

pub struct SavedState {
    pub snapshot_json: String,
    pub saved_at: String,
    pub content_hash: Option<String>,
}

pub fn state_load(conn: &Connection) -> anyhow::Result<Option<SavedState>> {
    let row = conn
        .query_row(
            "SELECT snapshot_json, saved_at, content_hash FROM timetable_state WHERE id = 1",
            [],
            |r| {
                Ok(SavedState {
                    snapshot_json: r.get(0)?,
                    saved_at: r.get(1)?,
                    content_hash: r.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn state_save(
    conn: &Connection,
    snapshot_json: &str,
    saved_at: &str,
    content_hash: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO timetable_state(id, snapshot_json, saved_at, content_hash)
         VALUES(1, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           snapshot_json = excluded.snapshot_json,
           saved_at = excluded.saved_at,
           content_hash = excluded.content_hash",
        (snapshot_json, saved_at, content_hash),
    )?;
    Ok(())
}

pub fn exports_record(
    conn: &Connection,
    file_name: &str,
    path: &str,
    grade: &str,
    exported_at: &str,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO snapshot_exports(file_name, path, grade, exported_at) VALUES(?, ?, ?, ?)",
        (file_name, path, grade, exported_at),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn exports_list(conn: &Connection, limit: i64) -> anyhow::Result<Vec<serde_json::Value>> {
    let mut stmt = conn.prepare(
        "SELECT id, file_name, path, grade, exported_at
         FROM snapshot_exports
         ORDER BY id DESC
         LIMIT ?",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            let id: i64 = row.get(0)?;
            let file_name: String = row.get(1)?;
            let path: String = row.get(2)?;
            let grade: String = row.get(3)?;
            let exported_at: String = row.get(4)?;
            Ok(serde_json::json!({
                "id": id,
                "fileName": file_name,
                "path": path,
                "grade": grade,
                "exportedAt": exported_at
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn ensure_timetable_state_content_hash(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "timetable_state", "content_hash")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE timetable_state ADD COLUMN content_hash TEXT", [])?;
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
