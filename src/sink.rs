use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use log::{info, warn};
use rusqlite::{Connection, params};
use serde_json::json;

use crate::config::Settings;
use crate::error::EngineError;
use crate::feedback::{Cell, FeedbackRecord};
use crate::http_client::http_client;

/// A feedback row tagged with the model version whose column layout it uses.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRow {
    pub version: String,
    pub cells: Vec<Cell>,
}

/// Append-only destination for feedback rows. Each call writes one row or
/// nothing; rows are never read back through this trait.
pub trait FeedbackSink: Send + Sync {
    fn name(&self) -> &str;
    fn append(&self, row: &FeedbackRow) -> Result<()>;
}

/// Appends `record` once. Failures come back as [`EngineError::SinkUnavailable`]
/// and are not retried.
pub fn submit(sink: &dyn FeedbackSink, record: &FeedbackRecord) -> Result<(), EngineError> {
    let row = FeedbackRow {
        version: record.version.clone(),
        cells: record.to_row(),
    };
    match sink.append(&row) {
        Ok(()) => {
            info!(
                "appended feedback for {} ({}) to {}",
                record.player_name,
                record.version,
                sink.name()
            );
            Ok(())
        }
        Err(err) => {
            warn!("feedback append to {} failed: {err:#}", sink.name());
            Err(EngineError::SinkUnavailable(format!("{err:#}")))
        }
    }
}

/// Sink chosen by `settings`: HTTP when an endpoint is configured, else the
/// local SQLite corpus.
pub fn open_sink(settings: &Settings) -> Result<Box<dyn FeedbackSink>> {
    if let Some(url) = settings.sink_url.as_deref() {
        let sink = HttpSink::new(url, settings.sink_token.clone(), settings.sink_timeout);
        return Ok(Box::new(sink));
    }
    let path = settings
        .feedback_db
        .as_deref()
        .context("unable to resolve feedback database path")?;
    Ok(Box::new(SqliteSink::open(path)?))
}

#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<Vec<FeedbackRow>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<FeedbackRow> {
        self.rows
            .lock()
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }
}

impl FeedbackSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn append(&self, row: &FeedbackRow) -> Result<()> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?;
        rows.push(row.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StoredFeedback {
    pub id: i64,
    pub version: String,
    pub submitted_at: String,
    pub cells: Vec<Cell>,
}

pub struct SqliteSink {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_db(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self, version: Option<&str>) -> Result<Vec<StoredFeedback>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("feedback db lock poisoned"))?;
        load_rows(&conn, version)
    }
}

impl FeedbackSink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn append(&self, row: &FeedbackRow) -> Result<()> {
        let json = serde_json::to_string(&row.cells).context("serialize feedback row")?;
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("feedback db lock poisoned"))?;
        conn.execute(
            "INSERT INTO feedback (model_version, submitted_at, row_json) VALUES (?1, ?2, ?3)",
            params![row.version, Utc::now().to_rfc3339(), json],
        )
        .with_context(|| format!("insert feedback row into {}", self.path.display()))?;
        Ok(())
    }
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            model_version TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            row_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_feedback_version ON feedback(model_version);
        "#,
    )
    .context("init feedback schema")?;
    Ok(())
}

/// Stored rows in insertion order, optionally limited to one model version.
pub fn load_rows(conn: &Connection, version: Option<&str>) -> Result<Vec<StoredFeedback>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, model_version, submitted_at, row_json FROM feedback
             WHERE ?1 IS NULL OR model_version = ?1
             ORDER BY id",
        )
        .context("prepare feedback query")?;
    let raw_rows = stmt
        .query_map(params![version], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
            ))
        })
        .context("query feedback rows")?;

    let mut out = Vec::new();
    for item in raw_rows {
        let (id, version, submitted_at, json) = item.context("read feedback row")?;
        let cells = serde_json::from_str::<Vec<Cell>>(&json)
            .with_context(|| format!("parse feedback row {id}"))?;
        out.push(StoredFeedback {
            id,
            version,
            submitted_at,
            cells,
        });
    }
    Ok(out)
}

/// Posts each row as `{"values": [[...]]}`, the shape spreadsheet append
/// endpoints accept.
pub struct HttpSink {
    url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpSink {
    pub fn new(url: &str, token: Option<String>, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            token,
            timeout,
        }
    }
}

impl FeedbackSink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    fn append(&self, row: &FeedbackRow) -> Result<()> {
        let client = http_client(self.timeout)?;
        // The shared client keeps its first timeout; bound this call by ours.
        let mut req = client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&json!({ "values": [row.cells] }));
        if let Some(token) = self.token.as_deref() {
            req = req.bearer_auth(token);
        }
        let resp = req.send().context("append request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("http {}: {}", status, body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(version: &str, name: &str) -> FeedbackRow {
        FeedbackRow {
            version: version.to_string(),
            cells: vec![Cell::Text(name.to_string()), Cell::Number(51.0), Cell::Int(1)],
        }
    }

    #[test]
    fn sqlite_rows_filter_by_version_in_insert_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteSink::open(&dir.path().join("fb.sqlite")).unwrap();
        sink.append(&row("v1", "a")).unwrap();
        sink.append(&row("v2", "b")).unwrap();
        sink.append(&row("v1", "c")).unwrap();

        let all = sink.rows(None).unwrap();
        assert_eq!(all.len(), 3);
        let v1 = sink.rows(Some("v1")).unwrap();
        let names: Vec<_> = v1.iter().map(|r| r.cells[0].to_string()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(v1[0].cells, row("v1", "a").cells);
    }

    #[test]
    fn memory_sink_keeps_duplicates() {
        let sink = MemorySink::new();
        sink.append(&row("v1", "a")).unwrap();
        sink.append(&row("v1", "a")).unwrap();
        assert_eq!(sink.rows().len(), 2);
    }
}
