mod document;

pub use document::DocumentStore;

use crate::errors::{AppError, AppResult};
use crate::models::{NewReport, Report, ReportData, ReportDetail, ReportSummary, Row, User};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Users created the first time a store is opened empty.
pub const SAMPLE_USERS: [(&str, &str); 2] = [
    ("John Doe", "john@example.com"),
    ("Jane Smith", "jane@example.com"),
];

/// Persistence seam for reports and their generated data.
///
/// Every backend returns reports newest first and resolves report data by
/// "latest wins": only the most recently appended snapshot is ever read.
pub trait ReportStore: Send + Sync {
    fn list_users(&self) -> AppResult<Vec<User>>;
    fn list_reports(&self) -> AppResult<Vec<ReportSummary>>;
    fn create_report(&self, report: NewReport) -> AppResult<Report>;
    fn get_report(&self, report_id: &str) -> AppResult<Option<ReportDetail>>;
    fn append_report_data(&self, report_id: &str, rows: &[Row]) -> AppResult<ReportData>;
    fn latest_report_data(&self, report_id: &str) -> AppResult<Option<ReportData>>;
}

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };

        db.seed_sample_users()?;

        Ok(db)
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    fn seed_sample_users(&self) -> AppResult<()> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        for (name, email) in SAMPLE_USERS {
            conn.execute(
                "INSERT INTO users (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), name, email, now],
            )?;
        }
        tracing::info!(path = %self.db_path.display(), "seeded sample users");
        Ok(())
    }
}

impl ReportStore for Database {
    fn list_users(&self) -> AppResult<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name, email, created_at FROM users ORDER BY created_at ASC, name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                created_at: parse_time(&row.get::<_, String>(3)?)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn list_reports(&self) -> AppResult<Vec<ReportSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT r.id, r.name, r.user_id, r.metrics_json, r.filters_json, r.created_at, u.name
             FROM reports r LEFT JOIN users u ON u.id = r.user_id
             ORDER BY r.created_at DESC, r.rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ReportSummary {
                report: parse_report_row(row)?,
                user_name: row.get(6)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn create_report(&self, report: NewReport) -> AppResult<Report> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let metrics_json = serde_json::to_string(&report.metrics)?;
        let filters_json = report.filters.as_ref().map(serde_json::to_string).transpose()?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO reports (id, name, user_id, metrics_json, filters_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, report.name, report.user_id, metrics_json, filters_json, now.to_rfc3339()],
        )?;

        Ok(Report {
            id,
            name: report.name,
            user_id: report.user_id,
            metrics: report.metrics,
            filters: report.filters,
            created_at: now,
        })
    }

    fn get_report(&self, report_id: &str) -> AppResult<Option<ReportDetail>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT r.id, r.name, r.user_id, r.metrics_json, r.filters_json, r.created_at, u.name, u.email
             FROM reports r LEFT JOIN users u ON u.id = r.user_id
             WHERE r.id = ?1",
            [report_id],
            |row| {
                Ok(ReportDetail {
                    report: parse_report_row(row)?,
                    user_name: row.get(6)?,
                    user_email: row.get(7)?,
                })
            },
        )
        .optional()
        .map_err(AppError::from)
    }

    fn append_report_data(&self, report_id: &str, rows: &[Row]) -> AppResult<ReportData> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let data_json = serde_json::to_string(rows)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO report_data (id, report_id, data_json, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, report_id, data_json, now.to_rfc3339()],
        )?;

        Ok(ReportData {
            id,
            report_id: report_id.to_string(),
            data: rows.to_vec(),
            created_at: now,
        })
    }

    fn latest_report_data(&self, report_id: &str) -> AppResult<Option<ReportData>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT id, report_id, data_json, created_at
                 FROM report_data WHERE report_id = ?1 ORDER BY created_at DESC, seq DESC LIMIT 1",
                [report_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        parse_time(&row.get::<_, String>(3)?)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, report_id, data_json, created_at)) = raw else {
            return Ok(None);
        };
        Ok(Some(ReportData {
            id,
            report_id,
            data: serde_json::from_str::<Vec<Row>>(&data_json)?,
            created_at,
        }))
    }
}

fn parse_report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Report> {
    let metrics_raw: String = row.get(3)?;
    let filters_raw: Option<String> = row.get(4)?;
    Ok(Report {
        id: row.get(0)?,
        name: row.get(1)?,
        user_id: row.get(2)?,
        metrics: serde_json::from_str::<Vec<String>>(&metrics_raw).unwrap_or_default(),
        filters: filters_raw
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .filter(|value| !value.is_null()),
        created_at: parse_time(&row.get::<_, String>(5)?)?,
    })
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}
