use super::{ReportStore, SAMPLE_USERS};
use crate::errors::{AppError, AppResult};
use crate::models::{NewReport, Report, ReportData, ReportDetail, ReportSummary, Row, User};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collections {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    reports: Vec<Report>,
    #[serde(default)]
    report_data: Vec<ReportData>,
}

impl Collections {
    fn user(&self, user_id: Option<&str>) -> Option<&User> {
        let user_id = user_id?;
        self.users.iter().find(|user| user.id == user_id)
    }
}

/// Document-collection backend: `users`, `reports` and `report_data` kept as
/// JSON documents in memory and, when a path is given, mirrored to one file
/// after every write.
#[derive(Debug)]
pub struct DocumentStore {
    state: Mutex<Collections>,
    path: Option<PathBuf>,
}

impl DocumentStore {
    pub fn in_memory() -> AppResult<Self> {
        let store = Self {
            state: Mutex::new(Collections::default()),
            path: None,
        };
        store.seed_sample_users()?;
        Ok(store)
    }

    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let collections = if path.exists() {
            let raw = fs::read_to_string(path)?;
            if raw.trim().is_empty() {
                Collections::default()
            } else {
                serde_json::from_str::<Collections>(&raw)?
            }
        } else {
            Collections::default()
        };

        let store = Self {
            state: Mutex::new(collections),
            path: Some(path.to_path_buf()),
        };
        store.seed_sample_users()?;
        Ok(store)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Collections>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("document store mutex poisoned".to_string()))
    }

    fn seed_sample_users(&self) -> AppResult<()> {
        let mut state = self.lock()?;
        if !state.users.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        state.users.extend(SAMPLE_USERS.iter().map(|(name, email)| User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            created_at: now,
        }));
        self.persist(&state)
    }

    fn persist(&self, state: &Collections) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl ReportStore for DocumentStore {
    fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.lock()?.users.clone())
    }

    fn list_reports(&self) -> AppResult<Vec<ReportSummary>> {
        let state = self.lock()?;
        let mut reports: Vec<&Report> = state.reports.iter().rev().collect();
        reports.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(reports
            .into_iter()
            .map(|report| ReportSummary {
                report: report.clone(),
                user_name: state.user(report.user_id.as_deref()).map(|user| user.name.clone()),
            })
            .collect())
    }

    fn create_report(&self, report: NewReport) -> AppResult<Report> {
        let record = Report {
            id: Uuid::new_v4().to_string(),
            name: report.name,
            user_id: report.user_id,
            metrics: report.metrics,
            filters: report.filters,
            created_at: Utc::now(),
        };
        let mut state = self.lock()?;
        state.reports.push(record.clone());
        if let Err(error) = self.persist(&state) {
            state.reports.pop();
            return Err(error);
        }
        Ok(record)
    }

    fn get_report(&self, report_id: &str) -> AppResult<Option<ReportDetail>> {
        let state = self.lock()?;
        Ok(state
            .reports
            .iter()
            .find(|report| report.id == report_id)
            .map(|report| {
                let owner = state.user(report.user_id.as_deref());
                ReportDetail {
                    report: report.clone(),
                    user_name: owner.map(|user| user.name.clone()),
                    user_email: owner.map(|user| user.email.clone()),
                }
            }))
    }

    fn append_report_data(&self, report_id: &str, rows: &[Row]) -> AppResult<ReportData> {
        let record = ReportData {
            id: Uuid::new_v4().to_string(),
            report_id: report_id.to_string(),
            data: rows.to_vec(),
            created_at: Utc::now(),
        };
        let mut state = self.lock()?;
        state.report_data.push(record.clone());
        if let Err(error) = self.persist(&state) {
            state.report_data.pop();
            return Err(error);
        }
        Ok(record)
    }

    fn latest_report_data(&self, report_id: &str) -> AppResult<Option<ReportData>> {
        let state = self.lock()?;
        // max_by_key keeps the last of equal keys, i.e. the latest insert.
        Ok(state
            .report_data
            .iter()
            .filter(|data| data.report_id == report_id)
            .max_by_key(|data| data.created_at)
            .cloned())
    }
}
