use crate::config::ServiceSettings;
use crate::db::ReportStore;
use crate::errors::{AppError, AppResult};
use crate::export::export_report_csv;
use crate::generator::generate_rows;
use crate::mailer::{MailAttachment, MailTransport, OutgoingMail};
use crate::models::{
    CreateReportResponse, CsvExport, GenerateReportResponse, Metric, NewReport, ReportData, ReportDetail,
    ReportSummary, Row,
};
use chrono::{NaiveDate, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

const REPORT_NOT_FOUND: &str = "Report not found";
const REPORT_DATA_NOT_FOUND: &str = "Report data not found";

/// Orchestrates report operations over a store, the generator, CSV export and
/// mail delivery.
pub struct ReportService {
    store: Arc<dyn ReportStore>,
    mailer: Arc<dyn MailTransport>,
    settings: ServiceSettings,
}

impl ReportService {
    pub fn new(store: Arc<dyn ReportStore>, mailer: Arc<dyn MailTransport>, settings: ServiceSettings) -> Self {
        Self {
            store,
            mailer,
            settings,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn list_reports(&self) -> AppResult<Vec<ReportSummary>> {
        self.store.list_reports()
    }

    pub fn create_report(&self, payload: NewReport) -> AppResult<CreateReportResponse> {
        if payload.name.trim().is_empty() {
            return Err(AppError::Validation("Report name is required".to_string()));
        }
        if payload.name.chars().any(char::is_control) {
            return Err(AppError::Validation(
                "Report name must not contain control characters".to_string(),
            ));
        }
        if self.settings.strict_metrics {
            let unknown = Metric::unknown_names(&payload.metrics);
            if !unknown.is_empty() {
                return Err(AppError::Validation(format!("Unknown metrics: {}", unknown.join(", "))));
            }
        }

        let report = self.store.create_report(payload)?;
        info!(report_id = %report.id, metrics = report.metrics.len(), "report created");

        Ok(CreateReportResponse {
            id: report.id,
            message: "Report created successfully".to_string(),
        })
    }

    pub fn get_report(&self, report_id: &str) -> AppResult<ReportDetail> {
        self.store
            .get_report(report_id)?
            .ok_or_else(|| AppError::NotFound(REPORT_NOT_FOUND.to_string()))
    }

    pub fn generate_report_data(&self, report_id: &str) -> AppResult<GenerateReportResponse> {
        let mut rng = rand::rng();
        self.generate_report_data_with(report_id, Utc::now().date_naive(), &mut rng)
    }

    /// Generation with an explicit calendar date and random source.
    pub fn generate_report_data_with<R: Rng + ?Sized>(
        &self,
        report_id: &str,
        today: NaiveDate,
        rng: &mut R,
    ) -> AppResult<GenerateReportResponse> {
        let report = self.get_report(report_id)?.report;
        let rows = generate_rows(&report.metrics, self.settings.row_count, today, rng);
        let saved = self.store.append_report_data(&report.id, &rows)?;
        info!(report_id = %report.id, report_data_id = %saved.id, rows = rows.len(), "report data generated");

        let preview = rows.into_iter().take(self.settings.preview_rows).collect();
        Ok(GenerateReportResponse {
            message: "Report data generated successfully".to_string(),
            data: preview,
        })
    }

    pub fn get_report_data(&self, report_id: &str) -> AppResult<Vec<Row>> {
        Ok(self.latest_data(report_id)?.data)
    }

    pub fn email_report(&self, report_id: &str, recipient: &str) -> AppResult<()> {
        let recipient = recipient.trim();
        if recipient.is_empty() || !recipient.contains('@') {
            return Err(AppError::Validation("A valid email address is required".to_string()));
        }

        let report = self.get_report(report_id)?.report;
        let data = self.latest_data(&report.id)?;
        let export = self.export(&report.name, &data.data)?;

        self.mailer.send(&OutgoingMail {
            from: self.settings.mail_from.clone(),
            to: recipient.to_string(),
            subject: format!("Custom Report: {}", report.name),
            text: format!("Please find attached the custom report \"{}\".", report.name),
            attachments: vec![MailAttachment {
                file_name: export.file_name,
                content_type: "text/csv".to_string(),
                bytes: export.bytes,
            }],
        })?;
        info!(report_id = %report.id, to = recipient, "report emailed");
        Ok(())
    }

    pub fn download_report_csv(&self, report_id: &str) -> AppResult<CsvExport> {
        let report = self.get_report(report_id)?.report;
        let data = self.latest_data(&report.id)?;
        self.export(&report.name, &data.data)
    }

    fn latest_data(&self, report_id: &str) -> AppResult<ReportData> {
        self.store
            .latest_report_data(report_id)?
            .ok_or_else(|| AppError::NotFound(REPORT_DATA_NOT_FOUND.to_string()))
    }

    fn export(&self, report_name: &str, rows: &[Row]) -> AppResult<CsvExport> {
        export_report_csv(report_name, rows).inspect_err(|error| {
            warn!(report = report_name, error = %error, "report export rejected");
        })
    }
}
