use crate::errors::{AppError, AppResult};
use crate::models::{CsvExport, Metric, Row};
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Download/attachment name for a report: whitespace runs become `_`.
pub fn export_file_name(report_name: &str) -> String {
    format!("{}.csv", WHITESPACE_RUN.replace_all(report_name, "_"))
}

/// Serializes rows as CSV using the first row's column order as the header.
///
/// There must be at least one row to infer the header from.
pub fn render_csv(rows: &[Row]) -> AppResult<Vec<u8>> {
    let Some(first) = rows.first() else {
        return Err(AppError::Precondition("Report data is empty; nothing to export".to_string()));
    };
    let columns: Vec<Metric> = first.metrics().collect();

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(columns.iter().map(|metric| metric.as_str()))?;
    for row in rows {
        writer.write_record(columns.iter().map(|metric| {
            row.get(*metric).map(|value| value.to_field()).unwrap_or_default()
        }))?;
    }

    writer
        .into_inner()
        .map_err(|error| AppError::Io(format!("Failed to flush CSV writer: {}", error)))
}

pub fn export_report_csv(report_name: &str, rows: &[Row]) -> AppResult<CsvExport> {
    Ok(CsvExport {
        file_name: export_file_name(report_name),
        bytes: render_csv(rows)?,
    })
}
