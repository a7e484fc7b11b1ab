use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_ROW_COUNT: usize = 100;
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

const SQLITE_FILE_NAME: &str = "custom_reports.db";
const DOCUMENT_FILE_NAME: &str = "custom_reports.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum StoreBackend {
    Sqlite,
    Document,
}

/// Custom report service
#[derive(Parser, Debug, Clone)]
#[command(name = "custom-reports")]
#[command(author, version, about = "Report definitions, mock data synthesis and CSV export over HTTP")]
pub struct AppConfig {
    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Persistence backend
    #[arg(long, env = "REPORT_STORE", value_enum, default_value_t = StoreBackend::Sqlite)]
    pub store: StoreBackend,

    /// Directory holding the store file
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Directory where outgoing report mail is spooled
    #[arg(long, env = "MAIL_OUTBOX_DIR", default_value = "./data/outbox")]
    pub outbox_dir: PathBuf,

    /// Sender address for report mail
    #[arg(long, env = "EMAIL_USER", default_value = "reports@localhost")]
    pub mail_from: String,

    /// Rows synthesized per generation
    #[arg(long, env = "REPORT_ROW_COUNT", default_value_t = DEFAULT_ROW_COUNT)]
    pub row_count: usize,

    /// Rows returned in the generation preview
    #[arg(long, env = "REPORT_PREVIEW_ROWS", default_value_t = DEFAULT_PREVIEW_ROWS)]
    pub preview_rows: usize,

    /// Reject report definitions that name unknown metrics
    #[arg(long, env = "STRICT_METRICS", default_value_t = false)]
    pub strict_metrics: bool,

    /// Write JSON logs to a daily rolling file in this directory instead of stdout
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn socket_address(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|error| anyhow::anyhow!("invalid listen address {}:{}: {}", self.host, self.port, error))
    }

    pub fn store_path(&self) -> PathBuf {
        match self.store {
            StoreBackend::Sqlite => self.data_dir.join(SQLITE_FILE_NAME),
            StoreBackend::Document => self.data_dir.join(DOCUMENT_FILE_NAME),
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            row_count: self.row_count,
            preview_rows: self.preview_rows,
            strict_metrics: self.strict_metrics,
            mail_from: self.mail_from.clone(),
        }
    }
}

/// Knobs the report service reads on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub row_count: usize,
    pub preview_rows: usize,
    pub strict_metrics: bool,
    pub mail_from: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            row_count: DEFAULT_ROW_COUNT,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            strict_metrics: false,
            mail_from: "reports@localhost".to_string(),
        }
    }
}
