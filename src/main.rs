use clap::Parser;
use custom_reports_lib::config::AppConfig;
use custom_reports_lib::logging::init_tracing;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config = AppConfig::parse();

    if let Err(error) = init_tracing(config.log_dir.as_deref()) {
        eprintln!("failed to initialize logging: {error}");
        return ExitCode::FAILURE;
    }

    match custom_reports_lib::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "server error");
            eprintln!("Server error: {error}");
            ExitCode::FAILURE
        }
    }
}
