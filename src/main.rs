use domain::error::Error;
use domain::gateway::{
    assembly_ai::AssemblyAiClient, mailersend::MailerSendClient, open_ai::OpenAiClient,
    stripe::StripeClient, uploadthing::UploadThingClient,
};
use domain::jobs::{self, DatabaseEventBus, JobContext, JobSettings, Worker, WorkerSettings};
use log::{error, info};
use service::{config::Config, logging::Logger, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!(
        "Starting Shadow job worker ({} environment)",
        config.runtime_env()
    );

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    let app_state = AppState::new(config, &db);

    let ctx = match job_context(&app_state) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("Failed to configure external providers: {e}");
            std::process::exit(1);
        }
    };

    let worker = Worker::new(
        Arc::clone(&app_state.database_connection),
        jobs::dispatcher(ctx),
        WorkerSettings::from_config(&app_state.config),
    );

    worker.run(shutdown_signal()).await;
}

/// Builds every external provider client from config.
fn job_context(app_state: &AppState) -> Result<JobContext, Error> {
    let config = &app_state.config;
    let db = Arc::clone(&app_state.database_connection);

    Ok(JobContext {
        transcription: Arc::new(AssemblyAiClient::from_config(config)?),
        analysis: Arc::new(OpenAiClient::from_config(config)?),
        storage: Arc::new(UploadThingClient::from_config(config)?),
        billing: Arc::new(StripeClient::from_config(config)?),
        mailer: Arc::new(MailerSendClient::from_config(config)?),
        events: Arc::new(DatabaseEventBus::new(Arc::clone(&db))),
        settings: JobSettings::from_config(config),
        db,
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested, finishing the current run"),
        Err(e) => {
            error!("Failed to listen for the shutdown signal: {e}");
            std::future::pending::<()>().await
        }
    }
}
