//! Clinician Assistant binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Open the SQLite database (records + conversation history)
//! 3. Build the assistant pipeline
//! 4. Start the axum REST API server

mod cli;

use std::sync::Arc;

use clap::Parser;

use clinician_api::{start_server, AppState};
use clinician_chat::Assistant;
use clinician_core::config::ClinicianConfig;
use clinician_storage::{seed_demo_records, Database, SqliteConversationStore, SqliteRecordStore};

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ClinicianConfig::load_or_default(&config_file);
    args.apply(&mut config);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Clinician Assistant v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let db_path = config.database_path();
    let db = match Database::new(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!(path = %db_path.display(), error = %e, "Failed to open database");
            return Err(e.into());
        }
    };

    let records = Arc::new(SqliteRecordStore::new(Arc::clone(&db)));
    if args.demo_data {
        let seeded = seed_demo_records(&records, chrono::Local::now().date_naive())?;
        tracing::info!(patients = seeded, "Demo data ready");
    }
    let conversations = Arc::new(SqliteConversationStore::new(db));

    if !config.assistant.enabled {
        tracing::warn!("Assistant disabled in config; messages will be rejected");
    }
    let assistant = Assistant::new(records, conversations, config.assistant.clone());

    // API server.
    let port = config.general.port;
    let state = AppState::new(assistant, port);
    if let Err(e) = start_server(port, state).await {
        tracing::error!(port, error = %e, "API server stopped");
        tracing::error!("Try: CLINICIAN_PORT={} clinician", port.saturating_add(1));
        return Err(e.into());
    }

    Ok(())
}
