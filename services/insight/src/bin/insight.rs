//! services/insight/src/bin/insight.rs

use insight_lib::{
    adapters::{ErpDbAdapter, OllamaInferenceAdapter, PgConnectionProvider},
    config::Config,
    console::{AppState, ConsoleSession, Outcome},
    error::AppError,
};
use erp_insight_core::ports::{ConnectionService, InferenceService};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PROMPT: &str = "insight> ";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Starting the query console...");

    // --- 2. Initialize Adapters ---
    let provider = PgConnectionProvider::new(&config.database.url)?;
    if !provider.test_connection().await {
        warn!("The database is not reachable yet; queries will fail until it is.");
    }
    let connection = Arc::new(provider.clone());
    let repository = Arc::new(ErpDbAdapter::new(provider, config.database.read_only));

    let inference = Arc::new(OllamaInferenceAdapter::new(&config.inference)?);
    if !inference.is_available().await {
        warn!(
            "Ollama is not reachable at {}; answers will fall back to canned messages.",
            config.inference.base_url
        );
    }

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        connection,
        repository,
        inference,
        config.clone(),
    ));
    let mut session = ConsoleSession::new(app_state);

    // --- 4. Run the Console Loop ---
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"ERP insight console. Type :help for commands.\n")
        .await?;
    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match session.handle_line(&line).await {
            Outcome::Reply(text) => {
                stdout.write_all(text.as_bytes()).await?;
            }
            Outcome::Quit => break,
        }
    }

    info!(
        "Console closed after {} recorded queries.",
        session.history().len()
    );
    Ok(())
}
