//! services/tutor/src/bin/tutor.rs

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tutor_core::ports::{AuthService, ContentStore, KeyValueStore, LanguageModel, SystemClock};
use tutor_lib::{
    adapters::{FileStore, OpenAiChatAdapter, PgAuthService, PgContentStore, UnconfiguredModel},
    app::{App, Reply},
    command::Command,
    config::Config,
    error::AppError,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Starting tutor...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let content_store = PgContentStore::new(db_pool.clone());
    info!("Running database migrations...");
    content_store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let local: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.local_store_path)?);
    let auth: Arc<dyn AuthService> = Arc::new(PgAuthService::new(
        db_pool,
        local.clone(),
        config.require_email_confirmation,
    ));
    let store: Arc<dyn ContentStore> = Arc::new(content_store);
    let model: Arc<dyn LanguageModel> = match &config.llm_api_key {
        Some(key) => Arc::new(OpenAiChatAdapter::connect(
            key,
            &config.llm_api_base,
            config.llm_model.clone(),
        )),
        None => {
            warn!("No LLM API key configured; AI features will show placeholders.");
            Arc::new(UnconfiguredModel)
        }
    };

    // --- 4. Run the Shell ---
    let mut app = App::new(&config, auth, store, model, local, Arc::new(SystemClock));
    app.start().await;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout
            .write_all(format!("[{}]> ", app.current_view()).as_bytes())
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                stdout.write_all(format!("{}\n", e).as_bytes()).await?;
                continue;
            }
        };

        let output = match app.handle(command).await {
            Ok(Reply::Quit) => break,
            Ok(Reply::Lines(lines)) => lines,
            Err(e) => vec![format!("Error: {}", e)],
        };
        for line in output {
            stdout.write_all(format!("{}\n", line).as_bytes()).await?;
        }
    }

    info!("Goodbye.");
    Ok(())
}
