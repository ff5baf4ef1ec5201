use anyhow::{Context, Result};
use blog_translations::config::Config;
use blog_translations::db::PgStore;
use blog_translations::gemini::GeminiClient;
use blog_translations::settings::{migrate_api_key_to_secrets, resolve_settings};
use blog_translations::{TranslationError, Translator};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("blog_translations=info".parse()?)
                .add_directive("translate_posts=info".parse()?),
        )
        .init();

    info!("Starting post translation migration");

    // Load configuration from environment
    let config = Config::from_env()?;

    // Step 1: Connect and make sure the schema exists
    let store = PgStore::connect(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    store.migrate().await.context("Failed to set up schema")?;

    // Step 2: Move a legacy api key out of site settings
    if migrate_api_key_to_secrets(&store).await? {
        info!("Moved gemini_api_key from settings to app secrets");
    }

    // Step 3: Translate everything that is missing
    let settings = resolve_settings(&store).await?;
    let engine = GeminiClient::from_config(&config).context("Failed to build HTTP client")?;
    let translator = Translator::new(Arc::new(store), Arc::new(engine));

    match translator.translate_all_posts(&settings).await {
        Ok(summary) => {
            info!("All posts translated ({})", summary);
            Ok(())
        }
        Err(TranslationError::Incomplete(summary)) => {
            error!("Some posts could not be translated: {}", summary);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
