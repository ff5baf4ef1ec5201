//! Force a fresh translation of a single post into every target locale.
//!
//! Usage:
//!   cargo run --bin retranslate-post -- <post-id>
//!
//! Required environment variables:
//! - DATABASE_URL
//!
//! Optional:
//! - GEMINI_API_URL
//! - TRANSLATION_REQUEST_TIMEOUT_SECS (defaults to 60)
//! - TRANSLATION_RETRY_BACKOFF_MS (defaults to 1000)

use anyhow::{bail, Context, Result};
use blog_translations::config::Config;
use blog_translations::db::{PgStore, RecordStore};
use blog_translations::gemini::GeminiClient;
use blog_translations::settings::resolve_settings;
use blog_translations::Translator;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("blog_translations=info".parse()?)
                .add_directive("retranslate_post=info".parse()?),
        )
        .init();

    let post_id: i64 = std::env::args()
        .nth(1)
        .context("usage: retranslate-post <post-id>")?
        .parse()
        .context("post id must be an integer")?;

    let config = Config::from_env()?;
    let store = PgStore::connect(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;

    let Some(post) = store.find_post(post_id).await? else {
        bail!("post {} not found", post_id);
    };

    let settings = resolve_settings(&store).await?;
    settings.check_ready()?;

    info!("Re-translating post {} ({})", post_id, post.slug);
    let engine = GeminiClient::from_config(&config).context("Failed to build HTTP client")?;
    let translator = Translator::new(Arc::new(store), Arc::new(engine));
    let report = translator.translate_post(&post, &settings).await?;

    info!(
        "Post {} translated into {} locales",
        post_id, report.translated
    );
    Ok(())
}
