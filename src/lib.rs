//! Machine translation of blog posts into the locales configured in site
//! settings, backed by Gemini and PostgreSQL.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod gemini;
pub mod locale;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod settings;
pub mod translation;

pub use error::{ConfigError, StoreError, TranslationError};
pub use locale::Locale;
pub use orchestrator::{MigrationSummary, PostReport};
pub use translation::Translator;
