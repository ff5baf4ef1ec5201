//! Error types shared across the translation pipeline.

use crate::gemini::EngineError;
use crate::orchestrator::MigrationSummary;
use thiserror::Error;

/// The pipeline cannot run with the resolved settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("post translation is disabled in settings")]
    Disabled,
    #[error("gemini_api_key is empty in settings")]
    MissingApiKey,
    #[error("translation_locales is empty in settings")]
    NoTargetLocales,
}

/// Failure reported by a [`crate::db::RecordStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("translation engine failed: {0}")]
    Engine(#[from] EngineError),
    #[error("failed to persist translation: {0}")]
    Store(#[from] StoreError),
    #[error("source post has not been saved yet")]
    UnsavedPost,
    #[error("translation failed for {} posts", .0.failed)]
    Incomplete(MigrationSummary),
}
