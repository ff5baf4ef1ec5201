//! Record store used by the translation pipeline.
//!
//! The pipeline only needs a handful of typed lookups and saves, so the
//! store is a trait with two implementations:
//!
//! - `postgres`: the production store on top of a `sqlx` PostgreSQL pool
//! - `memory`: an in-process store for previews and tests

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::StoreError;
use crate::locale::Locale;
use crate::models::{AppSecrets, Post, PostQuery, PostTranslation, SiteSettings};
use async_trait::async_trait;

/// Saves assign `id` on records that do not have one yet.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The single settings row, if any
    async fn find_settings(&self) -> Result<Option<SiteSettings>, StoreError>;

    async fn save_settings(&self, settings: &mut SiteSettings) -> Result<(), StoreError>;

    /// The single secrets row, if any
    async fn find_secrets(&self) -> Result<Option<AppSecrets>, StoreError>;

    async fn save_secrets(&self, secrets: &mut AppSecrets) -> Result<(), StoreError>;

    async fn find_post(&self, id: i64) -> Result<Option<Post>, StoreError>;

    /// Posts in any publish state
    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, StoreError>;

    async fn save_post(&self, post: &mut Post) -> Result<(), StoreError>;

    async fn find_translation(
        &self,
        source_post: i64,
        locale: &Locale,
    ) -> Result<Option<PostTranslation>, StoreError>;

    /// Insert-or-update keyed by `(source_post, locale)`
    async fn save_translation(&self, translation: &mut PostTranslation)
        -> Result<(), StoreError>;
}
