use crate::locale::Locale;
use chrono::{DateTime, Utc};

/// An authored blog post in the source locale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Post {
    /// `None` until the post has been saved
    pub id: Option<i64>,
    pub title: String,
    /// HTML body
    pub body: String,
    /// Legacy body field, read when `body` is blank
    pub content: String,
    pub slug: String,
    /// Comma-separated tag list
    pub tags: String,
    pub category: String,
    pub author: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// Machine translation of a [`Post`] into one locale.
///
/// At most one exists per `(source_post, locale)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostTranslation {
    pub id: Option<i64>,
    pub source_post: i64,
    pub locale: Locale,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub excerpt: String,
    pub tags: String,
    pub category: String,
    pub author: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    /// Set once a translation completed; cleared rows are re-translated by
    /// bulk runs
    pub translation_done: bool,
}

impl PostTranslation {
    pub fn new(source_post: i64, locale: Locale) -> Self {
        Self {
            source_post,
            locale,
            ..Default::default()
        }
    }
}

/// The site-wide settings row. Only the translation fields are modelled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteSettings {
    pub id: Option<i64>,
    pub site_language: String,
    pub enable_post_translation: bool,
    pub translation_source_locale: String,
    pub translation_locales: String,
    pub translation_model: String,
    pub translation_requests_per_minute: Option<i64>,
    /// Legacy credential location, superseded by [`AppSecrets`]
    pub gemini_api_key: String,
}

/// Admin-only secrets row.
#[derive(Clone, Default, PartialEq)]
pub struct AppSecrets {
    pub id: Option<i64>,
    pub gemini_api_key: String,
}

impl std::fmt::Debug for AppSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSecrets")
            .field("id", &self.id)
            .field("gemini_api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostSort {
    /// Newest first; posts without a publish date come last
    #[default]
    PublishedAtDesc,
    IdAsc,
}

/// Listing parameters for [`crate::db::RecordStore::list_posts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostQuery {
    pub sort: PostSort,
    /// `None` returns every remaining post
    pub limit: Option<i64>,
    pub offset: i64,
}
