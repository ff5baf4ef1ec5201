use super::RecordStore;
use crate::error::StoreError;
use crate::locale::Locale;
use crate::models::{AppSecrets, Post, PostQuery, PostSort, PostTranslation, SiteSettings};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;

/// Tables read or written by the pipeline. Safe to run on every start.
const SCHEMA: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS posts (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL DEFAULT '',
        body TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        slug TEXT NOT NULL UNIQUE,
        tags TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL DEFAULT '',
        author TEXT,
        published BOOLEAN NOT NULL DEFAULT FALSE,
        published_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS post_translations (
        id BIGSERIAL PRIMARY KEY,
        source_post BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        locale VARCHAR(20) NOT NULL,
        title TEXT NOT NULL,
        slug TEXT NOT NULL,
        body TEXT NOT NULL,
        excerpt TEXT NOT NULL DEFAULT '',
        tags TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL DEFAULT '',
        author TEXT,
        published BOOLEAN NOT NULL DEFAULT FALSE,
        published_at TIMESTAMPTZ,
        translation_done BOOLEAN NOT NULL DEFAULT FALSE,
        CONSTRAINT idx_post_translations_source_locale UNIQUE (source_post, locale)
    )",
    "CREATE INDEX IF NOT EXISTS idx_post_translations_slug_locale
        ON post_translations (slug, locale)",
    "CREATE TABLE IF NOT EXISTS settings (
        id BIGSERIAL PRIMARY KEY,
        site_language TEXT NOT NULL DEFAULT '',
        enable_post_translation BOOLEAN NOT NULL DEFAULT FALSE,
        translation_source_locale TEXT NOT NULL DEFAULT '',
        translation_locales TEXT NOT NULL DEFAULT '',
        translation_model TEXT NOT NULL DEFAULT '',
        translation_requests_per_minute BIGINT,
        gemini_api_key TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS app_secrets (
        id BIGSERIAL PRIMARY KEY,
        gemini_api_key TEXT NOT NULL DEFAULT ''
    )",
];

const POST_COLUMNS: &str =
    "id, title, body, content, slug, tags, category, author, published, published_at";

const TRANSLATION_COLUMNS: &str = "id, source_post, locale, title, slug, body, excerpt, tags, \
     category, author, published, published_at, translation_done";

/// [`RecordStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create the pipeline's tables and indexes if missing
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema is up to date");
        Ok(())
    }
}

fn post_from_row(row: &PgRow) -> Result<Post, sqlx::Error> {
    Ok(Post {
        id: Some(row.try_get("id")?),
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        content: row.try_get("content")?,
        slug: row.try_get("slug")?,
        tags: row.try_get("tags")?,
        category: row.try_get("category")?,
        author: row.try_get("author")?,
        published: row.try_get("published")?,
        published_at: row.try_get("published_at")?,
    })
}

fn translation_from_row(row: &PgRow) -> Result<PostTranslation, sqlx::Error> {
    let locale: String = row.try_get("locale")?;
    Ok(PostTranslation {
        id: Some(row.try_get("id")?),
        source_post: row.try_get("source_post")?,
        locale: Locale::normalize(&locale),
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        body: row.try_get("body")?,
        excerpt: row.try_get("excerpt")?,
        tags: row.try_get("tags")?,
        category: row.try_get("category")?,
        author: row.try_get("author")?,
        published: row.try_get("published")?,
        published_at: row.try_get("published_at")?,
        translation_done: row.try_get("translation_done")?,
    })
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find_settings(&self) -> Result<Option<SiteSettings>, StoreError> {
        let row = sqlx::query(
            "SELECT id, site_language, enable_post_translation, translation_source_locale,
                    translation_locales, translation_model, translation_requests_per_minute,
                    gemini_api_key
             FROM settings ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(SiteSettings {
            id: Some(row.try_get("id")?),
            site_language: row.try_get("site_language")?,
            enable_post_translation: row.try_get("enable_post_translation")?,
            translation_source_locale: row.try_get("translation_source_locale")?,
            translation_locales: row.try_get("translation_locales")?,
            translation_model: row.try_get("translation_model")?,
            translation_requests_per_minute: row.try_get("translation_requests_per_minute")?,
            gemini_api_key: row.try_get("gemini_api_key")?,
        }))
    }

    async fn save_settings(&self, settings: &mut SiteSettings) -> Result<(), StoreError> {
        let query = match settings.id {
            Some(id) => sqlx::query(
                "UPDATE settings SET site_language = $1, enable_post_translation = $2,
                    translation_source_locale = $3, translation_locales = $4,
                    translation_model = $5, translation_requests_per_minute = $6,
                    gemini_api_key = $7
                 WHERE id = $8 RETURNING id",
            )
            .bind(&settings.site_language)
            .bind(settings.enable_post_translation)
            .bind(&settings.translation_source_locale)
            .bind(&settings.translation_locales)
            .bind(&settings.translation_model)
            .bind(settings.translation_requests_per_minute)
            .bind(&settings.gemini_api_key)
            .bind(id),
            None => sqlx::query(
                "INSERT INTO settings (site_language, enable_post_translation,
                    translation_source_locale, translation_locales, translation_model,
                    translation_requests_per_minute, gemini_api_key)
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
            )
            .bind(&settings.site_language)
            .bind(settings.enable_post_translation)
            .bind(&settings.translation_source_locale)
            .bind(&settings.translation_locales)
            .bind(&settings.translation_model)
            .bind(settings.translation_requests_per_minute)
            .bind(&settings.gemini_api_key),
        };

        let row = query.fetch_one(&self.pool).await?;
        settings.id = Some(row.try_get("id")?);
        Ok(())
    }

    async fn find_secrets(&self) -> Result<Option<AppSecrets>, StoreError> {
        let row = sqlx::query("SELECT id, gemini_api_key FROM app_secrets ORDER BY id LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(AppSecrets {
            id: Some(row.try_get("id")?),
            gemini_api_key: row.try_get("gemini_api_key")?,
        }))
    }

    async fn save_secrets(&self, secrets: &mut AppSecrets) -> Result<(), StoreError> {
        let row = match secrets.id {
            Some(id) => {
                sqlx::query("UPDATE app_secrets SET gemini_api_key = $1 WHERE id = $2 RETURNING id")
                    .bind(&secrets.gemini_api_key)
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => sqlx::query("INSERT INTO app_secrets (gemini_api_key) VALUES ($1) RETURNING id")
                .bind(&secrets.gemini_api_key)
                .fetch_one(&self.pool)
                .await?,
        };
        secrets.id = Some(row.try_get("id")?);
        Ok(())
    }

    async fn find_post(&self, id: i64) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(post_from_row).transpose()?)
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, StoreError> {
        let order = match query.sort {
            PostSort::PublishedAtDesc => "published_at DESC NULLS LAST, id ASC",
            PostSort::IdAsc => "id ASC",
        };
        let sql = format!(
            "SELECT {} FROM posts ORDER BY {} LIMIT $1 OFFSET $2",
            POST_COLUMNS, order
        );

        let rows = sqlx::query(&sql)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(post_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn save_post(&self, post: &mut Post) -> Result<(), StoreError> {
        let query = match post.id {
            Some(id) => sqlx::query(
                "UPDATE posts SET title = $1, body = $2, content = $3, slug = $4, tags = $5,
                    category = $6, author = $7, published = $8, published_at = $9
                 WHERE id = $10 RETURNING id",
            )
            .bind(&post.title)
            .bind(&post.body)
            .bind(&post.content)
            .bind(&post.slug)
            .bind(&post.tags)
            .bind(&post.category)
            .bind(&post.author)
            .bind(post.published)
            .bind(post.published_at)
            .bind(id),
            None => sqlx::query(
                "INSERT INTO posts (title, body, content, slug, tags, category, author,
                    published, published_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
            )
            .bind(&post.title)
            .bind(&post.body)
            .bind(&post.content)
            .bind(&post.slug)
            .bind(&post.tags)
            .bind(&post.category)
            .bind(&post.author)
            .bind(post.published)
            .bind(post.published_at),
        };

        let row = query.fetch_one(&self.pool).await?;
        post.id = Some(row.try_get("id")?);
        Ok(())
    }

    async fn find_translation(
        &self,
        source_post: i64,
        locale: &Locale,
    ) -> Result<Option<PostTranslation>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM post_translations WHERE source_post = $1 AND locale = $2",
            TRANSLATION_COLUMNS
        ))
        .bind(source_post)
        .bind(locale.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(translation_from_row).transpose()?)
    }

    async fn save_translation(
        &self,
        translation: &mut PostTranslation,
    ) -> Result<(), StoreError> {
        // Concurrent inserts for the same pair collapse into an update, last
        // write wins
        let query = match translation.id {
            Some(id) => sqlx::query(
                "UPDATE post_translations SET source_post = $1, locale = $2, title = $3,
                    slug = $4, body = $5, excerpt = $6, tags = $7, category = $8, author = $9,
                    published = $10, published_at = $11, translation_done = $12
                 WHERE id = $13 RETURNING id",
            )
            .bind(translation.source_post)
            .bind(translation.locale.as_str())
            .bind(&translation.title)
            .bind(&translation.slug)
            .bind(&translation.body)
            .bind(&translation.excerpt)
            .bind(&translation.tags)
            .bind(&translation.category)
            .bind(&translation.author)
            .bind(translation.published)
            .bind(translation.published_at)
            .bind(translation.translation_done)
            .bind(id),
            None => sqlx::query(
                "INSERT INTO post_translations (source_post, locale, title, slug, body, excerpt,
                    tags, category, author, published, published_at, translation_done)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                 ON CONFLICT (source_post, locale) DO UPDATE SET
                    title = EXCLUDED.title, slug = EXCLUDED.slug, body = EXCLUDED.body,
                    excerpt = EXCLUDED.excerpt, tags = EXCLUDED.tags,
                    category = EXCLUDED.category, author = EXCLUDED.author,
                    published = EXCLUDED.published, published_at = EXCLUDED.published_at,
                    translation_done = EXCLUDED.translation_done
                 RETURNING id",
            )
            .bind(translation.source_post)
            .bind(translation.locale.as_str())
            .bind(&translation.title)
            .bind(&translation.slug)
            .bind(&translation.body)
            .bind(&translation.excerpt)
            .bind(&translation.tags)
            .bind(&translation.category)
            .bind(&translation.author)
            .bind(translation.published)
            .bind(translation.published_at)
            .bind(translation.translation_done),
        };

        let row = query.fetch_one(&self.pool).await?;
        translation.id = Some(row.try_get("id")?);
        Ok(())
    }
}
