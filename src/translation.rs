use crate::db::RecordStore;
use crate::error::TranslationError;
use crate::gemini::{TranslateRequest, TranslationEngine};
use crate::locale::Locale;
use crate::models::{Post, PostTranslation};
use crate::settings::TranslationSettings;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Character budget for translated excerpts
pub const EXCERPT_LENGTH: usize = 160;

/// What an upsert did for one (post, locale) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A completed translation already existed and was left alone
    Skipped,
    /// The engine was called and the result saved
    Translated,
}

/// The text of a post that gets sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub title: String,
    pub body: String,
}

impl SourceText {
    /// Trimmed title and body; the legacy `content` field stands in for a
    /// blank body
    pub fn from_post(post: &Post) -> Self {
        let body = match post.body.trim() {
            "" => post.content.trim(),
            body => body,
        };
        Self {
            title: post.title.trim().to_string(),
            body: body.to_string(),
        }
    }

    /// Posts without a title or body are not translated
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() || self.body.is_empty()
    }
}

/// Build a plain-text excerpt from HTML.
///
/// Tags are dropped, whitespace is collapsed, and text longer than
/// `max_chars` characters is cut and suffixed with `...`.
pub fn build_excerpt(html: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }

    let mut plain = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                plain.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => plain.push(c),
            _ => {}
        }
    }

    let normalized = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= max_chars {
        return normalized;
    }

    let truncated: String = normalized.chars().take(max_chars).collect();
    format!("{}...", truncated.trim_end())
}

/// Spaces engine calls to honour a requests-per-minute limit.
///
/// Only calls that reach the engine are counted.
#[derive(Debug)]
pub(crate) struct Pacer {
    interval: Option<Duration>,
    last_call: Option<Instant>,
}

impl Pacer {
    pub(crate) fn new(requests_per_minute: Option<u32>) -> Self {
        Self {
            interval: requests_per_minute
                .filter(|rpm| *rpm > 0)
                .map(|rpm| Duration::from_secs(60) / rpm),
            last_call: None,
        }
    }

    /// Sleep until the next call is allowed, then claim the slot
    async fn acquire(&mut self) {
        if let (Some(interval), Some(last_call)) = (self.interval, self.last_call) {
            sleep_until(last_call + interval).await;
        }
        self.last_call = Some(Instant::now());
    }
}

/// Runs translations for posts against a record store and an engine.
///
/// Fan-out across locales lives in [`crate::orchestrator`].
#[derive(Clone)]
pub struct Translator {
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) engine: Arc<dyn TranslationEngine>,
}

impl Translator {
    pub fn new(store: Arc<dyn RecordStore>, engine: Arc<dyn TranslationEngine>) -> Self {
        Self { store, engine }
    }

    /// Translate `source` into `target_locale` and save the result.
    ///
    /// With `force` unset, a pair whose translation is already done is
    /// skipped without calling the engine. Nothing is written when the
    /// engine fails.
    pub async fn upsert(
        &self,
        source: &Post,
        target_locale: &Locale,
        settings: &TranslationSettings,
        text: &SourceText,
        force: bool,
    ) -> Result<UpsertOutcome, TranslationError> {
        self.upsert_paced(source, target_locale, settings, text, force, &mut Pacer::new(None))
            .await
    }

    /// [`Translator::upsert`] with engine calls spaced by `pacer`
    pub(crate) async fn upsert_paced(
        &self,
        source: &Post,
        target_locale: &Locale,
        settings: &TranslationSettings,
        text: &SourceText,
        force: bool,
        pacer: &mut Pacer,
    ) -> Result<UpsertOutcome, TranslationError> {
        let source_id = source.id.ok_or(TranslationError::UnsavedPost)?;

        let existing = self.store.find_translation(source_id, target_locale).await?;
        if !force && existing.as_ref().is_some_and(|t| t.translation_done) {
            debug!(
                "Translation already done for post={} locale={}, skipping",
                source_id, target_locale
            );
            return Ok(UpsertOutcome::Skipped);
        }

        pacer.acquire().await;
        let translated = self
            .engine
            .translate(&TranslateRequest {
                title: &text.title,
                body: &text.body,
                source_locale: settings.source_locale.as_str(),
                target_locale: target_locale.as_str(),
                model: &settings.model,
                api_key: &settings.api_key,
            })
            .await?;

        let mut record =
            existing.unwrap_or_else(|| PostTranslation::new(source_id, target_locale.clone()));
        record.slug = source.slug.clone();
        record.tags = source.tags.clone();
        record.category = source.category.clone();
        record.author = source.author.clone();
        record.published = source.published;
        record.published_at = source.published_at;
        record.excerpt = build_excerpt(&translated.body, EXCERPT_LENGTH);
        record.title = translated.title;
        record.body = translated.body;
        record.translation_done = true;

        self.store.save_translation(&mut record).await?;
        Ok(UpsertOutcome::Translated)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::gemini::{EngineError, TranslateRequest, TranslatedContent, TranslationEngine};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Engine that answers `[locale] title` / `[locale] body` and fails for
    /// chosen locales
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedEngine {
        failing_locales: HashSet<String>,
        failing_titles: HashSet<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedEngine {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn failing_for_locale(mut self, locale: &str) -> Self {
            self.failing_locales.insert(locale.to_string());
            self
        }

        pub(crate) fn failing_for_title(mut self, title: &str) -> Self {
            self.failing_titles.insert(title.to_string());
            self
        }

        /// `(title, target_locale)` of every call, in order
        pub(crate) fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TranslationEngine for ScriptedEngine {
        async fn translate(
            &self,
            request: &TranslateRequest<'_>,
        ) -> Result<TranslatedContent, EngineError> {
            self.calls
                .lock()
                .unwrap()
                .push((request.title.to_string(), request.target_locale.to_string()));

            if self.failing_locales.contains(request.target_locale)
                || self.failing_titles.contains(request.title)
            {
                return Err(EngineError::Status {
                    status: 500,
                    body: format!("cannot translate into {}", request.target_locale),
                });
            }

            Ok(TranslatedContent {
                title: format!("[{}] {}", request.target_locale, request.title),
                body: format!("<p>[{}]</p>{}", request.target_locale, request.body),
            })
        }
    }
}
