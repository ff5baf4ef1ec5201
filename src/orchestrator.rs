//! Fan-out of a post across its target locales.
//!
//! Two entry points share the per-locale loop:
//!
//! - [`Translator::translate_post`]: after a post is created or edited.
//!   Forced, so every locale is refreshed.
//! - [`Translator::translate_all_posts`]: bulk migration over every post.
//!   Not forced, so completed pairs are skipped and reruns are cheap.
//!
//! Locales are processed strictly one after another. A failing locale is
//! logged and never stops its siblings.

use crate::error::TranslationError;
use crate::models::{Post, PostQuery};
use crate::settings::TranslationSettings;
use crate::translation::{Pacer, SourceText, Translator, UpsertOutcome};
use std::fmt;
use tracing::{debug, info, warn};

/// Per-post result of a fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostReport {
    pub translated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Totals of a bulk migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationSummary {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for MigrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "success={} failed={} total={}",
            self.success, self.failed, self.total
        )
    }
}

impl Translator {
    /// Re-translate one post into every target locale.
    ///
    /// All locales are attempted. The first error is returned after the
    /// loop; the caller is expected to log it and carry on.
    pub async fn translate_post(
        &self,
        source: &Post,
        settings: &TranslationSettings,
    ) -> Result<PostReport, TranslationError> {
        let mut pacer = Pacer::new(settings.requests_per_minute);
        let (report, first_error) = self.fan_out(source, settings, true, &mut pacer).await;
        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Translate every post into every target locale, skipping pairs that
    /// are already done.
    ///
    /// Fails up front when the settings are not ready. Otherwise runs to the
    /// end and returns [`TranslationError::Incomplete`] if any post failed.
    pub async fn translate_all_posts(
        &self,
        settings: &TranslationSettings,
    ) -> Result<MigrationSummary, TranslationError> {
        settings.check_ready()?;

        let posts = self.store.list_posts(&PostQuery::default()).await?;
        let mut summary = MigrationSummary {
            total: posts.len(),
            ..Default::default()
        };
        let mut pacer = Pacer::new(settings.requests_per_minute);

        for source in &posts {
            let (_, first_error) = self.fan_out(source, settings, false, &mut pacer).await;
            match first_error {
                Some(err) => {
                    summary.failed += 1;
                    warn!(
                        "translate-posts: failed source={} slug={} err={}",
                        source.id.unwrap_or_default(),
                        source.slug,
                        err
                    );
                }
                None => summary.success += 1,
            }
        }

        info!("translate-posts finished: {}", summary);
        if summary.failed > 0 {
            return Err(TranslationError::Incomplete(summary));
        }
        Ok(summary)
    }

    async fn fan_out(
        &self,
        source: &Post,
        settings: &TranslationSettings,
        force: bool,
        pacer: &mut Pacer,
    ) -> (PostReport, Option<TranslationError>) {
        let mut report = PostReport::default();
        let text = SourceText::from_post(source);
        if text.is_empty() {
            debug!(
                "Post {} has no title or body, nothing to translate",
                source.id.unwrap_or_default()
            );
            return (report, None);
        }

        let mut first_error = None;
        for locale in &settings.target_locales {
            let result = self
                .upsert_paced(source, locale, settings, &text, force, pacer)
                .await;

            match result {
                Ok(UpsertOutcome::Translated) => report.translated += 1,
                Ok(UpsertOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        "translation locale failed source={} locale={} err={}",
                        source.id.unwrap_or_default(),
                        locale,
                        err
                    );
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        (report, first_error)
    }
}
