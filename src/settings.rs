//! Translation settings resolution.
//!
//! Settings are read from the `settings` and `app_secrets` records on every
//! call and handed to the orchestrators explicitly. Nothing is cached.

use crate::db::RecordStore;
use crate::error::{ConfigError, StoreError};
use crate::locale::{parse_locale_list, Locale};
use crate::models::{AppSecrets, SiteSettings};
use std::fmt;
use tracing::info;

pub const DEFAULT_TRANSLATION_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_SOURCE_LOCALE: &str = "ja";
pub const DEFAULT_TARGET_LOCALE: &str = "en";

/// Resolved, read-only translation settings.
#[derive(Clone, PartialEq)]
pub struct TranslationSettings {
    pub enabled: bool,
    pub source_locale: Locale,
    /// Never contains `source_locale`
    pub target_locales: Vec<Locale>,
    pub model: String,
    /// Empty when no credential is configured
    pub api_key: String,
    /// Upper bound on engine calls per minute, if configured
    pub requests_per_minute: Option<u32>,
}

impl TranslationSettings {
    /// Check the preconditions for calling the engine at all
    pub fn check_ready(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Err(ConfigError::Disabled);
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.target_locales.is_empty() {
            return Err(ConfigError::NoTargetLocales);
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.check_ready().is_ok()
    }
}

impl fmt::Debug for TranslationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationSettings")
            .field("enabled", &self.enabled)
            .field("source_locale", &self.source_locale)
            .field("target_locales", &self.target_locales)
            .field("model", &self.model)
            .field(
                "api_key",
                &if self.api_key.is_empty() {
                    "<empty>"
                } else {
                    "<redacted>"
                },
            )
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

/// Resolve the current translation settings from the record store
pub async fn resolve_settings(store: &dyn RecordStore) -> Result<TranslationSettings, StoreError> {
    let settings = store.find_settings().await?;
    let secrets = store.find_secrets().await?;
    Ok(settings_from_records(settings.as_ref(), secrets.as_ref()))
}

fn settings_from_records(
    settings: Option<&SiteSettings>,
    secrets: Option<&AppSecrets>,
) -> TranslationSettings {
    let api_key = resolve_api_key(settings, secrets);

    let Some(record) = settings else {
        return TranslationSettings {
            enabled: false,
            source_locale: Locale::normalize(DEFAULT_SOURCE_LOCALE),
            target_locales: vec![Locale::normalize(DEFAULT_TARGET_LOCALE)],
            model: DEFAULT_TRANSLATION_MODEL.to_string(),
            api_key,
            requests_per_minute: None,
        };
    };

    let source_locale = [
        record.translation_source_locale.as_str(),
        record.site_language.as_str(),
        DEFAULT_SOURCE_LOCALE,
    ]
    .into_iter()
    .map(Locale::normalize)
    .find(|locale| !locale.is_empty())
    .unwrap_or_default();

    // The fallback applies before filtering: a list naming only the source
    // locale resolves to no targets
    let mut target_locales = parse_locale_list(&record.translation_locales);
    if target_locales.is_empty() {
        target_locales.push(Locale::normalize(DEFAULT_TARGET_LOCALE));
    }
    target_locales.retain(|locale| *locale != source_locale);

    let model = match record.translation_model.trim() {
        "" => DEFAULT_TRANSLATION_MODEL.to_string(),
        model => model.to_string(),
    };

    TranslationSettings {
        enabled: record.enable_post_translation,
        source_locale,
        target_locales,
        model,
        api_key,
        requests_per_minute: record
            .translation_requests_per_minute
            .filter(|rpm| *rpm > 0)
            .and_then(|rpm| u32::try_from(rpm).ok()),
    }
}

/// Prefer the secrets record; fall back to the legacy settings field
fn resolve_api_key(settings: Option<&SiteSettings>, secrets: Option<&AppSecrets>) -> String {
    secrets
        .map(|s| s.gemini_api_key.trim())
        .filter(|key| !key.is_empty())
        .or_else(|| settings.map(|s| s.gemini_api_key.trim()))
        .unwrap_or_default()
        .to_string()
}

/// Move a legacy API key from the settings record into the secrets record.
///
/// An existing secret is never overwritten. The legacy field is cleared
/// either way. Returns `true` when anything was written.
pub async fn migrate_api_key_to_secrets(store: &dyn RecordStore) -> Result<bool, StoreError> {
    let Some(mut settings) = store.find_settings().await? else {
        return Ok(false);
    };

    let legacy_key = settings.gemini_api_key.trim().to_string();
    if legacy_key.is_empty() {
        return Ok(false);
    }

    let mut secrets = store.find_secrets().await?.unwrap_or_default();
    if secrets.gemini_api_key.trim().is_empty() {
        secrets.gemini_api_key = legacy_key;
        store.save_secrets(&mut secrets).await?;
        info!("Moved gemini_api_key from settings to app_secrets");
    }

    settings.gemini_api_key.clear();
    store.save_settings(&mut settings).await?;
    Ok(true)
}
