use super::RecordStore;
use crate::error::StoreError;
use crate::locale::Locale;
use crate::models::{AppSecrets, Post, PostQuery, PostSort, PostTranslation, SiteSettings};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    settings: Option<SiteSettings>,
    secrets: Option<AppSecrets>,
    posts: BTreeMap<i64, Post>,
    translations: BTreeMap<(i64, Locale), PostTranslation>,
    fail_post_saves: bool,
    fail_translation_saves: bool,
    translation_saves: usize,
}

impl Inner {
    fn assign_id(&mut self, id: &mut Option<i64>) -> i64 {
        match id {
            Some(existing) => *existing,
            None => {
                self.next_id += 1;
                *id = Some(self.next_id);
                self.next_id
            }
        }
    }
}

/// In-process [`RecordStore`].
///
/// Translations are keyed by `(source_post, locale)`, so the uniqueness of
/// a pair holds the same way the PostgreSQL unique index enforces it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent `save_post` fail
    pub fn fail_post_saves(&self, fail: bool) {
        self.lock().fail_post_saves = fail;
    }

    /// Make every subsequent `save_translation` fail
    pub fn fail_translation_saves(&self, fail: bool) {
        self.lock().fail_translation_saves = fail;
    }

    /// Number of successful `save_translation` calls so far
    pub fn translation_saves(&self) -> usize {
        self.lock().translation_saves
    }

    pub fn translations(&self) -> Vec<PostTranslation> {
        self.lock().translations.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_settings(&self) -> Result<Option<SiteSettings>, StoreError> {
        Ok(self.lock().settings.clone())
    }

    async fn save_settings(&self, settings: &mut SiteSettings) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.assign_id(&mut settings.id);
        inner.settings = Some(settings.clone());
        Ok(())
    }

    async fn find_secrets(&self) -> Result<Option<AppSecrets>, StoreError> {
        Ok(self.lock().secrets.clone())
    }

    async fn save_secrets(&self, secrets: &mut AppSecrets) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.assign_id(&mut secrets.id);
        inner.secrets = Some(secrets.clone());
        Ok(())
    }

    async fn find_post(&self, id: i64) -> Result<Option<Post>, StoreError> {
        Ok(self.lock().posts.get(&id).cloned())
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, StoreError> {
        let mut posts: Vec<Post> = self.lock().posts.values().cloned().collect();

        match query.sort {
            PostSort::IdAsc => posts.sort_by_key(|post| post.id),
            // None sorts first ascending, so reversing puts it last
            PostSort::PublishedAtDesc => {
                posts.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(a.id.cmp(&b.id)))
            }
        }

        let offset = usize::try_from(query.offset).unwrap_or(0);
        let limit = query
            .limit
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(usize::MAX);

        Ok(posts.into_iter().skip(offset).take(limit).collect())
    }

    async fn save_post(&self, post: &mut Post) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_post_saves {
            return Err(StoreError::Unavailable("post saves are disabled".to_string()));
        }
        let id = inner.assign_id(&mut post.id);
        inner.posts.insert(id, post.clone());
        Ok(())
    }

    async fn find_translation(
        &self,
        source_post: i64,
        locale: &Locale,
    ) -> Result<Option<PostTranslation>, StoreError> {
        Ok(self
            .lock()
            .translations
            .get(&(source_post, locale.clone()))
            .cloned())
    }

    async fn save_translation(
        &self,
        translation: &mut PostTranslation,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_translation_saves {
            return Err(StoreError::Unavailable(
                "translation saves are disabled".to_string(),
            ));
        }
        if !inner.posts.contains_key(&translation.source_post) {
            return Err(StoreError::Constraint(format!(
                "source_post {} does not exist",
                translation.source_post
            )));
        }

        let key = (translation.source_post, translation.locale.clone());
        match inner.translations.get(&key).and_then(|existing| existing.id) {
            // Last write wins on the pair, like ON CONFLICT DO UPDATE
            Some(existing) => translation.id = Some(existing),
            None => {
                inner.assign_id(&mut translation.id);
            }
        }
        inner.translations.insert(key, translation.clone());
        inner.translation_saves += 1;
        Ok(())
    }
}
