//! Post lifecycle events.
//!
//! Writes go through [`save_post`], which commits the post and then hands a
//! [`PostEvent`] to every registered [`PostObserver`], in order, before
//! returning. Observers run inside the caller's flow but cannot fail it.

use crate::db::RecordStore;
use crate::error::StoreError;
use crate::models::Post;
use crate::settings::resolve_settings;
use crate::translation::Translator;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq)]
pub enum PostEvent {
    Created(Post),
    Updated(Post),
}

impl PostEvent {
    pub fn post(&self) -> &Post {
        match self {
            PostEvent::Created(post) | PostEvent::Updated(post) => post,
        }
    }
}

/// Reacts to committed post writes.
///
/// Implementations log their own failures; there is no way to veto or roll
/// back the write.
#[async_trait]
pub trait PostObserver: Send + Sync {
    async fn on_post_saved(&self, event: &PostEvent);
}

#[derive(Default, Clone)]
pub struct EventBus {
    observers: Vec<Arc<dyn PostObserver>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn PostObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Run every observer to completion, in registration order
    pub async fn dispatch(&self, event: &PostEvent) {
        for observer in &self.observers {
            observer.on_post_saved(event).await;
        }
    }
}

/// Save a post and notify observers once the write is durable.
///
/// A post without an id is created, anything else is updated. Nothing is
/// dispatched when the save fails.
pub async fn save_post(
    store: &dyn RecordStore,
    bus: &EventBus,
    post: &mut Post,
) -> Result<(), StoreError> {
    let is_new = post.id.is_none();
    store.save_post(post).await?;

    let event = if is_new {
        PostEvent::Created(post.clone())
    } else {
        PostEvent::Updated(post.clone())
    };
    bus.dispatch(&event).await;
    Ok(())
}

/// Refreshes a post's translations whenever it is created or updated.
///
/// Settings are resolved on every event. Work runs synchronously inside
/// the dispatching flow, including engine retries.
#[derive(Clone)]
pub struct TranslationObserver {
    translator: Translator,
}

impl TranslationObserver {
    pub fn new(translator: Translator) -> Self {
        Self { translator }
    }
}

#[async_trait]
impl PostObserver for TranslationObserver {
    async fn on_post_saved(&self, event: &PostEvent) {
        let post = event.post();
        let post_id = post.id.unwrap_or_default();

        let settings = match resolve_settings(self.translator.store.as_ref()).await {
            Ok(settings) => settings,
            Err(e) => {
                error!("translation settings load failed: {}", e);
                return;
            }
        };
        if let Err(reason) = settings.check_ready() {
            debug!("Skipping translation of post {}: {}", post_id, reason);
            return;
        }

        match self.translator.translate_post(post, &settings).await {
            Ok(report) => info!(
                "Translated post {} into {} locales ({} skipped)",
                post_id, report.translated, report.skipped
            ),
            Err(e) => error!("translation failed for source post={}: {}", post_id, e),
        }
    }
}
