//! Message/cache reconciliation engine.
//!
//! Maps a keyed multi-part response onto the platform's one-message-per-post
//! model. For each source message the engine remembers which keyed replies
//! already exist, so a re-run (message edit, watch re-check) edits in place,
//! deletes replies whose keys disappeared, and creates replies for new keys.
//! Plain text and error payloads bypass the cache entirely.

pub mod cache;

use crate::error::Result;
use cache::MessageCache;
use chrono::Duration;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// How long an untouched cache entry stays editable.
const STALE_AFTER_HOURS: i64 = 2;

/// Opaque handle to a platform message, enough to edit or delete it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHandle {
    pub channel_id: u64,
    pub message_id: u64,
}

/// Send/edit/delete capability for one channel.
#[async_trait::async_trait]
pub trait SendTarget: Send + Sync {
    async fn send(&self, text: &str) -> Result<MessageHandle>;
    async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<MessageHandle>;
    async fn delete(&self, handle: &MessageHandle) -> Result<()>;
}

/// What one inbound event resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Plain text with no key identity. Always sent fresh, never cached.
    Plain(String),
    /// Keyed response map in output order, or a whole-batch error.
    Keyed(std::result::Result<Vec<(String, String)>, String>),
}

/// The reconciliation engine. Owns the message cache and the per-source
/// revision counters that guard against out-of-order edit reconciliation.
pub struct Reconciler {
    cache: Mutex<MessageCache>,
    revisions: Mutex<HashMap<String, u64>>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(MessageCache::new(Duration::hours(STALE_AFTER_HOURS))),
            revisions: Mutex::new(HashMap::new()),
        }
    }

    /// Claim the next revision for a source message. A later `apply` with a
    /// superseded revision is dropped, so a slow lookup for an old edit can
    /// never overwrite the response to a newer edit of the same message.
    pub async fn begin(&self, source_id: &str) -> u64 {
        let mut revisions = self.revisions.lock().await;
        let revision = revisions.entry(source_id.to_string()).or_insert(0);
        *revision += 1;
        *revision
    }

    async fn is_current(&self, source_id: &str, revision: u64) -> bool {
        let revisions = self.revisions.lock().await;
        revisions.get(source_id).copied() == Some(revision)
    }

    /// Diff the payload against the cache for this source message and apply
    /// the difference through the target. Platform failures are logged and
    /// degrade to per-key no-ops; they never abort sibling keys.
    pub async fn apply(
        &self,
        source_id: &str,
        revision: u64,
        target: &dyn SendTarget,
        payload: Payload,
    ) {
        if !self.is_current(source_id, revision).await {
            tracing::debug!(
                source_id,
                revision,
                "dropping reconciliation for superseded edit"
            );
            return;
        }

        match payload {
            Payload::Plain(text) => self.send_uncached(target, &text).await,
            Payload::Keyed(Err(error)) => {
                // A batch-level error must not destroy per-key messages from
                // an earlier run of the same command.
                self.send_uncached(target, &error).await;
            }
            Payload::Keyed(Ok(messages)) => {
                self.apply_keyed(source_id, target, messages).await;
            }
        }
    }

    async fn send_uncached(&self, target: &dyn SendTarget, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if let Err(error) = target.send(text).await {
            tracing::error!(%error, "failed to send uncached message");
        }
    }

    async fn apply_keyed(
        &self,
        source_id: &str,
        target: &dyn SendTarget,
        messages: Vec<(String, String)>,
    ) {
        let mut cache = self.cache.lock().await;

        // Delete replies whose keys are gone from this response.
        let new_keys: Vec<&str> = messages.iter().map(|(key, _)| key.as_str()).collect();
        for old_key in cache.keys(source_id) {
            if new_keys.contains(&old_key.as_str()) {
                continue;
            }
            let Some(entry) = cache.get(source_id, &old_key) else {
                continue;
            };
            let handle = entry.handle;
            match target.delete(&handle).await {
                Ok(()) => {
                    tracing::info!(source_id, key = %old_key, "deleted stale message");
                    cache.remove(source_id, &old_key);
                }
                Err(error) => {
                    // Best effort. The entry stays and ages out of the cache.
                    tracing::warn!(source_id, key = %old_key, %error, "failed to delete stale message");
                }
            }
        }

        // Edit keys that still exist, send keys that are new.
        for (key, text) in &messages {
            if text.trim().is_empty() {
                continue;
            }

            match cache.get(source_id, key).map(|entry| entry.handle) {
                Some(handle) => match target.edit(&handle, text).await {
                    Ok(new_handle) => {
                        cache.insert(source_id, key, new_handle);
                    }
                    Err(error) => {
                        tracing::warn!(source_id, key = %key, %error, "failed to edit message");
                    }
                },
                None => match target.send(text).await {
                    Ok(handle) => {
                        cache.insert(source_id, key, handle);
                    }
                    Err(error) => {
                        tracing::warn!(source_id, key = %key, %error, "failed to send message");
                    }
                },
            }
        }
    }

    /// Cached entry count for one source message.
    pub async fn cached_len(&self, source_id: &str) -> usize {
        self.cache.lock().await.len(source_id)
    }
}
