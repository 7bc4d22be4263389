//! Debounced Field Persister: absorbs keystroke-rate edits to a free-text
//! field and writes the final draft once the operator goes idle.
//!
//! The field holds a draft and the last value known to be persisted (the
//! seed). Each edit restarts an idle timer; on expiry the draft is committed
//! through the injected closure only if it differs from the seed. Remote
//! snapshots arriving mid-edit are ignored so they cannot clobber what the
//! operator is typing.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::store::{paths, OrderStore};

/// Idle time before an edit is committed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1500);

type CommitFuture = Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send>>;
type Commit = Arc<dyn Fn(String) -> CommitFuture + Send + Sync>;

struct FieldState {
    draft: String,
    /// Last value known to be in the store.
    seed: String,
    /// Bumped on every edit; a timer only fires for the generation it was
    /// started with.
    generation: u64,
    pending: bool,
}

pub struct DebouncedField {
    state: Arc<Mutex<FieldState>>,
    commit: Commit,
    delay: Duration,
    cancel: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

impl DebouncedField {
    /// New field seeded with the last remote value, committing through
    /// `commit` after [`DEFAULT_DEBOUNCE`] of idle time.
    pub fn new<F, Fut>(seed: impl Into<String>, commit: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        Self::with_delay(seed, DEFAULT_DEBOUNCE, commit)
    }

    pub fn with_delay<F, Fut>(seed: impl Into<String>, delay: Duration, commit: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        let seed = seed.into();
        Self {
            state: Arc::new(Mutex::new(FieldState {
                draft: seed.clone(),
                seed,
                generation: 0,
                pending: false,
            })),
            commit: Arc::new(move |draft| Box::pin(commit(draft)) as CommitFuture),
            delay,
            cancel: CancellationToken::new(),
            timer: None,
        }
    }

    /// Field persisting an order's `observation` through the store.
    pub fn for_observation<S: OrderStore>(
        store: Arc<S>,
        order_id: impl Into<String>,
        seed: impl Into<String>,
    ) -> Self {
        let order_id = order_id.into();
        Self::new(seed, move |draft: String| {
            let store = store.clone();
            let path = paths::order(&order_id);
            async move {
                let mut fields = serde_json::Map::new();
                fields.insert("observation".into(), serde_json::json!(draft));
                store.write_partial(&path, fields).await?;
                Ok(())
            }
        })
    }

    /// Current draft as the operator sees it.
    pub fn value(&self) -> String {
        self.state.lock().map(|s| s.draft.clone()).unwrap_or_default()
    }

    /// Whether an edit is waiting for its idle timer.
    pub fn is_pending(&self) -> bool {
        self.state.lock().map(|s| s.pending).unwrap_or(false)
    }

    /// Record a keystroke-level edit and restart the idle timer.
    pub fn edit(&mut self, text: impl Into<String>) {
        let generation = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            state.draft = text.into();
            state.pending = true;
            state.generation += 1;
            state.generation
        };

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let state = self.state.clone();
        let commit = self.commit.clone();
        let cancel = self.cancel.clone();
        let delay = self.delay;
        self.timer = Some(tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let draft = {
                let Ok(mut guard) = state.lock() else { return };
                if guard.generation != generation {
                    return; // superseded by a newer edit
                }
                if guard.draft == guard.seed {
                    guard.pending = false;
                    debug!("draft matches persisted value, skipping commit");
                    return;
                }
                guard.draft.clone()
            };

            let result = commit(draft.clone()).await;
            if let Ok(mut guard) = state.lock() {
                if guard.generation != generation {
                    return;
                }
                guard.pending = false;
                match result {
                    Ok(()) => guard.seed = draft,
                    // seed stays stale so the next idle period retries
                    Err(err) => warn!(error = %err, "debounced commit failed"),
                }
            }
        }));
    }

    /// Fold in a value observed from the store. Ignored while an edit is
    /// pending; the local draft wins until it commits.
    pub fn sync_remote(&self, value: impl Into<String>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.pending {
            debug!("remote change ignored while an edit is pending");
            return;
        }
        let value = value.into();
        state.seed = value.clone();
        state.draft = value;
    }

    /// Drop any pending edit without committing it.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Ok(mut state) = self.state.lock() {
            state.pending = false;
        }
    }
}

impl Drop for DebouncedField {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn recording_field(delay_ms: u64) -> (DebouncedField, Arc<Mutex<Vec<String>>>) {
        let commits: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = commits.clone();
        let field = DebouncedField::with_delay("", Duration::from_millis(delay_ms), move |draft| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(draft);
                Ok(())
            }
        });
        (field, commits)
    }

    async fn idle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_commit_once_with_the_final_draft() {
        let (mut field, commits) = recording_field(1500);
        field.edit("s");
        idle(500).await;
        field.edit("se");
        idle(500).await;
        field.edit("sem cebola");
        assert!(field.is_pending());

        idle(1600).await;
        assert_eq!(*commits.lock().unwrap(), vec!["sem cebola".to_string()]);
        assert!(!field.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_draft_never_commits() {
        let (mut field, commits) = recording_field(1500);
        field.sync_remote("sem cebola");
        field.edit("sem cebola!");
        field.edit("sem cebola"); // typed back to the persisted value
        idle(1600).await;
        assert!(commits.lock().unwrap().is_empty());
        assert!(!field.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn remote_change_does_not_clobber_a_pending_edit() {
        let (mut field, commits) = recording_field(1500);
        field.edit("local draft");
        field.sync_remote("remote overwrite");
        assert_eq!(field.value(), "local draft");

        idle(1600).await;
        assert_eq!(*commits.lock().unwrap(), vec!["local draft".to_string()]);

        // idle again: remote snapshots apply
        field.sync_remote("remote text");
        assert_eq!(field.value(), "remote text");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_without_committing() {
        let (mut field, commits) = recording_field(1500);
        field.edit("never persisted");
        field.shutdown();
        idle(2000).await;
        assert!(commits.lock().unwrap().is_empty());
        assert!(!field.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn observation_field_writes_only_the_observation() {
        let store = Arc::new(MemoryStore::new());
        store
            .write_whole("orders/o1", json!({ "status": "open", "observation": "" }))
            .await
            .unwrap();

        let mut field = DebouncedField::for_observation(store.clone(), "o1", "");
        field.edit("entregar na portaria");
        idle(1600).await;

        let doc = store.read_once("orders/o1").await.unwrap().unwrap();
        assert_eq!(doc["observation"], "entregar na portaria");
        assert_eq!(doc["status"], "open"); // siblings untouched
    }
}
