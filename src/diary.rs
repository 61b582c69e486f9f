use std::time::Duration;

use futures_util::future::select_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, DiaryBackend};
use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::forms::DiaryDraft;
use crate::models::diary::{
    format_card_date, parse_created_diary, parse_diary_list, DiaryEntry, EntryId, RawDiaryRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 6,
            interval: Duration::from_millis(2000),
        }
    }
}

impl From<&Config> for PollPolicy {
    fn from(config: &Config) -> Self {
        Self {
            attempts: config.poll_attempts,
            interval: config.poll_interval(),
        }
    }
}

/// Outcome of one entry's wait for analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Analyzed(EntryId),
    Exhausted(EntryId),
}

/// Re-fetch `id` until a response carries analysis, up to `policy.attempts`
/// calls with `policy.interval` between them. Failed calls count as attempts.
pub async fn poll_for_analysis<B: DiaryBackend>(
    backend: &B,
    id: &str,
    policy: PollPolicy,
) -> Option<RawDiaryRecord> {
    for attempt in 1..=policy.attempts {
        match backend.fetch_diary(id).await {
            Ok(value) => match RawDiaryRecord::from_value(&value) {
                Some(raw) if raw.has_analysis() => {
                    tracing::info!(entry_id = id, attempt = attempt, "Diary analysis available");
                    return Some(raw);
                }
                _ => tracing::debug!(entry_id = id, attempt = attempt, "Diary analysis pending"),
            },
            Err(e) => {
                tracing::debug!(entry_id = id, attempt = attempt, error = %e, "Diary poll failed");
            }
        }

        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    tracing::info!(entry_id = id, attempts = policy.attempts, "Diary analysis not available, giving up");
    None
}

/// Handle to a running poll. Dropping it aborts the task.
#[derive(Debug)]
pub struct PollTask {
    id: EntryId,
    handle: JoinHandle<()>,
}

impl PollTask {
    pub fn id(&self) -> &EntryId {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

type Update = (EntryId, Option<RawDiaryRecord>);

/// Spawn the wait for `id`. Returns `None` for entries the backend cannot
/// look up (locally minted ids).
pub fn spawn_analysis_poll<B: DiaryBackend + Clone>(
    backend: &B,
    id: EntryId,
    policy: PollPolicy,
    updates: mpsc::UnboundedSender<Update>,
) -> Option<PollTask> {
    let backend_id = id.backend_id()?;
    let backend = backend.clone();
    let task_id = id.clone();

    let handle = tokio::spawn(async move {
        let fresh = poll_for_analysis(&backend, &backend_id, policy).await;
        // the receiver is gone only when the feed was dropped
        let _ = updates.send((task_id, fresh));
    });

    Some(PollTask { id, handle })
}

/// Entries shown on the diary page, plus the polls started for them.
pub struct DiaryFeed<B: DiaryBackend + Clone = ApiClient> {
    backend: B,
    policy: PollPolicy,
    entries: Vec<DiaryEntry>,
    polls: Vec<PollTask>,
    updates_tx: mpsc::UnboundedSender<Update>,
    updates_rx: mpsc::UnboundedReceiver<Update>,
}

impl<B: DiaryBackend + Clone> DiaryFeed<B> {
    pub fn new(backend: B, policy: PollPolicy) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            policy,
            entries: Vec::new(),
            polls: Vec::new(),
            updates_tx,
            updates_rx,
        }
    }

    pub fn entries(&self) -> &[DiaryEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &EntryId) -> Option<&DiaryEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// Number of polls that have not reported back yet.
    pub fn pending_polls(&self) -> usize {
        self.polls.len()
    }

    /// Replace the feed, newest first. Entries without a timestamp go last.
    pub fn replace_entries(&mut self, raws: &[RawDiaryRecord]) {
        self.entries = raws.iter().map(DiaryEntry::normalize).collect();
        self.entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// Put a just-created entry at the top of the feed and start waiting for
    /// its analysis if it has none yet.
    pub fn insert_created(&mut self, raw: &RawDiaryRecord) -> EntryId {
        let mut entry = DiaryEntry::normalize(raw);
        if entry.created_at.is_none() {
            let now = chrono::Local::now().naive_local();
            entry.date = format_card_date(&now);
            entry.created_at = Some(now);
        }

        let id = entry.id.clone();
        let needs_poll = !entry.has_analysis();
        self.entries.insert(0, entry);

        let already_polling = self.polls.iter().any(|p| p.id() == &id);
        if needs_poll && !already_polling {
            if let Some(task) =
                spawn_analysis_poll(&self.backend, id.clone(), self.policy, self.updates_tx.clone())
            {
                tracing::debug!(entry_id = %id, "Waiting for diary analysis");
                self.polls.push(task);
            }
        }
        id
    }

    fn apply(&mut self, (id, fresh): Update) -> PollEvent {
        if let Some(pos) = self.polls.iter().position(|p| p.id() == &id) {
            self.polls.swap_remove(pos);
        }

        match fresh {
            Some(raw) => {
                for entry in self.entries.iter_mut().filter(|e| e.id == id) {
                    entry.merge_fresh(&raw);
                }
                PollEvent::Analyzed(id)
            }
            None => PollEvent::Exhausted(id),
        }
    }

    /// Apply every poll result that has already arrived, without waiting.
    pub fn apply_ready(&mut self) -> Vec<PollEvent> {
        let mut events = Vec::new();
        while let Ok(update) = self.updates_rx.try_recv() {
            events.push(self.apply(update));
        }
        events
    }

    /// Wait for the next poll to finish and apply it. `None` once no poll
    /// is pending.
    pub async fn next_event(&mut self) -> Option<PollEvent> {
        loop {
            if let Ok(update) = self.updates_rx.try_recv() {
                return Some(self.apply(update));
            }

            // finished tasks have queued their result or panicked
            self.polls.retain(|p| !p.is_finished());
            if self.polls.is_empty() {
                return self.updates_rx.try_recv().ok().map(|u| self.apply(u));
            }

            let update = {
                let any_finished = select_all(self.polls.iter_mut().map(|p| &mut p.handle));
                tokio::select! {
                    update = self.updates_rx.recv() => update,
                    _ = any_finished => None,
                }
            };
            if let Some(update) = update {
                return Some(self.apply(update));
            }
        }
    }

    /// Abort every pending poll. Entries keep whatever they have.
    pub fn cancel_polls(&mut self) {
        self.polls.clear();
    }
}

impl DiaryFeed<ApiClient> {
    /// Load the feed from the backend.
    pub async fn load(&mut self) -> ClientResult<()> {
        let value = self.backend.list_diaries().await?;
        let raws = parse_diary_list(&value);
        tracing::debug!(count = raws.len(), "Diary entries loaded");
        self.replace_entries(&raws);
        Ok(())
    }

    /// Validate and submit a draft; on success the entry heads the feed.
    pub async fn create(&mut self, draft: &DiaryDraft) -> ClientResult<EntryId> {
        draft
            .check()
            .map_err(|e| ClientError::Validation(e.to_string()))?;

        let value = self
            .backend
            .create_diary(draft.title.trim(), &draft.text)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to save diary entry");
                e
            })?;
        let raw = parse_created_diary(&value)?;
        Ok(self.insert_created(&raw))
    }
}
