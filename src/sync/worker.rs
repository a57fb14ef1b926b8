//! Drains the outbox to the remote store and pulls remote snapshots back
//! into the cache.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::{RemoteError, RemoteStore, SyncError};
use crate::config::SyncConfig;
use crate::db::{Outbox, OutboxEntry, OutboxOperation};
use crate::models::Collection;
use crate::repository::{ApplyStats, SyncSignal, SyncTarget};

const PUSH_BATCH: i64 = 50;

/// Exponential backoff: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            Duration::from_millis(config.retry_base_ms),
            Duration::from_millis(config.retry_max_ms),
        )
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PushReport {
    pub pushed: usize,
    pub dead_lettered: usize,
    /// Set when a transient failure or a rejected API key stopped the drain
    /// early.
    pub interrupted: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PullReport {
    pub collections: Vec<(Collection, ApplyStats)>,
}

impl PullReport {
    pub fn upserted(&self) -> usize {
        self.collections.iter().map(|(_, s)| s.upserted).sum()
    }

    pub fn removed(&self) -> usize {
        self.collections.iter().map(|(_, s)| s.removed).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub push: PushReport,
    pub pull: PullReport,
}

impl SyncReport {
    pub fn is_interrupted(&self) -> bool {
        self.push.interrupted.is_some()
    }
}

enum PushOutcome {
    Done,
    Transient(String),
    /// The client as a whole was refused. Nothing is dead-lettered.
    Unauthorized(String),
    Permanent(String),
}

pub struct SyncWorker {
    outbox: Outbox,
    remote: Arc<dyn RemoteStore>,
    targets: Vec<Arc<dyn SyncTarget>>,
    signal: SyncSignal,
    retry: RetryPolicy,
    interval: Duration,
}

impl SyncWorker {
    pub fn new(
        outbox: Outbox,
        remote: Arc<dyn RemoteStore>,
        targets: Vec<Arc<dyn SyncTarget>>,
        signal: SyncSignal,
    ) -> Self {
        Self {
            outbox,
            remote,
            targets,
            signal,
            retry: RetryPolicy::default(),
            interval: SyncConfig::default().interval(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Push, then pull.
    pub async fn sync_once(&self) -> Result<SyncReport, SyncError> {
        let push = self.push().await?;
        let pull = self.pull().await?;
        tracing::info!(
            pushed = push.pushed,
            dead_lettered = push.dead_lettered,
            pulled = pull.upserted(),
            removed = pull.removed(),
            "sync pass finished"
        );
        Ok(SyncReport { push, pull })
    }

    /// Drain pending entries oldest first.
    pub async fn push(&self) -> Result<PushReport, SyncError> {
        let mut report = PushReport::default();
        loop {
            let batch = self.outbox.pending(PUSH_BATCH).await?;
            if batch.is_empty() {
                return Ok(report);
            }
            for entry in batch {
                match self.push_entry(&entry).await {
                    PushOutcome::Done => {
                        self.outbox.mark_done(entry.seq).await?;
                        report.pushed += 1;
                    }
                    PushOutcome::Transient(message) => {
                        self.outbox.record_failure(entry.seq, &message, false).await?;
                        tracing::debug!(
                            collection = %entry.collection,
                            id = %entry.document_id,
                            "push interrupted: {}",
                            message
                        );
                        report.interrupted = Some(message);
                        return Ok(report);
                    }
                    PushOutcome::Unauthorized(message) => {
                        tracing::warn!("push stopped, API key rejected: {}", message);
                        report.interrupted = Some(message);
                        return Ok(report);
                    }
                    PushOutcome::Permanent(message) => {
                        self.outbox.record_failure(entry.seq, &message, true).await?;
                        tracing::warn!(
                            collection = %entry.collection,
                            id = %entry.document_id,
                            "remote rejected change, moved to failed: {}",
                            message
                        );
                        report.dead_lettered += 1;
                    }
                }
            }
        }
    }

    async fn push_entry(&self, entry: &OutboxEntry) -> PushOutcome {
        let result = match entry.operation {
            OutboxOperation::Upsert => {
                let document = match entry
                    .payload
                    .as_deref()
                    .map(serde_json::from_str::<serde_json::Value>)
                {
                    Some(Ok(document)) => document,
                    Some(Err(e)) => return PushOutcome::Permanent(format!("invalid payload: {}", e)),
                    None => return PushOutcome::Permanent("missing payload".to_string()),
                };
                self.remote
                    .put(entry.collection, &entry.document_id, &document)
                    .await
            }
            // Already gone remotely counts as deleted.
            OutboxOperation::Delete => self
                .remote
                .delete(entry.collection, &entry.document_id)
                .await
                .map(|_| ()),
        };
        match result {
            Ok(()) => PushOutcome::Done,
            Err(e) => e.into(),
        }
    }

    /// Mirror every registered collection from the remote store.
    pub async fn pull(&self) -> Result<PullReport, SyncError> {
        let mut report = PullReport::default();
        for target in &self.targets {
            let collection = target.collection();
            let documents = self.remote.list(collection).await?;
            let stats = target.apply_documents(documents).await?;
            tracing::debug!(%collection, ?stats, "pulled");
            report.collections.push((collection, stats));
        }
        Ok(report)
    }

    /// Run until the returned handle is aborted. Passes start on the signal
    /// or every `interval`, and back off after transient failures.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                let transient = match self.sync_once().await {
                    Ok(report) if report.is_interrupted() => true,
                    Ok(_) => false,
                    Err(e) if e.is_transient() => {
                        tracing::debug!("sync failed, will retry: {}", e);
                        true
                    }
                    Err(e) => {
                        tracing::error!("sync failed: {}", e);
                        false
                    }
                };

                if transient {
                    let delay = self.retry.delay(attempt);
                    attempt = attempt.saturating_add(1);
                    tracing::debug!(attempt, ?delay, "backing off");
                    tokio::time::sleep(delay).await;
                    continue;
                }

                attempt = 0;
                tokio::select! {
                    _ = self.signal.notified() => {}
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
        })
    }
}

impl From<RemoteError> for PushOutcome {
    fn from(e: RemoteError) -> Self {
        if e.is_transient() {
            PushOutcome::Transient(e.to_string())
        } else if e.is_unauthorized() {
            PushOutcome::Unauthorized(e.to_string())
        } else {
            PushOutcome::Permanent(e.to_string())
        }
    }
}
