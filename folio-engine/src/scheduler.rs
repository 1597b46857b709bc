//! Scheduled publishing.
//!
//! [`PublishScheduler::poll_once`] publishes every versioned document whose
//! `_scheduledPublishAt` has elapsed. Each document is handled on its own:
//! a failure is logged and reported, and the rest of the cycle continues.
//! The timestamp is cleared only after a successful publish, so a failed
//! document is retried on the next cycle. Soft-deleted documents are never
//! published; their schedule is dropped.

use crate::api::Folio;
use crate::error::EngineResult;
use folio_model::DocumentExt;
use folio_types::Timestamp;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A document published by a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledPublish {
    pub collection: String,
    pub id: String,
}

/// A document (or whole collection, when `id` is `None`) a poll cycle could
/// not process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollFailure {
    pub collection: String,
    pub id: Option<String>,
    pub error: String,
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub published: Vec<ScheduledPublish>,
    pub failed: Vec<PollFailure>,
}

impl PollReport {
    pub fn is_empty(&self) -> bool {
        self.published.is_empty() && self.failed.is_empty()
    }
}

/// Publishes documents whose scheduled instant has passed. Runs with access
/// overridden.
#[derive(Debug, Clone)]
pub struct PublishScheduler {
    folio: Folio,
}

impl PublishScheduler {
    pub(crate) fn new(folio: &Folio) -> Self {
        Self {
            folio: folio.overriding_access(),
        }
    }

    /// Runs one cycle against `now`.
    pub async fn poll_once(&self, now: Timestamp) -> PollReport {
        let mut report = PollReport::default();
        let storage = self.folio.storage();

        for config in self.folio.schema().versioned_collections() {
            let slug = config.slug.as_str();
            let due = match storage.find_scheduled_documents(slug, now).await {
                Ok(docs) => docs,
                Err(e) => {
                    warn!(collection = %slug, error = %e, "scheduled lookup failed");
                    report.failed.push(PollFailure {
                        collection: slug.to_string(),
                        id: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            for doc in due {
                let Some(id) = doc.id() else {
                    warn!(collection = %slug, "scheduled document without id");
                    report.failed.push(PollFailure {
                        collection: slug.to_string(),
                        id: None,
                        error: "document has no id".into(),
                    });
                    continue;
                };
                let trashed = config
                    .deleted_at_field()
                    .is_some_and(|field| !matches!(doc.get(field), None | Some(Value::Null)));
                if trashed {
                    debug!(collection = %slug, id = %id, "dropping schedule of deleted document");
                    if let Err(e) = storage.set_scheduled_publish_at(slug, &id, None).await {
                        report.failed.push(PollFailure {
                            collection: slug.to_string(),
                            id: Some(id),
                            error: e.to_string(),
                        });
                    }
                    continue;
                }
                match self.publish_due(slug, &id).await {
                    Ok(()) => {
                        info!(collection = %slug, id = %id, "scheduled publish done");
                        report.published.push(ScheduledPublish {
                            collection: slug.to_string(),
                            id,
                        });
                    }
                    Err(e) => {
                        warn!(collection = %slug, id = %id, error = %e, "scheduled publish failed");
                        report.failed.push(PollFailure {
                            collection: slug.to_string(),
                            id: Some(id),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        if !report.is_empty() {
            info!(
                published = report.published.len(),
                failed = report.failed.len(),
                "scheduler cycle finished"
            );
        }
        report
    }

    async fn publish_due(&self, collection: &str, id: &str) -> EngineResult<()> {
        self.folio.versions(collection)?.publish(id).await?;
        self.folio
            .storage()
            .set_scheduled_publish_at(collection, id, None)
            .await?;
        Ok(())
    }

    /// Polls every `interval` on a background task until the handle is shut
    /// down. Must be called from within a Tokio runtime.
    pub fn spawn(self, interval: Duration) -> SchedulerHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = interval.as_secs(), "publish scheduler started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.poll_once(Timestamp::now()).await;
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("publish scheduler stopped");
        });
        SchedulerHandle { shutdown, task }
    }
}

/// Handle to a running scheduler task.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals the task to stop and waits for it.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "publish scheduler task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
