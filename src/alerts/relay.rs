//! Reconciliation run: fetch, diff, persist and notify, one category at a time

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::fetcher::Fetcher;
use super::reconcile::Diff;
use super::record::{AlertRecord, Category};
use super::router::{Router, Transition};
use crate::config::QueryConfig;
use crate::monitor::{MonitorError, ProblemSource};
use crate::notify::{ChatMessage, ChatSink, NotifyError};
use crate::storage::{AlertStore, AlertTable, StoreError};

/// Drives reconciliation runs against injected collaborators
pub struct Relay<P, S, C> {
    source: P,
    store: S,
    sink: C,
    router: Router,
    query: QueryConfig,
}

/// What one category run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryReport {
    pub category: Category,
    /// Records that passed the tag policy
    pub fetched: usize,
    pub raised: Vec<i64>,
    pub cleared: Vec<i64>,
    pub messages_sent: usize,
}

impl CategoryReport {
    fn new(category: Category, fetched: usize) -> Self {
        Self {
            category,
            fetched,
            raised: Vec::new(),
            cleared: Vec::new(),
            messages_sent: 0,
        }
    }
}

/// Outcome of a full run over every category
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<(Category, Result<CategoryReport, RelayError>)>,
}

impl RunSummary {
    /// Number of categories that failed
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_err()).count()
    }

    /// True when every category reconciled
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn report(&self, category: Category) -> Option<&CategoryReport> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == category)
            .and_then(|(_, r)| r.as_ref().ok())
    }

    pub fn error(&self, category: Category) -> Option<&RelayError> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == category)
            .and_then(|(_, r)| r.as_ref().err())
    }
}

impl<P, S, C> Relay<P, S, C>
where
    P: ProblemSource,
    S: AlertStore,
    C: ChatSink,
{
    /// Create a relay over the given source, store and chat sink
    pub fn new(source: P, store: S, sink: C, router: Router, query: QueryConfig) -> Self {
        Self {
            source,
            store,
            sink,
            router,
            query,
        }
    }

    /// Snapshot store, for shutting it down
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run every category in order. A failed category is logged and does
    /// not stop the ones after it.
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        for category in Category::ALL {
            let result = self.run_category(category).await;
            match &result {
                Ok(report) => tracing::info!(
                    category = %category,
                    fetched = report.fetched,
                    raised = report.raised.len(),
                    cleared = report.cleared.len(),
                    messages = report.messages_sent,
                    "Category reconciled"
                ),
                Err(e) => tracing::error!(
                    category = %category,
                    stage = e.stage(),
                    error = %e,
                    "Category run failed"
                ),
            }
            summary.outcomes.push((category, result));
        }

        summary
    }

    /// Reconcile one category.
    ///
    /// Row mutations are committed together at the end. On any error they are
    /// rolled back, while messages already delivered stay delivered.
    pub async fn run_category(&self, category: Category) -> Result<CategoryReport, RelayError> {
        // Nothing is touched until the fetch succeeded
        let fetched = Fetcher::new(&self.source, &self.query)
            .fetch(category)
            .await
            .map_err(|source| RelayError::Fetch { category, source })?;

        let mut table = self
            .store
            .begin(category)
            .await
            .map_err(|source| RelayError::Store {
                category,
                stage: Stage::Begin,
                source,
            })?;

        let mut report = CategoryReport::new(category, fetched.len());

        if let Err(err) = self.apply(&mut table, fetched, &mut report).await {
            if let Err(e) = table.rollback().await {
                tracing::error!(category = %category, error = %e, "Rollback failed");
            }
            if report.messages_sent > 0 {
                tracing::warn!(
                    category = %category,
                    messages_sent = report.messages_sent,
                    "Snapshot rolled back after messages were delivered"
                );
            }
            return Err(err);
        }

        table.commit().await.map_err(|source| {
            tracing::warn!(
                category = %category,
                messages_sent = report.messages_sent,
                "Commit failed after messages were delivered"
            );
            RelayError::Store {
                category,
                stage: Stage::Commit,
                source,
            }
        })?;

        Ok(report)
    }

    async fn apply(
        &self,
        table: &mut S::Table,
        fetched: Vec<AlertRecord>,
        report: &mut CategoryReport,
    ) -> Result<(), RelayError> {
        let category = report.category;

        let stored = table
            .open_ids()
            .await
            .map_err(|source| RelayError::Store {
                category,
                stage: Stage::ReadSnapshot,
                source,
            })?;

        let by_id: BTreeMap<i64, AlertRecord> =
            fetched.into_iter().map(|r| (r.id, r)).collect();
        let current: BTreeSet<i64> = by_id.keys().copied().collect();
        let diff = Diff::compute(&current, &stored);

        if diff.is_empty() {
            tracing::debug!(category = %category, open = stored.len(), "No changes");
            return Ok(());
        }

        for &id in &diff.raised {
            let record = by_id
                .get(&id)
                .ok_or(RelayError::MissingRecord { category, id })?;

            table
                .insert(record)
                .await
                .map_err(|source| RelayError::Store {
                    category,
                    stage: Stage::Insert(id),
                    source,
                })?;

            let message = self.router.notification(record, Transition::Raised);
            self.deliver(record, Transition::Raised, &message, report).await?;
            report.raised.push(id);
        }

        for &id in &diff.cleared {
            let stored = table
                .get(id)
                .await
                .map_err(|source| RelayError::Store {
                    category,
                    stage: Stage::Lookup(id),
                    source,
                })?;

            match stored {
                Some(record) => {
                    let message = self.router.notification(&record, Transition::Cleared);
                    self.deliver(&record, Transition::Cleared, &message, report)
                        .await?;
                }
                None => tracing::warn!(
                    category = %category,
                    alert_id = id,
                    "Stored row vanished before clear, deleting without message"
                ),
            }

            table
                .delete(id)
                .await
                .map_err(|source| RelayError::Store {
                    category,
                    stage: Stage::Delete(id),
                    source,
                })?;
            report.cleared.push(id);
        }

        Ok(())
    }

    async fn deliver(
        &self,
        record: &AlertRecord,
        transition: Transition,
        message: &ChatMessage,
        report: &mut CategoryReport,
    ) -> Result<(), RelayError> {
        self.sink
            .send(message)
            .await
            .map_err(|source| RelayError::Notify {
                category: record.category,
                id: record.id,
                transition,
                source,
            })?;
        report.messages_sent += 1;

        tracing::info!(
            category = %record.category,
            alert_id = record.id,
            transition = transition.as_str(),
            room_id = %message.room_id,
            raised_at = ?record.raised_at(),
            "Alert {}: {}",
            transition.as_str(),
            record.name
        );

        Ok(())
    }
}

/// Storage step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Begin,
    ReadSnapshot,
    Insert(i64),
    Lookup(i64),
    Delete(i64),
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Begin => f.write_str("begin"),
            Stage::ReadSnapshot => f.write_str("snapshot read"),
            Stage::Insert(id) => write!(f, "insert of alert {}", id),
            Stage::Lookup(id) => write!(f, "lookup of alert {}", id),
            Stage::Delete(id) => write!(f, "delete of alert {}", id),
            Stage::Commit => f.write_str("commit"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{category}: fetching alerts failed: {source}")]
    Fetch {
        category: Category,
        source: MonitorError,
    },

    #[error("{category}: {stage} failed: {source}")]
    Store {
        category: Category,
        stage: Stage,
        source: StoreError,
    },

    #[error("{category}: delivering {} message for alert {id} failed: {source}", .transition.as_str())]
    Notify {
        category: Category,
        id: i64,
        transition: Transition,
        source: NotifyError,
    },

    #[error("{category}: raised alert {id} is not in the fetched set")]
    MissingRecord { category: Category, id: i64 },
}

impl RelayError {
    pub fn category(&self) -> Category {
        match self {
            RelayError::Fetch { category, .. }
            | RelayError::Store { category, .. }
            | RelayError::Notify { category, .. }
            | RelayError::MissingRecord { category, .. } => *category,
        }
    }

    /// Short stage name for logs
    pub fn stage(&self) -> &'static str {
        match self {
            RelayError::Fetch { .. } => "fetch",
            RelayError::Store { stage, .. } => match stage {
                Stage::Begin => "begin",
                Stage::ReadSnapshot => "snapshot_read",
                Stage::Insert(_) => "insert",
                Stage::Lookup(_) => "lookup",
                Stage::Delete(_) => "delete",
                Stage::Commit => "commit",
            },
            RelayError::Notify { .. } => "notify",
            RelayError::MissingRecord { .. } => "diff",
        }
    }
}
