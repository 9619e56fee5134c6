use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use common::types::{LedgerDonation, MessagePatch, NewDonation, SourceDonation};
use futures_util::future::join_all;

use crate::{
    config::Config,
    error::{LedgerWriteError, SyncError},
    ledger_client::{Ledger, LedgerClient},
    source_client::{DonationSource, SourceClient},
};

/// What to do with one source record.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create(NewDonation),
    Patch {
        ledger_id: String,
        external_id: String,
        patch: MessagePatch,
    },
    Known {
        external_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Patch,
}

#[derive(Debug)]
pub struct WriteOutcome {
    pub external_id: String,
    pub kind: WriteKind,
    pub result: Result<(), LedgerWriteError>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub pages: u32,
    pub created: usize,
    pub patched: usize,
    pub known: usize,
    pub failed: usize,
}

struct Entry {
    // None for records created earlier in this pass; the ledger assigns ids.
    ledger_id: Option<String>,
    message: Option<String>,
}

/// Ledger snapshot keyed by `external_id`.
pub struct LedgerIndex {
    entries: HashMap<String, Entry>,
}

impl LedgerIndex {
    pub fn from_rows(rows: Vec<LedgerDonation>) -> Self {
        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            let Some(external_id) = row.external_id else {
                continue;
            };
            if entries.contains_key(&external_id) {
                tracing::debug!("Ledger holds external id {} more than once", external_id);
                continue;
            }
            entries.insert(
                external_id,
                Entry {
                    ledger_id: Some(row.id),
                    message: row.message,
                },
            );
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.entries.contains_key(external_id)
    }
}

/// Decide, in source order, what each record needs. The index is updated as
/// it goes so a record repeated within one pass is only written once.
pub fn classify(records: &[SourceDonation], index: &mut LedgerIndex) -> Vec<Action> {
    let mut actions = Vec::with_capacity(records.len());

    for donation in records {
        let external_id = donation.id.clone();

        if let Some(entry) = index.entries.get_mut(&external_id) {
            let action = match (&donation.message, &entry.ledger_id) {
                (Some(message), Some(ledger_id)) if entry.message.as_ref() != Some(message) => {
                    let action = Action::Patch {
                        ledger_id: ledger_id.clone(),
                        external_id,
                        patch: MessagePatch {
                            message: message.clone(),
                        },
                    };
                    entry.message = Some(message.clone());
                    action
                }
                _ => Action::Known { external_id },
            };
            actions.push(action);
            continue;
        }

        index.entries.insert(
            external_id,
            Entry {
                ledger_id: None,
                message: donation.message.clone(),
            },
        );
        actions.push(Action::Create(NewDonation::from_source(donation)));
    }

    actions
}

pub struct Reconciler {
    source: Arc<dyn DonationSource>,
    ledger: Arc<dyn Ledger>,
    page_size: u32,
    max_pages: u32,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn DonationSource>,
        ledger: Arc<dyn Ledger>,
        page_size: u32,
        max_pages: u32,
    ) -> Self {
        Self {
            source,
            ledger,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        }
    }

    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let source = SourceClient::new(Arc::clone(&config))?;
        let ledger = LedgerClient::new(Arc::clone(&config))?;

        Ok(Self::new(
            Arc::new(source),
            Arc::new(ledger),
            config.page_size,
            config.max_pages,
        ))
    }

    /// One full sync: snapshot the ledger, then walk the source from page 1
    /// until it reports no more pages. Writes already made stay made if a
    /// later fetch fails.
    pub async fn run_pass(&self) -> Result<PassReport, SyncError> {
        let rows = self.ledger.fetch_all().await?;
        let mut index = LedgerIndex::from_rows(rows);
        tracing::debug!("[reconcile] Ledger snapshot holds {} synced donations", index.len());

        let mut report = PassReport::default();
        let mut page = 1;

        loop {
            let fetched = self.source.fetch_page(page, self.page_size).await?;
            report.pages += 1;

            tracing::debug!(
                "[reconcile] Page {}: {} records, more={}, total={:?}",
                page,
                fetched.records.len(),
                fetched.continuation.has_more,
                fetched.continuation.total_known
            );

            let actions = classify(&fetched.records, &mut index);
            for outcome in self.apply(actions, &mut report).await {
                match (&outcome.result, outcome.kind) {
                    (Ok(()), WriteKind::Create) => {
                        report.created += 1;
                        tracing::info!("Added donation #{}", outcome.external_id);
                    }
                    (Ok(()), WriteKind::Patch) => {
                        report.patched += 1;
                        tracing::info!("Updated message of donation #{}", outcome.external_id);
                    }
                    (Err(e), WriteKind::Create) => {
                        report.failed += 1;
                        tracing::error!("Failed to add donation #{}: {}", outcome.external_id, e);
                    }
                    (Err(e), WriteKind::Patch) => {
                        report.failed += 1;
                        tracing::error!(
                            "Failed to update message of donation #{}: {}",
                            outcome.external_id,
                            e
                        );
                    }
                }
            }

            if !fetched.continuation.has_more {
                break;
            }
            if page >= self.max_pages {
                tracing::warn!(
                    "[reconcile] Stopping after {} pages although the source reports more",
                    page
                );
                break;
            }
            page += 1;
        }

        tracing::info!(
            "[reconcile] Pass done: {} pages, {} created, {} patched, {} known, {} failed",
            report.pages,
            report.created,
            report.patched,
            report.known,
            report.failed
        );

        Ok(report)
    }

    /// Fire every write for one page concurrently and wait for all of them.
    async fn apply(&self, actions: Vec<Action>, report: &mut PassReport) -> Vec<WriteOutcome> {
        let mut pending = vec![];
        let mut tasks = vec![];

        for action in actions {
            let ledger = Arc::clone(&self.ledger);
            match action {
                Action::Known { .. } => report.known += 1,
                Action::Create(donation) => {
                    pending.push((donation.external_id.clone(), WriteKind::Create));
                    tasks.push(tokio::spawn(async move { ledger.create(&donation).await }));
                }
                Action::Patch {
                    ledger_id,
                    external_id,
                    patch,
                } => {
                    pending.push((external_id, WriteKind::Patch));
                    tasks.push(tokio::spawn(
                        async move { ledger.patch(&ledger_id, &patch).await },
                    ));
                }
            }
        }

        pending
            .into_iter()
            .zip(join_all(tasks).await)
            .map(|((external_id, kind), joined)| WriteOutcome {
                external_id,
                kind,
                result: joined.unwrap_or_else(|e| Err(LedgerWriteError::Task(e.to_string()))),
            })
            .collect()
    }
}
