//! In-memory stand-ins for the fundraising site and the ledger.

#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use common::types::{
    Continuation, LedgerDonation, MessagePatch, NewDonation, SourceDonation, SourcePage,
};
use janotor::{
    error::{LedgerWriteError, SyncError},
    ledger_client::Ledger,
    source_client::DonationSource,
};

pub fn donation(id: &str, name: Option<&str>, message: Option<&str>) -> SourceDonation {
    SourceDonation {
        id: id.to_string(),
        created_at: "2024-11-03T16:20:00.000Z".to_string(),
        name: name.map(String::from),
        message: message.map(String::from),
        amount: 10.0,
    }
}

pub fn ledger_row(id: &str, external_id: &str, message: Option<&str>) -> LedgerDonation {
    LedgerDonation {
        id: id.to_string(),
        external_id: Some(external_id.to_string()),
        timestamp: Some("2024-11-03T16:20:00.000Z".to_string()),
        name: Some("Anonyymi".to_string()),
        message: message.map(String::from),
        amount: Some(10.0),
    }
}

/// Split `records` into pages of `page_size`, with `has_more` set the way the
/// full-page heuristic would set it.
pub fn pages_of(records: Vec<SourceDonation>, page_size: usize) -> Vec<SourcePage> {
    let mut pages: Vec<SourcePage> = records
        .chunks(page_size)
        .map(|chunk| SourcePage {
            records: chunk.to_vec(),
            continuation: Continuation {
                has_more: chunk.len() == page_size,
                total_known: None,
            },
        })
        .collect();

    if records.len() % page_size == 0 {
        pages.push(SourcePage {
            records: vec![],
            continuation: Continuation {
                has_more: false,
                total_known: None,
            },
        });
    }
    pages
}

#[derive(Default)]
pub struct FakeSource {
    pub pages: Vec<SourcePage>,
    pub fail_on_page: Option<u32>,
    pub delay: Option<Duration>,
    pub fetched: Mutex<Vec<u32>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new(pages: Vec<SourcePage>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn fetched(&self) -> Vec<u32> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl DonationSource for FakeSource {
    async fn fetch_page(&self, page: u32, _page_size: u32) -> Result<SourcePage, SyncError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.fetched.lock().unwrap().push(page);

        if self.fail_on_page == Some(page) {
            return Err(SyncError::SourceUnavailable {
                page,
                status: Some(503),
                message: "Service Unavailable".to_string(),
            });
        }

        Ok(self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or(SourcePage {
                records: vec![],
                continuation: Continuation {
                    has_more: false,
                    total_known: None,
                },
            }))
    }
}

#[derive(Default)]
pub struct FakeLedger {
    pub rows: Mutex<Vec<LedgerDonation>>,
    pub creates: Mutex<Vec<NewDonation>>,
    pub patches: Mutex<Vec<(String, MessagePatch)>>,
    pub fail_create_for: HashSet<String>,
    pub unavailable: bool,
    pub fetches: AtomicUsize,
    pub next_id: AtomicU64,
}

impl FakeLedger {
    pub fn with_rows(rows: Vec<LedgerDonation>) -> Self {
        Self {
            rows: Mutex::new(rows),
            next_id: AtomicU64::new(1000),
            ..Default::default()
        }
    }

    pub fn creates(&self) -> Vec<NewDonation> {
        self.creates.lock().unwrap().clone()
    }

    pub fn patches(&self) -> Vec<(String, MessagePatch)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.creates.lock().unwrap().clear();
        self.patches.lock().unwrap().clear();
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn fetch_all(&self) -> Result<Vec<LedgerDonation>, SyncError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(SyncError::LedgerUnavailable {
                status: Some(500),
                message: "Internal Server Error".to_string(),
            });
        }
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn create(&self, donation: &NewDonation) -> Result<(), LedgerWriteError> {
        self.creates.lock().unwrap().push(donation.clone());

        if self.fail_create_for.contains(&donation.external_id) {
            return Err(LedgerWriteError::Status {
                code: 500,
                body: "boom".to_string(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().push(LedgerDonation {
            id: id.to_string(),
            external_id: Some(donation.external_id.clone()),
            timestamp: Some(donation.timestamp.clone()),
            name: Some(donation.name.clone()),
            message: donation.message.clone(),
            amount: Some(donation.amount),
        });
        Ok(())
    }

    async fn patch(&self, ledger_id: &str, patch: &MessagePatch) -> Result<(), LedgerWriteError> {
        self.patches
            .lock()
            .unwrap()
            .push((ledger_id.to_string(), patch.clone()));

        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|r| r.id == ledger_id) {
            Some(row) => {
                row.message = Some(patch.message.clone());
                Ok(())
            }
            None => Err(LedgerWriteError::Status {
                code: 404,
                body: String::new(),
            }),
        }
    }
}
