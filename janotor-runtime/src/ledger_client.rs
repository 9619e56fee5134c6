use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::types::{LedgerDonation, MessagePatch, NewDonation};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;

use crate::{
    config::Config,
    error::{LedgerWriteError, SyncError},
};

const MAX_ERROR_BODY: usize = 200;

/// The donation ledger: the only record of what has already been synced.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<LedgerDonation>, SyncError>;

    async fn create(&self, donation: &NewDonation) -> Result<(), LedgerWriteError>;

    async fn patch(&self, ledger_id: &str, patch: &MessagePatch) -> Result<(), LedgerWriteError>;
}

#[derive(Clone)]
pub struct LedgerClient {
    config: Arc<Config>,
    client: Client,
}

impl LedgerClient {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build ledger HTTP client")?;

        Ok(Self { config, client })
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(
            &self.config.ledger_username,
            Some(self.config.ledger_password.expose_secret()),
        )
    }

    async fn send_write(&self, req: RequestBuilder) -> Result<(), LedgerWriteError> {
        let res = self
            .authed(req)
            .send()
            .await
            .map_err(|e| LedgerWriteError::Transport(e.to_string()))?;

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = res.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }

        Err(LedgerWriteError::Status {
            code: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}

#[async_trait]
impl Ledger for LedgerClient {
    async fn fetch_all(&self) -> Result<Vec<LedgerDonation>, SyncError> {
        let res = self
            .client
            .get(&self.config.ledger_url)
            .send()
            .await
            .map_err(|e| SyncError::LedgerUnavailable {
                status: None,
                message: e.to_string(),
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(SyncError::LedgerUnavailable {
                status: Some(status.as_u16()),
                message: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        res.json::<Vec<LedgerDonation>>()
            .await
            .map_err(|e| SyncError::LedgerUnavailable {
                status: None,
                message: format!("malformed response: {e}"),
            })
    }

    async fn create(&self, donation: &NewDonation) -> Result<(), LedgerWriteError> {
        tracing::debug!(
            "Creating ledger donation:\n{}",
            serde_json::to_string_pretty(donation).unwrap_or_default()
        );

        self.send_write(self.client.post(&self.config.ledger_url).json(donation))
            .await
    }

    async fn patch(&self, ledger_id: &str, patch: &MessagePatch) -> Result<(), LedgerWriteError> {
        self.send_write(
            self.client
                .patch(format!("{}/{}", self.config.ledger_url, ledger_id))
                .json(patch),
        )
        .await
    }
}
