use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::types::SourcePage;
use reqwest::{Client, Response};
use secrecy::ExposeSecret;

use crate::{
    config::{Config, SourceKind},
    error::SyncError,
    types::{EntitiesResponse, PagedResponse},
};

/// Read side of the fundraising site.
#[async_trait]
pub trait DonationSource: Send + Sync {
    /// Fetch page `page` (1-based). `page_size` is ignored by sources that
    /// do not page.
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<SourcePage, SyncError>;
}

#[derive(Clone)]
pub struct SourceClient {
    url: String,
    config: Arc<Config>,
    client: Client,
}

impl SourceClient {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build source HTTP client")?;

        Ok(Self {
            url: config.source_url(),
            config,
            client,
        })
    }

    async fn get(&self, page: u32, page_size: u32) -> Result<Response, SyncError> {
        let mut req = self.client.get(&self.url);

        if self.config.source_kind == SourceKind::Paged {
            req = req.query(&[("page", page), ("per_page", page_size)]);
        }

        if let Some(token) = &self.config.site_token {
            req = req.header(self.config.site_token_header.clone(), token.expose_secret());
        }

        let res = req.send().await.map_err(|e| SyncError::SourceUnavailable {
            page,
            status: None,
            message: e.to_string(),
        })?;

        let status = res.status();
        if !status.is_success() {
            return Err(SyncError::SourceUnavailable {
                page,
                status: Some(status.as_u16()),
                message: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        Ok(res)
    }
}

#[async_trait]
impl DonationSource for SourceClient {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<SourcePage, SyncError> {
        tracing::debug!("Fetching source page {} from {}", page, self.url);

        let res = self.get(page, page_size).await?;
        let malformed = |message: String| SyncError::SourceUnavailable {
            page,
            status: None,
            message: format!("malformed response: {message}"),
        };

        match self.config.source_kind {
            SourceKind::Paged => res
                .json::<PagedResponse>()
                .await
                .map_err(|e| malformed(e.to_string()))?
                .into_page(page_size)
                .map_err(malformed),
            SourceKind::Entities => res
                .json::<EntitiesResponse>()
                .await
                .map_err(|e| malformed(e.to_string()))?
                .into_page()
                .map_err(malformed),
        }
    }
}
