//! IndexNow submission client
//!
//! Pushes changed URLs to search engines in one JSON POST:
//! `{"host", "key", "keyLocation"?, "urlList"}`. The endpoint answers 200
//! (accepted) or 202 (accepted, key validation pending).

use almaseo_common::db::get_setting;
use almaseo_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Largest URL list a single submission may carry
pub const MAX_URLS_PER_SUBMISSION: usize = 10_000;

pub const DEFAULT_ENDPOINT: &str = "https://api.indexnow.org/indexnow";

const USER_AGENT: &str = concat!("AlmaSEO/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum IndexNowError {
    #[error(transparent)]
    Common(#[from] Error),

    #[error("IndexNow request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IndexNow rejected submission: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// IndexNow request body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexNowSubmission {
    pub host: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_location: Option<String>,
    pub url_list: Vec<String>,
}

/// Endpoint and site identity from the settings table
#[derive(Debug, Clone, PartialEq)]
pub struct IndexNowConfig {
    pub endpoint: String,
    pub key: String,
    pub host: String,
    pub key_location: Option<String>,
}

impl IndexNowConfig {
    /// Missing `indexnow_key` or `site_host` is a configuration error
    pub async fn from_database(db: &SqlitePool) -> Result<Self> {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let key = non_empty(get_setting(db, "indexnow_key").await?)
            .ok_or_else(|| Error::Config("indexnow_key is not set".to_string()))?;
        let host = non_empty(get_setting(db, "site_host").await?)
            .ok_or_else(|| Error::Config("site_host is not set".to_string()))?;
        let endpoint = non_empty(get_setting(db, "indexnow_endpoint").await?)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let key_location = non_empty(get_setting(db, "indexnow_key_location").await?);

        Ok(Self {
            endpoint,
            key,
            host,
            key_location,
        })
    }

    /// Build a request body, keeping at most [`MAX_URLS_PER_SUBMISSION`] URLs
    pub fn submission(&self, mut urls: Vec<String>) -> Result<IndexNowSubmission> {
        if urls.is_empty() {
            return Err(Error::InvalidInput("no URLs to submit".to_string()));
        }
        urls.truncate(MAX_URLS_PER_SUBMISSION);

        Ok(IndexNowSubmission {
            host: self.host.clone(),
            key: self.key.clone(),
            key_location: self.key_location.clone(),
            url_list: urls,
        })
    }
}

/// Accepted submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub status: u16,
    pub submitted: usize,
}

pub struct IndexNowClient {
    http_client: reqwest::Client,
}

impl IndexNowClient {
    pub fn new() -> std::result::Result<Self, IndexNowError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { http_client })
    }

    pub async fn submit(
        &self,
        config: &IndexNowConfig,
        urls: Vec<String>,
    ) -> std::result::Result<SubmitOutcome, IndexNowError> {
        let submission = config.submission(urls)?;
        debug!(
            urls = submission.url_list.len(),
            endpoint = %config.endpoint,
            "Submitting to IndexNow"
        );

        let response = self
            .http_client
            .post(&config.endpoint)
            .json(&submission)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 && status != 202 {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexNowError::Rejected { status, body });
        }

        info!(
            "IndexNow accepted {} URLs (HTTP {})",
            submission.url_list.len(),
            status
        );

        Ok(SubmitOutcome {
            status,
            submitted: submission.url_list.len(),
        })
    }
}
