use std::{fmt::Display, str::FromStr, time::Duration};

use reqwest::header::{HeaderName, HeaderValue};
use secrecy::SecretString;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_FETCH_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const DEFAULT_MAX_PAGES: u32 = 100;
pub const DEFAULT_SOURCE_PATH: &str = "/api/{site}/donations";
pub const DEFAULT_SITE_TOKEN_HEADER: &str = "X-Site-Token";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

const REQUIRED: &[&str] = &[
    "VAUHTIS_URL",
    "VAUHTIS_USERNAME",
    "VAUHTIS_PASSWORD",
    "SITE_URL",
    "SITE_ID",
];

/// Response shape of the fundraising site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `{ data: [...], next_page_url, total }`, fetched page by page.
    Paged,
    /// `{ entities: { "<id>": {...} } }`, everything in one response.
    Entities,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paged" => Ok(SourceKind::Paged),
            "entities" => Ok(SourceKind::Entities),
            other => Err(format!("unknown source kind '{other}' (expected paged or entities)")),
        }
    }
}

/// Everything the sync needs, read once at startup.
#[derive(Debug)]
pub struct Config {
    pub ledger_url: String,
    pub ledger_username: String,
    pub ledger_password: SecretString,
    pub site_url: String,
    pub site_id: String,
    pub source_path: String,
    pub source_kind: SourceKind,
    pub site_token: Option<SecretString>,
    pub site_token_header: HeaderName,
    pub page_size: u32,
    pub max_pages: u32,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut err = ConfigError::default();

        for &key in REQUIRED {
            if get(key).is_none() {
                err.missing.push(key.to_string());
            }
        }

        let ledger_url = get("VAUHTIS_URL").and_then(|raw| check_url("VAUHTIS_URL", &raw, &mut err));
        let site_url = get("SITE_URL").and_then(|raw| check_url("SITE_URL", &raw, &mut err));

        let poll_ms = positive(&get, "FETCH_INTERVAL", DEFAULT_FETCH_INTERVAL_MS, &mut err);
        let page_size = positive(&get, "PAGE_SIZE", DEFAULT_PAGE_SIZE, &mut err);
        let max_pages = positive(&get, "MAX_PAGES", DEFAULT_MAX_PAGES, &mut err);
        let timeout_secs = positive(&get, "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS, &mut err);

        let source_kind = match get("SOURCE_KIND").map(|v| v.parse::<SourceKind>()) {
            None => SourceKind::Paged,
            Some(Ok(kind)) => kind,
            Some(Err(e)) => {
                err.invalid.push(format!("SOURCE_KIND: {e}"));
                SourceKind::Paged
            }
        };

        let mut source_path = get("SOURCE_PATH").unwrap_or_else(|| DEFAULT_SOURCE_PATH.to_string());
        if !source_path.starts_with('/') {
            source_path.insert(0, '/');
        }

        let header_raw =
            get("SITE_TOKEN_HEADER").unwrap_or_else(|| DEFAULT_SITE_TOKEN_HEADER.to_string());
        let site_token_header = match HeaderName::from_bytes(header_raw.trim().as_bytes()) {
            Ok(name) => Some(name),
            Err(_) => {
                err.invalid
                    .push(format!("SITE_TOKEN_HEADER: '{header_raw}' is not a valid header name"));
                None
            }
        };

        let site_token = get("SITE_TOKEN");
        if let Some(token) = &site_token {
            if HeaderValue::from_str(token).is_err() {
                err.invalid
                    .push("SITE_TOKEN: contains characters not allowed in a header".to_string());
            }
        }

        if !err.is_empty() {
            return Err(err);
        }

        // Required values are all present past this point.
        Ok(Self {
            ledger_url: ledger_url.unwrap_or_default(),
            ledger_username: get("VAUHTIS_USERNAME").unwrap_or_default(),
            ledger_password: SecretString::from(get("VAUHTIS_PASSWORD").unwrap_or_default()),
            site_url: site_url.unwrap_or_default(),
            site_id: get("SITE_ID").unwrap_or_default().trim().to_string(),
            source_path,
            source_kind,
            site_token: site_token.map(SecretString::from),
            site_token_header: site_token_header
                .unwrap_or_else(|| HeaderName::from_static("x-site-token")),
            page_size,
            max_pages,
            poll_interval: Duration::from_millis(poll_ms),
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Full URL of the donation feed, with `{site}` filled in.
    pub fn source_url(&self) -> String {
        format!(
            "{}{}",
            self.site_url,
            self.source_path.replace("{site}", &self.site_id)
        )
    }
}

fn check_url(key: &str, raw: &str, err: &mut ConfigError) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(trimmed.to_string()),
        Ok(url) => {
            err.invalid.push(format!(
                "{key}: must start with http:// or https:// (got {}://)",
                url.scheme()
            ));
            None
        }
        Err(e) => {
            err.invalid.push(format!("{key}: {e}"));
            None
        }
    }
}

fn positive<T, G>(get: &G, key: &str, default: T, err: &mut ConfigError) -> T
where
    T: FromStr + PartialOrd + Default + Copy,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) if v > T::default() => v,
            Ok(_) => {
                err.invalid.push(format!("{key}: must be greater than zero"));
                default
            }
            Err(e) => {
                err.invalid.push(format!("{key}: '{raw}' is not a number ({e})"));
                default
            }
        },
    }
}
