use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;
use crate::RollNumber;

/// Source of raw result pages, one roll number at a time.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, roll: &RollNumber) -> Result<String, FetchError>;
}

pub const DEFAULT_PORTAL_URL: &str = "https://oneview.aktu.ac.in/WebPages/AKTU/OneView.aspx";

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1",
];

/// Hidden ASP.NET form state the portal expects back with every search.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub view_state: String,
    pub view_state_generator: String,
    pub event_validation: String,
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub url: String,
    pub timeout: Duration,
    /// First delay between retries of a transient failure.
    pub retry_interval: Duration,
    /// Give up retrying transient failures after this long.
    pub max_retry: Duration,
    pub form: FormState,
    pub session_cookie: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PORTAL_URL.to_string(),
            timeout: Duration::from_secs(30),
            retry_interval: Duration::from_millis(500),
            max_retry: Duration::from_secs(60),
            form: FormState::default(),
            session_cookie: None,
        }
    }
}

pub struct PortalClient {
    client: Client,
    url: Url,
    form: FormState,
    session_cookie: Option<String>,
    retry_interval: Duration,
    max_retry: Duration,
    next_agent: AtomicUsize,
}

impl PortalClient {
    pub fn new(config: PortalConfig) -> Result<Self, FetchError> {
        let url = Url::parse(&config.url).map_err(|source| FetchError::InvalidUrl {
            url: config.url.clone(),
            source,
        })?;

        Ok(Self {
            client: Client::builder().timeout(config.timeout).build()?,
            url,
            form: config.form,
            session_cookie: config.session_cookie,
            retry_interval: config.retry_interval,
            max_retry: config.max_retry,
            next_agent: AtomicUsize::new(0),
        })
    }

    fn user_agent(&self) -> &'static str {
        let i = self.next_agent.fetch_add(1, Ordering::Relaxed);
        USER_AGENTS[i % USER_AGENTS.len()]
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(USER_AGENT, HeaderValue::from_static(self.user_agent()));
        if let Ok(origin) = HeaderValue::from_str(&self.url.origin().ascii_serialization()) {
            headers.insert(ORIGIN, origin);
        }
        if let Ok(referer) = HeaderValue::from_str(self.url.as_str()) {
            headers.insert(REFERER, referer);
        }
        if let Some(cookie) = &self.session_cookie {
            match HeaderValue::from_str(cookie) {
                Ok(value) => {
                    headers.insert(COOKIE, value);
                }
                Err(_) => warn!("session cookie is not a valid header value, sending without it"),
            }
        }
        headers
    }

    async fn fetch_once(&self, roll: &RollNumber) -> Result<String, FetchError> {
        let form = [
            ("__EVENTTARGET", ""),
            ("__EVENTARGUMENT", ""),
            ("__VIEWSTATE", self.form.view_state.as_str()),
            ("__VIEWSTATEGENERATOR", self.form.view_state_generator.as_str()),
            ("__EVENTVALIDATION", self.form.event_validation.as_str()),
            ("txtRollNo", roll.as_str()),
            ("g-recaptcha-response", ""),
            ("btnSearch", "खोजें"),
            ("hidForModel", ""),
        ];

        debug!(roll = %roll, url = %self.url, "posting search form");
        let res = self
            .client
            .post(self.url.clone())
            .headers(self.headers())
            .form(&form)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(FetchError::Status(res.status()));
        }

        let body = res.text().await?;
        if body.contains("Attention Required!") || body.contains("Checking your browser") {
            return Err(FetchError::Blocked);
        }
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for PortalClient {
    async fn fetch(&self, roll: &RollNumber) -> Result<String, FetchError> {
        let backoff = ExponentialBackoff {
            initial_interval: self.retry_interval,
            current_interval: self.retry_interval,
            max_elapsed_time: Some(self.max_retry),
            ..ExponentialBackoff::default()
        };

        retry(backoff, || async move {
            self.fetch_once(roll).await.map_err(|e| {
                if e.is_transient() {
                    warn!(roll = %roll, error = %e, "transient fetch error, retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }
}
