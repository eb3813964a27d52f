//! Session HTTP client for the legacy board.
//!
//! Keeps cookies across calls (the board tracks the session id in a cookie),
//! paces outbound requests to respect the site's request budget, and retries
//! transient failures with linear backoff. Board-level errors rendered into
//! otherwise-200 pages (`class="error"`) surface as fetch errors.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

const MAX_RETRIES: u32 = 2;
const RETRY_BACKOFF_MS: u64 = 500;

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub content: String,
    pub status_code: u16,
}

/// Errors that can occur while talking to the board.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout")]
    Timeout,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("board error: {0}")]
    Board(String),

    #[error("login failed: {0}")]
    Login(String),
}

impl FetchError {
    /// Transient errors are retried inside the client; everything else is
    /// permanent and propagates.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout => true,
            FetchError::Network(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("timeout")
                    || msg.contains("broken pipe")
                    || msg.contains("connection reset")
                    || msg.contains("temporary")
            }
            _ => false,
        }
    }
}

/// Page-fetch capability consumed by the orchestrator. Implemented by
/// [`ForumClient`] in production and by stubs in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResult, FetchError>;
}

/// Cookie-keeping client over the board's HTTP surface.
#[derive(Debug)]
pub struct ForumClient {
    client: reqwest::Client,
    timeout_duration: Duration,
    request_delay: Duration,
}

impl ForumClient {
    pub fn new(user_agent: &str, timeout_secs: u64, request_delay_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .cookie_store(true)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            timeout_duration: Duration::from_secs(timeout_secs),
            request_delay: Duration::from_millis(request_delay_ms),
        }
    }

    /// Fetch a page, pacing and retrying transient failures.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64)).await;
            }
            sleep(self.request_delay).await;

            match self.fetch_once(url).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    warn!(url, attempt, error = %e, "retrying fetch");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(FetchError::Network("max retries exceeded".to_string())))
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchResult, FetchError> {
        let response = timeout(self.timeout_duration, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(classify_error)?;

        let status_code = response.status().as_u16();
        let content = timeout(self.timeout_duration, response.text())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| FetchError::Body(e.to_string()))?;

        if let Some(board_error) = parse_board_error(&content) {
            return Err(FetchError::Board(board_error));
        }

        Ok(FetchResult {
            content,
            status_code,
        })
    }

    /// Submit a form, paced like a fetch. The board throttles posts harder
    /// than gets, so the delay applies twice.
    pub async fn post_form(
        &self,
        url: &str,
        fields: &HashMap<String, String>,
    ) -> Result<FetchResult, FetchError> {
        sleep(self.request_delay).await;
        sleep(self.request_delay).await;
        debug!(url, "posting form");

        let response = timeout(
            self.timeout_duration,
            self.client.post(url).form(fields).send(),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(classify_error)?;

        let status_code = response.status().as_u16();
        let content = timeout(self.timeout_duration, response.text())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| FetchError::Body(e.to_string()))?;

        if let Some(board_error) = parse_board_error(&content) {
            return Err(FetchError::Board(board_error));
        }

        Ok(FetchResult {
            content,
            status_code,
        })
    }

    /// Log into the board, reusing an existing session when the cookie jar
    /// already carries one for this username.
    pub async fn login(
        &self,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<(), FetchError> {
        let index = self.fetch(base_url).await?;
        match logged_in_user(&index.content) {
            Some(current) if current == username => {
                info!(username, "session already logged in");
                return Ok(());
            }
            Some(current) => {
                return Err(FetchError::Login(format!(
                    "cannot log in as {}: {} holds the session",
                    username, current
                )));
            }
            None => {}
        }

        let login_page = self
            .fetch(&format!("{}ucp.php?mode=login", base_url))
            .await?;
        let mut fields = hidden_inputs(&login_page.content);
        fields.insert("username".to_string(), username.to_string());
        fields.insert("password".to_string(), password.to_string());
        fields.insert("autologin".to_string(), "on".to_string());
        fields.insert("login".to_string(), "Login".to_string());
        fields.insert("redirect".to_string(), "index.php".to_string());

        let response = self
            .post_form(&format!("{}ucp.php?mode=login", base_url), &fields)
            .await?;
        if response.status_code != 200 {
            return Err(FetchError::Login(format!(
                "received status {} from login form",
                response.status_code
            )));
        }
        info!(username, "logged in");
        Ok(())
    }
}

#[async_trait]
impl PageFetcher for ForumClient {
    async fn get(&self, url: &str) -> Result<FetchResult, FetchError> {
        self.fetch(url).await
    }
}

fn classify_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        return FetchError::Timeout;
    }
    if let Some(status) = error.status() {
        return FetchError::Status(status.as_u16());
    }
    FetchError::Network(error.to_string())
}

/// The board renders auth/permission failures inline with a 200 status.
fn parse_board_error(body: &str) -> Option<String> {
    let marker = r#"class="error">"#;
    let start = body.find(marker)? + marker.len();
    let rest = &body[start..];
    let end = rest.find('<')?;
    let message = rest[..end].trim();
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}

/// Username of the active session, read from the logout link's title.
fn logged_in_user(body: &str) -> Option<String> {
    let (_, rest) = body.split_once("ucp.php?mode=logout")?;
    let (_, rest) = rest.split_once("title=\"Logout [")?;
    let (name, _) = rest.split_once(']')?;
    Some(name.trim().to_string())
}

/// Collect the hidden inputs the board requires echoed back on form posts
/// (session id, form token, creation time).
fn hidden_inputs(page: &str) -> HashMap<String, String> {
    let doc = Html::parse_document(page);
    let sel = Selector::parse(r#"input[type="hidden"]"#).expect("Invalid CSS selector");
    doc.select(&sel)
        .filter_map(|el| {
            let name = el.value().attr("name")?;
            let value = el.value().attr("value").unwrap_or("");
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_error_is_extracted_from_inline_markup() {
        let body = r#"<div class="error">You are not authorised to read this forum.</div>"#;
        assert_eq!(
            parse_board_error(body).unwrap(),
            "You are not authorised to read this forum."
        );
        assert!(parse_board_error("<div>all fine</div>").is_none());
    }

    #[test]
    fn logged_in_user_comes_from_logout_link() {
        let body = r#"<a href="./ucp.php?mode=logout&amp;sid=abc" title="Logout [ moon ]">Logout</a>"#;
        assert_eq!(logged_in_user(body).unwrap(), "moon");
        assert!(logged_in_user("<html></html>").is_none());
    }

    #[test]
    fn hidden_inputs_are_collected_by_name() {
        let page = r#"
            <form>
              <input type="hidden" name="sid" value="abc123">
              <input type="hidden" name="form_token" value="tok">
              <input type="text" name="username" value="ignored">
            </form>"#;
        let fields = hidden_inputs(page);
        assert_eq!(fields.get("sid").unwrap(), "abc123");
        assert_eq!(fields.get("form_token").unwrap(), "tok");
        assert!(!fields.contains_key("username"));
    }

    #[test]
    fn timeout_is_retryable_but_board_errors_are_not() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Network("connection reset by peer".into()).is_retryable());
        assert!(!FetchError::Board("no access".into()).is_retryable());
        assert!(!FetchError::Status(403).is_retryable());
    }

    #[tokio::test]
    async fn client_construction_does_not_panic() {
        let _ = ForumClient::new("forum-migrate/0.3", 30, 0);
    }
}
