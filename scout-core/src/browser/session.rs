use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use super::error::BrowserResult;

/// One completed request/response pair observed by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Unix seconds; `None` for session cookies.
    pub expires: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
}

/// A single isolated page driven by an automation backend.
///
/// `close` must be idempotent: owners call it on every exit path.
#[async_trait]
pub trait PageSession: Send {
    /// Registers the exchange observer. Records arrive in network order until
    /// `unsubscribe` or `close` drops the sending half.
    async fn subscribe(&mut self) -> BrowserResult<UnboundedReceiver<Exchange>>;

    async fn unsubscribe(&mut self);

    async fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<()>;

    async fn evaluate(&mut self, script: &str) -> BrowserResult<serde_json::Value>;

    /// Clicks the first selector that resolves to an element.
    async fn click_first(&mut self, selectors: &[String]) -> BrowserResult<Option<String>>;

    async fn cookies(&mut self) -> BrowserResult<Vec<SessionCookie>>;

    async fn close(&mut self) -> BrowserResult<()>;
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn open(&self) -> BrowserResult<Box<dyn PageSession>>;
}
