use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams as FetchEnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, EnableParams as NetworkEnableParams, ErrorReason, EventResponseReceived, Headers,
    ResourceType, Response, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::BrowserConfig;

use super::error::{BrowserError, BrowserResult};
use super::session::{Exchange, PageSession, SessionCookie, SessionLauncher};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Launches one isolated Chromium instance per session.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    config: Arc<BrowserConfig>,
    blocked: Vec<ResourceType>,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> BrowserResult<Self> {
        let blocked = config
            .blocked_resource_types
            .iter()
            .map(|value| {
                value.parse::<ResourceType>().map_err(|_| {
                    BrowserError::Configuration(format!("unknown resource type: {value}"))
                })
            })
            .collect::<BrowserResult<Vec<_>>>()?;
        Ok(Self {
            config: Arc::new(config),
            blocked,
        })
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    fn build_chromium_config(&self, profile: &TempDir) -> BrowserResult<ChromiumConfig> {
        let mut builder = ChromiumConfig::builder()
            .user_data_dir(profile.path())
            .request_timeout(self.config.request_timeout());

        if let Some(executable) = &self.config.executable_path {
            builder = builder.chrome_executable(executable);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }

        let mut args = vec![format!("--user-agent={}", self.config.user_agent)];
        args.extend(self.config.args.iter().cloned());
        args.push("--mute-audio".into());
        args.push("--password-store=basic".into());
        builder = builder.args(args);

        builder.build().map_err(BrowserError::Configuration)
    }

    async fn configure_page(&self, page: &Page) -> BrowserResult<JoinHandle<()>> {
        let params = SetUserAgentOverrideParams::builder()
            .user_agent(self.config.user_agent.clone())
            .build()
            .map_err(BrowserError::Configuration)?;
        page.set_user_agent(params).await?;
        page.execute(NetworkEnableParams::default()).await?;
        self.install_resource_blocking(page).await
    }

    /// Pauses only the blocked resource types and fails them; everything else
    /// never reaches the interception stage.
    async fn install_resource_blocking(&self, page: &Page) -> BrowserResult<JoinHandle<()>> {
        let mut paused = page.event_listener::<EventRequestPaused>().await?;
        let interceptor = page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let params =
                    FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                if let Err(err) = interceptor.execute(params).await {
                    trace!(error = %err, "failed to abort blocked request");
                }
            }
        });

        if !self.blocked.is_empty() {
            let patterns = self
                .blocked
                .iter()
                .map(|resource| {
                    RequestPattern::builder()
                        .resource_type(resource.clone())
                        .request_stage(RequestStage::Request)
                        .build()
                })
                .collect::<Vec<_>>();
            page.execute(FetchEnableParams::builder().patterns(patterns).build())
                .await?;
        }
        Ok(task)
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn open(&self) -> BrowserResult<Box<dyn PageSession>> {
        let profile = tempfile::Builder::new()
            .prefix("scout-profile-")
            .tempdir()?;
        let chromium_config = self.build_chromium_config(&profile)?;
        info!(
            ua = %self.config.user_agent,
            headless = self.config.headless,
            profile = %profile.path().display(),
            "Launching Chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        let mut session = ChromiumSession {
            browser: Some(browser),
            page: None,
            handler_task: Some(handler_task),
            interception_task: None,
            observer_task: None,
            _profile: profile,
        };

        // A half-configured browser is still torn down before the error propagates.
        let page = match session.new_page().await {
            Ok(page) => page,
            Err(err) => {
                session.close().await.ok();
                return Err(err);
            }
        };
        match self.configure_page(&page).await {
            Ok(task) => session.interception_task = Some(task),
            Err(err) => {
                session.close().await.ok();
                return Err(err);
            }
        }
        session.page = Some(page);
        Ok(Box::new(session))
    }
}

#[derive(Debug)]
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
    interception_task: Option<JoinHandle<()>>,
    observer_task: Option<JoinHandle<()>>,
    _profile: TempDir,
}

impl ChromiumSession {
    async fn new_page(&self) -> BrowserResult<Page> {
        let browser = self.browser.as_ref().ok_or(BrowserError::Closed)?;
        let params = CreateTargetParams::new("about:blank");
        Ok(browser.new_page(params).await?)
    }

    fn page(&self) -> BrowserResult<&Page> {
        self.page.as_ref().ok_or(BrowserError::Closed)
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn subscribe(&mut self) -> BrowserResult<UnboundedReceiver<Exchange>> {
        let page = self.page()?;
        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let (sender, receiver) = unbounded_channel();
        let task = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if sender.send(exchange_from_response(&event.response)).is_err() {
                    break;
                }
            }
        });
        if let Some(previous) = self.observer_task.replace(task) {
            previous.abort();
        }
        Ok(receiver)
    }

    async fn unsubscribe(&mut self) {
        if let Some(task) = self.observer_task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<()> {
        let page = self.page()?;
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        let navigation = async {
            page.goto(params).await?;
            page.wait_for_navigation().await?;
            Ok::<_, BrowserError>(())
        };
        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }

    async fn evaluate(&mut self, script: &str) -> BrowserResult<serde_json::Value> {
        self.page()?
            .evaluate(script)
            .await
            .map_err(|err| BrowserError::Script(format!("failed to evaluate script: {err}")))?
            .into_value()
            .map_err(|err| BrowserError::Script(format!("failed to decode script result: {err}")))
    }

    async fn click_first(&mut self, selectors: &[String]) -> BrowserResult<Option<String>> {
        let page = self.page()?;
        for selector in selectors {
            if let Ok(element) = page.find_element(selector.as_str()).await {
                element.click().await?;
                return Ok(Some(selector.clone()));
            }
        }
        Ok(None)
    }

    async fn cookies(&mut self) -> BrowserResult<Vec<SessionCookie>> {
        let cookies = self.page()?.get_cookies().await?;
        Ok(cookies.into_iter().map(session_cookie).collect())
    }

    async fn close(&mut self) -> BrowserResult<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        self.page = None;
        for task in [self.observer_task.take(), self.interception_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        info!("Shutting down Chromium instance");
        if let Err(err) = browser.close().await {
            warn!(error = %err, "Failed to close browser gracefully");
        }
        if let Err(err) = browser.wait().await {
            debug!(error = %err, "Failed to reap Chromium process");
        }
        if let Some(mut handle) = self.handler_task.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Err(err)) if !err.is_cancelled() => {
                    warn!(error = %err, "Browser handler join error")
                }
                Ok(_) => {}
                Err(_) => handle.abort(),
            }
        }
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            warn!("ChromiumSession dropped without explicit close");
        }
        for task in [
            self.observer_task.take(),
            self.interception_task.take(),
            self.handler_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

fn exchange_from_response(response: &Response) -> Exchange {
    let content_type = header_value(&response.headers, "content-type")
        .or_else(|| Some(response.mime_type.clone()).filter(|mime| !mime.is_empty()));
    let content_length = header_value(&response.headers, "content-length")
        .and_then(|value| value.trim().parse::<u64>().ok());
    Exchange {
        url: response.url.clone(),
        status: u16::try_from(response.status).unwrap_or(0),
        content_type,
        content_length,
    }
}

fn header_value(headers: &Headers, name: &str) -> Option<String> {
    headers
        .inner()
        .as_object()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_str().map(str::to_string))
}

fn session_cookie(cookie: Cookie) -> SessionCookie {
    let expires = if cookie.session || cookie.expires < 0.0 {
        None
    } else {
        Some(cookie.expires as i64)
    };
    SessionCookie {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        expires,
        secure: cookie.secure,
        http_only: cookie.http_only,
    }
}
