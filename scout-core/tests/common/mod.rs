#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use scout_core::browser::{
    BrowserError, BrowserResult, Exchange, PageSession, SessionCookie, SessionLauncher,
};

/// What a scripted page does when driven.
#[derive(Clone, Default)]
pub struct PageScript {
    pub exchanges: Vec<Exchange>,
    pub thumbnail: Option<String>,
    pub dom_sources: Vec<String>,
    pub script_matches: Vec<String>,
    pub navigation_times_out: bool,
    pub consent_selector_present: bool,
    pub cookies: Vec<SessionCookie>,
}

#[derive(Debug, Default)]
pub struct LauncherLog {
    pub opened: usize,
    pub closed: usize,
    pub navigations: Vec<String>,
    pub consent_clicks: usize,
}

#[derive(Clone)]
pub struct ScriptedLauncher {
    script: PageScript,
    pub log: Arc<Mutex<LauncherLog>>,
}

impl ScriptedLauncher {
    pub fn new(script: PageScript) -> Self {
        Self {
            script,
            log: Arc::new(Mutex::new(LauncherLog::default())),
        }
    }

    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn open(&self) -> BrowserResult<Box<dyn PageSession>> {
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(ScriptedPage {
            script: self.script.clone(),
            log: self.log.clone(),
            sender: None,
            closed: false,
        }))
    }
}

pub struct FailingLauncher;

#[async_trait]
impl SessionLauncher for FailingLauncher {
    async fn open(&self) -> BrowserResult<Box<dyn PageSession>> {
        Err(BrowserError::Launch("no chromium in test environment".into()))
    }
}

struct ScriptedPage {
    script: PageScript,
    log: Arc<Mutex<LauncherLog>>,
    sender: Option<UnboundedSender<Exchange>>,
    closed: bool,
}

#[async_trait]
impl PageSession for ScriptedPage {
    async fn subscribe(&mut self) -> BrowserResult<UnboundedReceiver<Exchange>> {
        let (sender, receiver) = unbounded_channel();
        self.sender = Some(sender);
        Ok(receiver)
    }

    async fn unsubscribe(&mut self) {
        self.sender = None;
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<()> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        if let Some(sender) = &self.sender {
            for exchange in &self.script.exchanges {
                let _ = sender.send(exchange.clone());
            }
        }
        if self.script.navigation_times_out {
            return Err(BrowserError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            });
        }
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> BrowserResult<Value> {
        if script.contains("og:image") {
            return Ok(self
                .script
                .thumbnail
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null));
        }
        if script.contains("script_matches") {
            return Ok(json!({
                "sources": self.script.dom_sources,
                "script_matches": self.script.script_matches,
            }));
        }
        Ok(Value::Bool(true))
    }

    async fn click_first(&mut self, selectors: &[String]) -> BrowserResult<Option<String>> {
        if self.script.consent_selector_present {
            self.log.lock().unwrap().consent_clicks += 1;
            return Ok(selectors.first().cloned());
        }
        Ok(None)
    }

    async fn cookies(&mut self) -> BrowserResult<Vec<SessionCookie>> {
        Ok(self.script.cookies.clone())
    }

    async fn close(&mut self) -> BrowserResult<()> {
        if !self.closed {
            self.closed = true;
            self.sender = None;
            self.log.lock().unwrap().closed += 1;
        }
        Ok(())
    }
}

pub fn exchange(url: &str, status: u16, content_type: Option<&str>, length: Option<u64>) -> Exchange {
    Exchange {
        url: url.to_string(),
        status,
        content_type: content_type.map(str::to_string),
        content_length: length,
    }
}

pub fn cookie(name: &str, value: &str) -> SessionCookie {
    SessionCookie {
        name: name.to_string(),
        value: value.to_string(),
        domain: ".youtube.com".to_string(),
        path: "/".to_string(),
        expires: None,
        secure: true,
        http_only: false,
    }
}

// ============================================================================
// Loopback fixture server
// ============================================================================

struct Fixture {
    content_type: &'static str,
    body: Vec<u8>,
}

/// Serves fixed bodies by path on a random localhost port; unknown paths 404.
pub struct FixtureServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl FixtureServer {
    pub fn builder() -> FixtureServerBuilder {
        FixtureServerBuilder::default()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

#[derive(Default)]
pub struct FixtureServerBuilder {
    fixtures: HashMap<String, Fixture>,
}

impl FixtureServerBuilder {
    pub fn file(mut self, path: &str, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        self.fixtures.insert(
            format!("/{}", path.trim_start_matches('/')),
            Fixture {
                content_type,
                body: body.into(),
            },
        );
        self
    }

    pub async fn start(self) -> FixtureServer {
        let fixtures = Arc::new(self.fixtures);
        let make = make_service_fn(move |_| {
            let fixtures = fixtures.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |request| respond(fixtures.clone(), request)))
            }
        });
        let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make);
        let addr = server.local_addr();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(server.with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        }));
        FixtureServer {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }
}

async fn respond(
    fixtures: Arc<HashMap<String, Fixture>>,
    request: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let response = match fixtures.get(request.uri().path()) {
        Some(fixture) => Response::builder()
            .header("content-type", fixture.content_type)
            .body(Body::from(fixture.body.clone())),
        None => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty()),
    };
    Ok(response.unwrap())
}
