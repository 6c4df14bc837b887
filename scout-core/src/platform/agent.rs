use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::{BrowserError, BrowserResult, PageSession, SessionCookie, SessionLauncher};
use crate::config::{BrowserConfig, PlatformSection};

/// Credentials harvested from a real browser visit, or the explicit absence of them.
///
/// Immutable once resolved; every request resolves a fresh agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthenticatedAgent {
    Unauthenticated,
    Session {
        page_url: String,
        cookies: Arc<[SessionCookie]>,
    },
}

impl AuthenticatedAgent {
    pub fn from_cookies(page_url: impl Into<String>, cookies: Vec<SessionCookie>) -> Self {
        AuthenticatedAgent::Session {
            page_url: page_url.into(),
            cookies: cookies.into(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthenticatedAgent::Session { .. })
    }

    pub fn cookies(&self) -> &[SessionCookie] {
        match self {
            AuthenticatedAgent::Unauthenticated => &[],
            AuthenticatedAgent::Session { cookies, .. } => cookies,
        }
    }

    /// Netscape cookie-jar rendering, as read by curl-style tools.
    pub fn to_netscape(&self) -> Option<String> {
        if self.cookies().is_empty() {
            return None;
        }
        let mut jar = String::from("# Netscape HTTP Cookie File\n");
        for cookie in self.cookies() {
            let domain = if cookie.http_only {
                format!("#HttpOnly_{}", cookie.domain)
            } else {
                cookie.domain.clone()
            };
            let include_subdomains = flag(cookie.domain.starts_with('.'));
            let path = if cookie.path.is_empty() { "/" } else { cookie.path.as_str() };
            let expires = cookie.expires.unwrap_or(0).max(0);
            jar.push_str(&format!(
                "{domain}\t{include_subdomains}\t{path}\t{}\t{expires}\t{}\t{}\n",
                flag(cookie.secure),
                cookie.name,
                cookie.value
            ));
        }
        Some(jar)
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Visits a page in a throwaway session to collect the cookies a real
/// visitor would hold.
pub struct AgentResolver {
    launcher: Arc<dyn SessionLauncher>,
    consent_selectors: Vec<String>,
    consent_settle: Duration,
    navigation_timeout: Duration,
}

impl AgentResolver {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        platform: &PlatformSection,
        browser: &BrowserConfig,
    ) -> Self {
        Self {
            launcher,
            consent_selectors: platform.consent_selectors.clone(),
            consent_settle: platform.consent_settle(),
            navigation_timeout: browser.navigation_timeout(),
        }
    }

    pub async fn resolve(&self, page_url: &str) -> AuthenticatedAgent {
        let mut session = match self.launcher.open().await {
            Ok(session) => session,
            Err(err) => {
                warn!(url = %page_url, error = %err, "agent session failed to launch; continuing unauthenticated");
                return AuthenticatedAgent::Unauthenticated;
            }
        };

        let acquired = self.acquire(session.as_mut(), page_url).await;
        if let Err(err) = session.close().await {
            warn!(error = %err, "failed to close agent session");
        }

        match acquired {
            Ok(agent) => agent,
            Err(err) => {
                warn!(url = %page_url, error = %err, "cookie acquisition failed; continuing unauthenticated");
                AuthenticatedAgent::Unauthenticated
            }
        }
    }

    async fn acquire(
        &self,
        session: &mut dyn PageSession,
        page_url: &str,
    ) -> BrowserResult<AuthenticatedAgent> {
        match session.navigate(page_url, self.navigation_timeout).await {
            Ok(()) => {}
            Err(BrowserError::NavigationTimeout { timeout, .. }) => {
                debug!(url = %page_url, ?timeout, "agent navigation timed out; using the page as loaded");
            }
            Err(err) => return Err(err),
        }

        match session.click_first(&self.consent_selectors).await {
            Ok(Some(selector)) => {
                debug!(%selector, "accepted consent dialog");
                tokio::time::sleep(self.consent_settle).await;
            }
            Ok(None) => debug!("no consent dialog present"),
            Err(err) => debug!(error = %err, "consent click failed"),
        }

        let cookies = session.cookies().await?;
        info!(url = %page_url, cookies = cookies.len(), "resolved platform agent");
        Ok(AuthenticatedAgent::from_cookies(page_url, cookies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, domain: &str, http_only: bool) -> SessionCookie {
        SessionCookie {
            name: name.into(),
            value: "v".into(),
            domain: domain.into(),
            path: "/".into(),
            expires: Some(1_900_000_000),
            secure: true,
            http_only,
        }
    }

    #[test]
    fn renders_netscape_jar() {
        let agent = AuthenticatedAgent::from_cookies(
            "https://www.youtube.com/watch?v=abc",
            vec![
                cookie("PREF", ".youtube.com", false),
                cookie("SID", "www.youtube.com", true),
            ],
        );
        let jar = agent.to_netscape().unwrap();
        let lines: Vec<&str> = jar.lines().collect();
        assert_eq!(lines[0], "# Netscape HTTP Cookie File");
        assert_eq!(lines[1], ".youtube.com\tTRUE\t/\tTRUE\t1900000000\tPREF\tv");
        assert_eq!(lines[2], "#HttpOnly_www.youtube.com\tFALSE\t/\tTRUE\t1900000000\tSID\tv");
    }

    #[test]
    fn unauthenticated_agent_has_no_jar() {
        assert!(AuthenticatedAgent::Unauthenticated.to_netscape().is_none());
        assert!(AuthenticatedAgent::from_cookies("https://x", Vec::new())
            .to_netscape()
            .is_none());
    }
}
