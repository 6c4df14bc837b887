use std::io;
use std::time::Duration;

use futures::TryStreamExt;
use reqwest::header::{CONTENT_TYPE, RANGE};
use reqwest::Client;
use thiserror::Error;
use url::Url;

use super::body::ByteStream;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream responded with status {0}")]
    Status(u16),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Upstream body plus the headers delivery forwards.
pub struct FetchedBody {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

/// HTTP(S) fetcher. Any other scheme is refused before a request is made.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> FetchResult<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    pub async fn open(&self, url: &str) -> FetchResult<FetchedBody> {
        let url = remote_url(url)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        Ok(FetchedBody {
            content_type,
            content_length,
            body: Box::pin(body),
        })
    }

    /// Reads at most `limit` leading bytes with a range request. Any status
    /// below 500 is accepted.
    pub async fn fetch_prefix(&self, url: &str, limit: u64, timeout: Duration) -> FetchResult<Vec<u8>> {
        let url = remote_url(url)?;
        let request = async {
            let response = self
                .client
                .get(url)
                .header(RANGE, format!("bytes=0-{}", limit.saturating_sub(1)))
                .send()
                .await?;
            let status = response.status();
            if status.is_server_error() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let mut prefix = Vec::new();
            let mut body = Box::pin(response.bytes_stream());
            while let Some(chunk) = body.try_next().await? {
                prefix.extend_from_slice(&chunk);
                if prefix.len() as u64 >= limit {
                    break;
                }
            }
            prefix.truncate(limit as usize);
            Ok::<_, FetchError>(prefix)
        };
        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
    }
}

fn remote_url(url: &str) -> FetchResult<Url> {
    let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(parsed),
        _ => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Response, Server};

    use super::*;
    use crate::delivery::collect;

    async fn serve_once(body: &'static [u8]) -> (String, tokio::sync::oneshot::Sender<()>) {
        let make = make_service_fn(move |_| async move {
            Ok::<_, Infallible>(service_fn(move |_| async move {
                Ok::<_, Infallible>(
                    Response::builder()
                        .header("content-type", "video/mp4")
                        .body(Body::from(body))
                        .unwrap(),
                )
            }))
        });
        let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make);
        let url = format!("http://{}/clip.mp4", server.local_addr());
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(server.with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        }));
        (url, shutdown_tx)
    }

    #[tokio::test]
    async fn streams_http_bodies_and_prefixes() {
        let (url, _shutdown) = serve_once(b"remote video bytes").await;

        let fetcher = HttpFetcher::new("test-agent").unwrap();
        let fetched = fetcher.open(&url).await.unwrap();
        assert_eq!(fetched.content_type.as_deref(), Some("video/mp4"));
        assert_eq!(fetched.content_length, Some(18));
        assert_eq!(collect(fetched.body).await.unwrap(), b"remote video bytes");

        let prefix = fetcher.fetch_prefix(&url, 6, Duration::from_secs(5)).await.unwrap();
        assert_eq!(prefix, b"remote");
    }

    #[tokio::test]
    async fn refuses_local_and_unsupported_schemes() {
        let fetcher = HttpFetcher::new("test-agent").unwrap();
        for url in ["file:///etc/passwd", "ftp://host/a.mp4", "data:video/mp4,AAAA", "/etc/passwd"] {
            assert!(matches!(fetcher.open(url).await, Err(FetchError::InvalidUrl(_))), "{url}");
            assert!(
                matches!(
                    fetcher.fetch_prefix(url, 16, Duration::from_secs(1)).await,
                    Err(FetchError::InvalidUrl(_))
                ),
                "{url}"
            );
        }
        assert!(remote_url("https://cdn.example/a.mp4").is_ok());
    }
}
