//! Network access to forecast batches.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::config::PipelineConfig;
use crate::error::FetchError;

/// URL of batch `batch_number`: the number zero-padded to three digits as
/// the last path segment.
pub fn batch_url(base_url: &str, batch_number: u32) -> String {
    format!("{}/data/{:03}", base_url.trim_end_matches('/'), batch_number)
}

/// Anything that can produce the raw payload text of a batch.
#[async_trait]
pub trait BatchSource: Send + Sync {
    async fn fetch_batch(&self, batch_number: u32) -> Result<String, FetchError>;
}

/// [`BatchSource`] over HTTP.
pub struct HttpBatchSource {
    client: Client,
    base_url: String,
    max_payload_bytes: usize,
}

impl HttpBatchSource {
    pub fn new(config: &PipelineConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true);

        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.clone(),
            max_payload_bytes: config.max_payload_bytes(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl BatchSource for HttpBatchSource {
    #[instrument(skip(self))]
    async fn fetch_batch(&self, batch_number: u32) -> Result<String, FetchError> {
        let url = batch_url(&self.base_url, batch_number);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let declared_too_large = response.content_length().is_some_and(|len| {
            usize::try_from(len).map_or(true, |len| len > self.max_payload_bytes)
        });
        if declared_too_large {
            return Err(FetchError::TooLarge {
                url,
                limit: self.max_payload_bytes,
            });
        }

        let capacity = response
            .content_length()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0);
        let mut body = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > self.max_payload_bytes {
                return Err(FetchError::TooLarge {
                    url,
                    limit: self.max_payload_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(batch = batch_number, bytes = body.len(), "Fetched batch");
        String::from_utf8(body).map_err(|_| FetchError::Encoding { url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a loopback port and return its base URL.
    async fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            // The client may hang up early on oversized bodies.
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    fn source(base_url: String, max_payload_bytes: usize) -> HttpBatchSource {
        HttpBatchSource {
            client: Client::builder().no_proxy().build().unwrap(),
            base_url,
            max_payload_bytes,
        }
    }

    fn response(head: &str, body: &[u8]) -> Vec<u8> {
        let mut bytes = format!("HTTP/1.1 {head}\r\nConnection: close\r\n\r\n").into_bytes();
        bytes.extend_from_slice(body);
        bytes
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let body = br#"{"ok": true}"#;
        let head = format!("200 OK\r\nContent-Length: {}", body.len());
        let url = serve_once(response(&head, body)).await;

        let text = source(url, 1024).fetch_batch(1).await.unwrap();
        assert_eq!(text, r#"{"ok": true}"#);
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_is_rejected() {
        let url = serve_once(response("200 OK\r\nContent-Length: 64", &[b'a'; 64])).await;

        let err = source(url, 16).fetch_batch(1).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 16, .. }), "{err}");
    }

    #[tokio::test]
    async fn test_chunked_body_over_limit_is_rejected() {
        let mut body = Vec::new();
        for _ in 0..2 {
            body.extend_from_slice(b"10\r\n");
            body.extend_from_slice(&[b'x'; 16]);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(b"0\r\n\r\n");
        let url = serve_once(response("200 OK\r\nTransfer-Encoding: chunked", &body)).await;

        let err = source(url, 20).fetch_batch(1).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 20, .. }), "{err}");
    }

    #[tokio::test]
    async fn test_non_utf8_body_is_an_encoding_error() {
        let url = serve_once(response("200 OK\r\nContent-Length: 2", &[0xff, 0xfe])).await;

        let err = source(url, 1024).fetch_batch(1).await.unwrap_err();
        assert!(matches!(err, FetchError::Encoding { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let url = serve_once(response("404 Not Found\r\nContent-Length: 0", b"")).await;

        let err = source(url.clone(), 1024).fetch_batch(3).await.unwrap_err();
        match err {
            FetchError::Status { url: failed, status } => {
                assert_eq!(status, 404);
                assert_eq!(failed, format!("{url}/data/003"));
            }
            other => panic!("expected a status error, got {other}"),
        }
    }

    #[test]
    fn test_batch_url_is_zero_padded() {
        assert_eq!(batch_url("http://wx/api", 1), "http://wx/api/data/001");
        assert_eq!(batch_url("http://wx/api/", 42), "http://wx/api/data/042");
        assert_eq!(batch_url("http://wx", 123), "http://wx/data/123");
    }

    #[test]
    fn test_client_builds_without_timeout() {
        let source = HttpBatchSource::new(&PipelineConfig::default()).unwrap();
        assert_eq!(source.base_url(), "http://localhost:8000");
    }
}
