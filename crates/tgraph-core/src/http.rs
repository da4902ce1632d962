//! Shared HTTP plumbing for the Graph and token service clients.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use crate::{CoreError, Result};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Build the HTTP client shared by every API client.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("tgraph/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| CoreError::Other(format!("creating HTTP client: {e}")))
}

/// Turn a non-success response into a [`CoreError`].
///
/// 401 and 403 become [`CoreError::Unauthorized`]; everything else is
/// [`CoreError::Api`] carrying the status and body.
pub(crate) async fn error_for_response(response: Response, what: &str) -> CoreError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        CoreError::Unauthorized(format!("{what} failed: {status} - {text}"))
    } else {
        CoreError::Api(format!("{what} failed: {status} - {text}"))
    }
}

/// Send a request, mapping transport failures to [`CoreError::Api`].
pub(crate) async fn send(request: reqwest::RequestBuilder, what: &str) -> Result<Response> {
    request
        .send()
        .await
        .map_err(|e| CoreError::Api(format!("{what} request failed: {e}")))
}

/// Parse a successful JSON response body.
///
/// A body that cannot be read is [`CoreError::Api`]; one that is not the
/// expected JSON is [`CoreError::Serialization`].
pub(crate) async fn json<T>(response: Response, what: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let body = response
        .bytes()
        .await
        .map_err(|e| CoreError::Api(format!("reading {what} response: {e}")))?;
    serde_json::from_slice(&body)
        .map_err(|e| CoreError::Serialization(format!("parsing {what} response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned raw HTTP response, then close the connection.
    async fn serve_once(raw: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = [0_u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(raw.as_bytes()).await.expect("write");
            socket.shutdown().await.expect("shutdown");
        });
        format!("http://{addr}/")
    }

    async fn fetch_json(raw: &'static str) -> Result<serde_json::Value> {
        let url = serve_once(raw).await;
        let client = build_client(5).expect("client");
        let response = send(client.get(url), "test").await?;
        json(response, "test").await
    }

    #[tokio::test]
    async fn truncated_body_is_an_api_error() {
        let err = fetch_json(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"id\":",
        )
        .await
        .expect_err("truncated body");
        assert!(matches!(err, CoreError::Api(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn malformed_json_is_a_serialization_error() {
        let err = fetch_json(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 8\r\n\r\nnot json",
        )
        .await
        .expect_err("bad json");
        assert!(matches!(err, CoreError::Serialization(_)), "got {err:?}");
    }
}
