use std::{io, path::Path};

use reqwest::Client;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl TransferError {
    /// Local I/O problems and rejected uploads are not worth repeating.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Request(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.status().is_some_and(|status| status.is_server_error())
            }
            TransferError::Io(_) | TransferError::Url(_) => false,
        }
    }
}

/// Streams file bodies to pre-signed upload hrefs.
#[derive(Clone, Default)]
pub struct TransferClient {
    http: Client,
}

impl TransferClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http(http: Client) -> Self {
        Self { http }
    }

    pub async fn upload_from_path(&self, href: &str, source: &Path) -> Result<u64, TransferError> {
        let url = Url::parse(href)?;
        let file = tokio::fs::File::open(source).await?;
        let len = file.metadata().await?.len();
        let stream = ReaderStream::new(file);
        let body = reqwest::Body::wrap_stream(stream);
        self.http
            .put(url)
            .header(reqwest::header::CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{body_bytes, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn uploads_file_contents() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/upload"))
            .and(body_bytes(b"payload"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("in.bin");
        std::fs::write(&source, b"payload").unwrap();

        let client = TransferClient::new();
        let sent = client
            .upload_from_path(&format!("{}/upload", server.uri()), &source)
            .await
            .unwrap();
        assert_eq!(sent, 7);
    }

    #[tokio::test]
    async fn rejected_upload_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(507))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("in.bin");
        std::fs::write(&source, b"payload").unwrap();

        let err = TransferClient::new()
            .upload_from_path(&format!("{}/upload", server.uri()), &source)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Request(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn missing_source_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = TransferClient::new()
            .upload_from_path("http://127.0.0.1:9/upload", &dir.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
        assert!(!err.is_retryable());
    }
}
