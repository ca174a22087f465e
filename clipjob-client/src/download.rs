//! Artifact download

use async_trait::async_trait;
use bytes::Bytes;
use clipjob_core::source::ByteSource;
use tracing::debug;

use crate::ProviderClient;
use crate::error::{ClientError, Result};

/// Streams an HTTP response body chunk by chunk
struct HttpSource {
    response: reqwest::Response,
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        self.response.chunk().await.map_err(std::io::Error::other)
    }
}

impl ProviderClient {
    /// Open a stream over a result artifact
    ///
    /// Result URLs are pre-signed delivery links, so no credentials are sent.
    pub async fn download_artifact(&self, url: &str) -> Result<Box<dyn ByteSource>> {
        debug!("Downloading artifact from {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Download {
                status: status.as_u16(),
                message: Self::body_text(response).await,
            });
        }

        Ok(Box::new(HttpSource { response }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    async fn drain(mut source: Box<dyn ByteSource>) -> Vec<u8> {
        let mut data = Vec::new();
        while let Some(chunk) = source.next_chunk().await.unwrap() {
            data.extend_from_slice(&chunk);
        }
        data
    }

    #[tokio::test]
    async fn test_download_streams_body_without_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/files/out.mp4")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(vec![7u8; 4096])
            .create_async()
            .await;

        let client = ProviderClient::new(server.url(), "token");
        let source = client
            .download_artifact(&format!("{}/files/out.mp4", server.url()))
            .await
            .unwrap();

        assert_eq!(drain(source).await, vec![7u8; 4096]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_failure_reports_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files/gone.mp4")
            .with_status(410)
            .with_body("expired")
            .create_async()
            .await;

        let client = ProviderClient::new(server.url(), "token");
        let err = match client
            .download_artifact(&format!("{}/files/gone.mp4", server.url()))
            .await
        {
            Ok(_) => panic!("expected download error"),
            Err(err) => err,
        };

        assert!(matches!(err, ClientError::Download { status: 410, .. }));
    }
}
