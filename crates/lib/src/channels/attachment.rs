//! Attachment download: fetch image bytes from the platform CDN URL.

use async_trait::async_trait;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Downloaded image bytes and their media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("image download failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("image download returned status {0}")]
    Status(u16),
    #[error("image download returned an empty body")]
    Empty,
}

/// Downloads attachment URLs.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// HTTP fetcher (redirects followed by reqwest's default policy).
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: FETCH_TIMEOUT,
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let res = self.client.get(url).timeout(self.timeout).send().await?;
        if !res.status().is_success() {
            return Err(FetchError::Status(res.status().as_u16()));
        }
        let mime = image_mime(
            res.headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let bytes = res.bytes().await?;
        if bytes.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            mime,
        })
    }
}

/// Media type for the data URL: the reported `image/*` type, else JPEG.
fn image_mime(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_content_type() {
        assert_eq!(image_mime(Some("image/png")), "image/png");
        assert_eq!(image_mime(Some("Image/WEBP; charset=binary")), "image/webp");
        assert_eq!(image_mime(Some("application/octet-stream")), "image/jpeg");
        assert_eq!(image_mime(None), "image/jpeg");
    }

    #[tokio::test]
    async fn unreachable_host_is_request_error() {
        let fetcher = HttpImageFetcher::new();
        let err = fetcher.fetch("http://127.0.0.1:9/x.jpg").await.unwrap_err();
        assert!(matches!(err, FetchError::Request(_)));
    }
}
