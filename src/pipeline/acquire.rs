//! Image acquisition: normalise a user-supplied path or URL to a decoded bitmap.
//!
//! ## Why decode here?
//!
//! Every downstream stage works on a decoded [`DynamicImage`]; decoding at
//! the acquisition boundary means a corrupt file fails fast with an
//! [`WeightOcrError::DecodeFailed`] carrying the real cause, rather than a
//! confusing failure deep inside conditioning. Remote fetches use a bounded
//! timeout (default 10 s) so an unreachable CDN cannot block an invocation
//! indefinitely.

use crate::config::ProcessingConfig;
use crate::error::WeightOcrError;
use image::DynamicImage;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the source string looks like a remote URL.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Resolve the source string to a decoded bitmap.
///
/// Accepts a local path, a `file://` URL, or an HTTP/HTTPS URL.
pub async fn acquire_image(
    source: &str,
    config: &ProcessingConfig,
) -> Result<DynamicImage, WeightOcrError> {
    if is_url(source) {
        fetch_remote(source, config.download_timeout_secs).await
    } else {
        let path = source.strip_prefix("file://").unwrap_or(source);
        load_local(path).await
    }
}

/// Decode an in-memory byte stream (PNG/JPEG) into a bitmap.
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, WeightOcrError> {
    image::load_from_memory(bytes).map_err(|e| WeightOcrError::DecodeFailed {
        detail: e.to_string(),
    })
}

/// Load and decode a local image file.
async fn load_local(path_str: &str) -> Result<DynamicImage, WeightOcrError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(WeightOcrError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(WeightOcrError::ImageNotFound { path });
        }
    };

    debug!("loaded local image: {} ({} bytes)", path.display(), bytes.len());
    decode_bytes(&bytes)
}

/// Fetch a remote image with a bounded timeout and decode it.
async fn fetch_remote(url: &str, timeout_secs: u64) -> Result<DynamicImage, WeightOcrError> {
    info!("fetching image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| WeightOcrError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            WeightOcrError::FetchTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            WeightOcrError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(WeightOcrError::FetchStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| WeightOcrError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    debug!("fetched {} bytes from {}", bytes.len(), url);
    decode_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/label.jpg"));
        assert!(is_url("http://example.com/label.jpg"));
        assert!(!is_url("/tmp/label.jpg"));
        assert!(!is_url("file:///tmp/label.jpg"));
        assert!(!is_url(""));
    }

    #[test]
    fn decode_bytes_roundtrip() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([200, 10, 10])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let decoded = decode_bytes(&buf).unwrap();
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.height(), 6);
    }

    #[test]
    fn decode_bytes_rejects_garbage() {
        let err = decode_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, WeightOcrError::DecodeFailed { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_image_not_found() {
        let config = ProcessingConfig::default();
        let err = acquire_image("/definitely/not/here.png", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, WeightOcrError::ImageNotFound { .. }));
    }

    #[tokio::test]
    async fn file_url_prefix_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.png");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        img.save(&path).unwrap();

        let config = ProcessingConfig::default();
        let source = format!("file://{}", path.display());
        let loaded = acquire_image(&source, &config).await.unwrap();
        assert_eq!(loaded.width(), 4);
    }
}
