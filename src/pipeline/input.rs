//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! Ingestion works on an in-memory byte buffer, so a URL is downloaded
//! straight into memory and a local file is read whole. The `%PDF` magic is
//! checked here so callers get a meaningful error rather than a pdfium one.

use crate::error::RecastError;
use std::path::PathBuf;
use tracing::{debug, info};

/// PDF bytes plus a human-readable description of where they came from.
#[derive(Debug, Clone)]
pub struct SourceBytes {
    pub origin: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Fail fast on buffers that cannot be a PDF.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), RecastError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let shown: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(RecastError::MalformedSource {
            detail: format!("missing %PDF header (found {:?})", shown),
        });
    }
    Ok(())
}

/// Resolve the input string to PDF bytes.
///
/// If the input is a URL, download it; otherwise read the local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceBytes, RecastError> {
    let source = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else if input.contains("://") {
        return Err(RecastError::InvalidInput {
            input: input.to_string(),
        });
    } else {
        read_local(input).await?
    };
    check_pdf_magic(&source.bytes)?;
    Ok(source)
}

async fn read_local(path_str: &str) -> Result<SourceBytes, RecastError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(RecastError::PermissionDenied { path });
        }
        Err(_) => return Err(RecastError::FileNotFound { path }),
    };

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceBytes {
        origin: path.display().to_string(),
        bytes,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceBytes, RecastError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RecastError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let to_error = |e: reqwest::Error| {
        if e.is_timeout() {
            RecastError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            RecastError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(to_error)?;

    if !response.status().is_success() {
        return Err(RecastError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(to_error)?;
    info!("Downloaded {} bytes", bytes.len());

    Ok(SourceBytes {
        origin: url.to_string(),
        bytes: bytes.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/path/to/doc.pdf"));
        assert!(!is_url("doc.pdf"));
    }

    #[test]
    fn magic_check() {
        assert!(check_pdf_magic(b"%PDF-1.7\n").is_ok());
        assert!(matches!(
            check_pdf_magic(b"PK\x03\x04"),
            Err(RecastError::MalformedSource { .. })
        ));
        assert!(check_pdf_magic(b"").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, RecastError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn unsupported_scheme_is_invalid() {
        let err = resolve_input("ftp://example.com/a.pdf", 5).await.unwrap_err();
        assert!(matches!(err, RecastError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_non_pdf_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, b"hello world").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RecastError::MalformedSource { .. }));
    }
}
