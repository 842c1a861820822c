//! Shareable-link media download.

use crate::timeouts::secs;
use crate::{PilotError, Result};
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub const DRIVE_DOWNLOAD_URL: &str = "https://drive.google.com/uc";

static FILE_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:drive\.google\.com/file/d/|drive\.google\.com/open\?id=)([a-zA-Z0-9_-]+)",
        r"id=([a-zA-Z0-9_-]+)",
        r"/d/([a-zA-Z0-9_-]+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static CONFIRM_TOKEN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"confirm=([^&"']+)"#).ok());

static DISPOSITION_FILENAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"filename="?([^"]+)"?"#).ok());

/// Resolves a remote media location to a readable local file.
#[async_trait::async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<PathBuf>;

    /// Removes a file returned by `fetch` once the run no longer needs it.
    /// Best-effort: failures are logged, never returned.
    async fn discard(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), "Could not remove downloaded media: {}", e);
        }
    }
}

/// True when `media` parses as an http(s) URL rather than a local path.
pub fn is_remote(media: &str) -> bool {
    url::Url::parse(media)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

pub fn extract_file_id(share_url: &str) -> Result<String> {
    FILE_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(share_url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| PilotError::Transfer {
            message: format!("Could not extract file ID from URL: {}", share_url),
            source: None,
        })
}

/// Picks the name for a downloaded file: the Content-Disposition filename,
/// else the file id with an extension derived from the Content-Type.
pub fn file_name_for(
    file_id: &str,
    content_disposition: Option<&str>,
    content_type: Option<&str>,
) -> String {
    let from_disposition = content_disposition
        .zip(DISPOSITION_FILENAME.as_ref())
        .and_then(|(value, re)| re.captures(value))
        .and_then(|caps| caps.get(1))
        .and_then(|m| {
            Path::new(m.as_str().trim())
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .filter(|n| !n.is_empty());

    if let Some(name) = from_disposition {
        return name;
    }

    let content_type = content_type.unwrap_or_default();
    let extension = [
        ("image/jpeg", "jpg"),
        ("image/png", "png"),
        ("image/gif", "gif"),
        ("video/mp4", "mp4"),
    ]
    .iter()
    .find(|(mime, _)| content_type.contains(mime))
    .map(|(_, ext)| *ext);

    match extension {
        Some(ext) => format!("{}.{}", file_id, ext),
        None => file_id.to_string(),
    }
}

fn confirm_token(body: &str) -> Option<String> {
    let re = CONFIRM_TOKEN.as_ref()?;
    body.lines()
        .filter(|line| line.contains("confirm="))
        .find_map(|line| re.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn header_str<'a>(response: &'a reqwest::Response, name: reqwest::header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Downloads files behind Google Drive sharing links.
#[derive(Debug, Clone)]
pub struct DriveDownloader {
    client: reqwest::Client,
    download_url: String,
    target_dir: Option<PathBuf>,
}

impl DriveDownloader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(secs::REQUEST))
            .user_agent(concat!("postpilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PilotError::transfer("Could not build HTTP client", e))?;

        Ok(Self {
            client,
            download_url: DRIVE_DOWNLOAD_URL.to_string(),
            target_dir: None,
        })
    }

    /// Overrides the direct-download endpoint.
    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = url.into();
        self
    }

    /// Saves into `dir` instead of a fresh temporary directory.
    pub fn with_target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }

    pub fn direct_url(&self, file_id: &str) -> String {
        format!("{}?export=download&id={}", self.download_url, file_id)
    }

    pub async fn download(&self, share_url: &str) -> Result<PathBuf> {
        let file_id = extract_file_id(share_url)?;
        let download_url = self.direct_url(&file_id);
        tracing::info!(file_id = %file_id, "Downloading shared media");

        let mut response = self.get(&download_url).await?;

        let is_page = header_str(&response, reqwest::header::CONTENT_TYPE)
            .is_some_and(|ct| ct.contains("text/html"));
        if is_page {
            let body = response
                .text()
                .await
                .map_err(|e| PilotError::transfer("Could not read response body", e))?;

            let warning = body.contains("confirm=") || body.to_lowercase().contains("virus scan warning");
            let token = if warning { confirm_token(&body) } else { None };

            match token {
                Some(token) => {
                    tracing::debug!("Following large-file confirmation");
                    response = self
                        .get(&format!("{}&confirm={}", download_url, token))
                        .await?;
                }
                None => {
                    return Err(PilotError::Transfer {
                        message: "Link returned a web page instead of a file".into(),
                        source: None,
                    });
                }
            }
        }

        let response = response
            .error_for_status()
            .map_err(|e| PilotError::transfer("Server rejected the download", e))?;

        let file_name = file_name_for(
            &file_id,
            header_str(&response, reqwest::header::CONTENT_DISPOSITION),
            header_str(&response, reqwest::header::CONTENT_TYPE),
        );

        let dir = match &self.target_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir()
                .join("postpilot-downloads")
                .join(uuid::Uuid::new_v4().to_string()),
        };
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(file_name);

        let written = write_body(response, &path).await?;
        if written == 0 {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(PilotError::Transfer {
                message: "File download failed or file is empty".into(),
                source: None,
            });
        }

        tracing::info!(path = %path.display(), bytes = written, "Download complete");
        Ok(path)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| PilotError::transfer("Request failed", e))
    }
}

async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PilotError::transfer("Connection dropped mid-download", e))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

#[async_trait::async_trait]
impl MediaSource for DriveDownloader {
    async fn fetch(&self, location: &str) -> Result<PathBuf> {
        self.download(location).await
    }

    /// Drops the per-download directory, or only the file when saving into a
    /// caller-chosen directory.
    async fn discard(&self, path: &Path) {
        let result = match (&self.target_dir, path.parent()) {
            (None, Some(dir)) => tokio::fs::remove_dir_all(dir).await,
            _ => tokio::fs::remove_file(path).await,
        };
        match result {
            Ok(()) => tracing::debug!(path = %path.display(), "Downloaded media removed"),
            Err(e) => tracing::warn!(
                path = %path.display(),
                "Could not remove downloaded media: {}",
                e
            ),
        }
    }
}
