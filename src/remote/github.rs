// src/remote/github.rs

//! GitHub REST client for release listing and archive downloads
//!
//! Lists the repositories of one organization and turns each GitHub release
//! that carries an archive asset into a catalog [`Release`]. Listings follow
//! the `Link: rel="next"` header across pages. Transient
//! failures (connection errors, HTTP 5xx) are retried with a linear backoff;
//! client errors fail immediately.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::version::parse_tag_version;
use super::{ArchiveDownloader, ReleaseLister};
use crate::catalog::{Release, Repository};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Upper bound on pages followed for one listing
const MAX_PAGES: usize = 100;

/// Archive suffixes recognised as release payloads, in preference order
const ARCHIVE_SUFFIXES: &[&str] = &[".zip", ".tar.gz", ".tgz", ".tar.xz", ".tar.zst"];

#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<ApiAsset>,
}

#[derive(Debug, Deserialize)]
struct ApiAsset {
    name: String,
    browser_download_url: String,
}

/// GitHub-backed lister and downloader
pub struct GitHubClient {
    client: Client,
    api_url: String,
    organization: String,
    max_retries: u32,
    show_progress: bool,
}

impl GitHubClient {
    /// Create a client from the remote configuration section
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::ConfigError(format!("Invalid API token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("knxkit/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            organization: config.organization.clone(),
            max_retries: config.max_retries.max(1),
            show_progress: false,
        })
    }

    /// Draw a progress bar while downloading archives
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// GET with retry on transient failures
    async fn get_with_retry(&self, url: &str) -> std::result::Result<reqwest::Response, String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if !response.status().is_server_error() => {
                    return Err(describe_status(response.status(), url));
                }
                Ok(response) if attempt >= self.max_retries => {
                    return Err(describe_status(response.status(), url));
                }
                Ok(response) => {
                    warn!("GET {} attempt {} returned HTTP {}, retrying...", url, attempt, response.status());
                }
                Err(e) if attempt >= self.max_retries => {
                    return Err(format!("Failed to fetch {url} after {attempt} attempts: {e}"));
                }
                Err(e) => {
                    warn!("GET {} attempt {} failed: {}, retrying...", url, attempt, e);
                }
            }
            tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
        }
    }

    /// Collect a JSON array listing across all of its pages
    async fn get_paged<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        let mut pages = 0;

        while let Some(page_url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                warn!("Stopped listing {} after {} pages", url, MAX_PAGES);
                break;
            }

            let response = self
                .get_with_retry(&page_url)
                .await
                .map_err(Error::RefreshError)?;
            next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(next_page_link);

            let page: Vec<T> = response
                .json()
                .await
                .map_err(|e| Error::RefreshError(format!("Invalid JSON from {page_url}: {e}")))?;
            debug!("Page {} of {} had {} entries", pages, url, page.len());
            items.extend(page);
        }
        Ok(items)
    }

    async fn list_repositories(&self) -> Result<Vec<ApiRepository>> {
        let url = format!(
            "{}/orgs/{}/repos?per_page=100",
            self.api_url, self.organization
        );
        self.get_paged(&url).await
    }

    async fn list_repository_releases(&self, repository: &str) -> Result<Vec<ApiRelease>> {
        let url = format!(
            "{}/repos/{}/{}/releases?per_page=100",
            self.api_url, self.organization, repository
        );
        self.get_paged(&url).await
    }

    fn progress_bar(&self, total: Option<u64>, name: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = match total {
            Some(len) => {
                let pb = ProgressBar::new(len);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec}) {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb
            }
        };
        pb.set_message(name.to_string());
        Some(pb)
    }
}

fn describe_status(status: StatusCode, url: &str) -> String {
    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        format!("HTTP {status} from {url} (rate limited? configure remote.token)")
    } else {
        format!("HTTP {status} from {url}")
    }
}

/// Target of the `rel="next"` entry of a `Link` header
fn next_page_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim().strip_prefix('<')?.strip_suffix('>')?;
        parts
            .any(|param| {
                let param = param.trim().replace(' ', "");
                param == "rel=\"next\"" || param == "rel=next"
            })
            .then(|| target.to_string())
    })
}

/// Convert one API release into a catalog release, if it is usable
fn to_release(api: ApiRelease, include_prereleases: bool) -> Option<Release> {
    if api.draft || (api.prerelease && !include_prereleases) {
        return None;
    }

    let Some((major, minor, build)) = parse_tag_version(&api.tag_name) else {
        debug!("Skipping release with unversioned tag '{}'", api.tag_name);
        return None;
    };

    let asset = ARCHIVE_SUFFIXES.iter().find_map(|suffix| {
        api.assets.iter().find(|a| a.name.ends_with(suffix))
    })?;

    Some(Release {
        name: asset.name.clone(),
        url: asset.browser_download_url.clone(),
        major,
        minor,
        build,
        published: api.published_at.unwrap_or_default(),
        is_prerelease: api.prerelease,
    })
}

#[async_trait]
impl ReleaseLister for GitHubClient {
    async fn list_releases(&self, include_prereleases: bool) -> Result<Vec<Repository>> {
        let mut repositories = Vec::new();

        for api_repo in self.list_repositories().await? {
            if api_repo.archived {
                continue;
            }

            let mut releases: Vec<Release> = self
                .list_repository_releases(&api_repo.name)
                .await?
                .into_iter()
                .filter_map(|r| to_release(r, include_prereleases))
                .collect();

            if releases.is_empty() {
                debug!("Repository {} has no usable releases", api_repo.name);
                continue;
            }

            releases.sort_by(|a, b| b.published.cmp(&a.published));
            repositories.push(Repository::new(api_repo.name, releases));
        }

        info!(
            "Listed {} repositories from {}",
            repositories.len(),
            self.organization
        );
        Ok(repositories)
    }

    fn name(&self) -> &str {
        "github"
    }
}

#[async_trait]
impl ArchiveDownloader for GitHubClient {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        info!("Downloading {} to {}", url, dest.display());

        let mut response = self.get_with_retry(url).await.map_err(Error::DownloadError)?;
        let display_name = url.rsplit('/').next().unwrap_or(url);
        let progress = self.progress_bar(response.content_length(), display_name);

        let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
            Error::DownloadError(format!("Failed to create {}: {e}", dest.display()))
        })?;

        let mut downloaded: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::DownloadError(format!("Failed to read response: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::DownloadError(format!("Failed to write data: {e}")))?;
            downloaded += chunk.len() as u64;
            if let Some(pb) = &progress {
                pb.set_position(downloaded);
            }
        }
        file.flush()
            .await
            .map_err(|e| Error::DownloadError(format!("Failed to flush {}: {e}", dest.display())))?;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        debug!("Downloaded {} bytes from {}", downloaded, url);
        Ok(())
    }

    fn name(&self) -> &str {
        "github"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_release(tag: &str, prerelease: bool, assets: &[&str]) -> ApiRelease {
        ApiRelease {
            tag_name: tag.to_string(),
            draft: false,
            prerelease,
            published_at: Some(Utc::now()),
            assets: assets
                .iter()
                .map(|name| ApiAsset {
                    name: name.to_string(),
                    browser_download_url: format!("https://example/download/{name}"),
                })
                .collect(),
        }
    }

    #[test]
    fn test_release_from_zip_asset() {
        let release = to_release(api_release("v1.2.3", false, &["OGM-1.2.3.zip"]), false).unwrap();
        assert_eq!(release.name, "OGM-1.2.3.zip");
        assert_eq!(release.url, "https://example/download/OGM-1.2.3.zip");
        assert_eq!((release.major, release.minor, release.build), (1, 2, 3));
        assert!(!release.is_prerelease);
    }

    #[test]
    fn test_prerelease_filtering() {
        assert!(to_release(api_release("v2.0.0-rc1", true, &["A-2.0.0.zip"]), false).is_none());
        let release = to_release(api_release("v2.0.0-rc1", true, &["A-2.0.0.zip"]), true).unwrap();
        assert!(release.is_prerelease);
    }

    #[test]
    fn test_release_without_archive_is_skipped() {
        assert!(to_release(api_release("v1.0.0", false, &["notes.txt"]), false).is_none());
        assert!(to_release(api_release("v1.0.0", false, &[]), false).is_none());
    }

    #[test]
    fn test_zip_preferred_over_tarball() {
        let release = to_release(
            api_release("v1.0.0", false, &["A-1.0.0.tar.gz", "A-1.0.0.zip"]),
            false,
        )
        .unwrap();
        assert_eq!(release.name, "A-1.0.0.zip");
    }

    #[test]
    fn test_drafts_are_skipped() {
        let mut draft = api_release("v1.0.0", false, &["A-1.0.0.zip"]);
        draft.draft = true;
        assert!(to_release(draft, true).is_none());
    }

    #[test]
    fn test_unversioned_tag_is_skipped() {
        assert!(to_release(api_release("nightly", false, &["A.zip"]), false).is_none());
    }

    #[test]
    fn test_next_page_link() {
        let header = r#"<https://api.github.com/organizations/1/repos?per_page=100&page=2>; rel="next", <https://api.github.com/organizations/1/repos?per_page=100&page=4>; rel="last""#;
        assert_eq!(
            next_page_link(header).as_deref(),
            Some("https://api.github.com/organizations/1/repos?per_page=100&page=2")
        );
    }

    #[test]
    fn test_next_page_link_not_first_entry() {
        let header = r#"<https://api/x?page=1>; rel="prev", <https://api/x?page=3>; rel="next""#;
        assert_eq!(next_page_link(header).as_deref(), Some("https://api/x?page=3"));
    }

    #[test]
    fn test_last_page_has_no_next_link() {
        let header = r#"<https://api/x?page=1>; rel="first", <https://api/x?page=2>; rel="prev""#;
        assert!(next_page_link(header).is_none());
        assert!(next_page_link("").is_none());
        assert!(next_page_link("garbage; rel=\"next\"").is_none());
    }

    #[test]
    fn test_api_release_deserializes() {
        let json = r#"{
            "tag_name": "v1.4.0",
            "prerelease": false,
            "published_at": "2024-05-01T10:00:00Z",
            "assets": [{"name": "SEN-1.4.0.zip", "browser_download_url": "https://x/SEN-1.4.0.zip", "size": 12}]
        }"#;
        let api: ApiRelease = serde_json::from_str(json).unwrap();
        let release = to_release(api, false).unwrap();
        assert_eq!(release.version_string(), "v1.4.0");
        assert_eq!(release.published.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }
}
