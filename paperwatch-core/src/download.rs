//! Concurrent, resilient PDF retrieval.
//!
//! One organization's bucket is materialized to disk by a bounded worker
//! pool. Each entry is handled in isolation: an existing file satisfies
//! the download without a network call, candidate URLs are tried in order
//! (versioned identifier first, then unversioned), and any failure is
//! recorded and contained - one entry never aborts a sibling or the batch.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Result};
use crate::feed::{Entry, split_version};

/// Collapse anything outside `[A-Za-z0-9._-]` to `_`, bounded to 160
/// chars. Old-style identifiers carry a slash, so this is what keeps one
/// download one path component.
pub fn safe_filename(name: &str) -> String {
    static SAFE_NAME: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]+").expect("literal character class"));
    let spaced = name.trim().replace(' ', "_");
    SAFE_NAME.replace_all(&spaced, "_").chars().take(160).collect()
}

/// Ordered candidate URLs for one identifier: the full (possibly
/// versioned) form first, then the unversioned form when a version suffix
/// is present.
pub fn candidate_urls(base_url: &str, short_id: &str) -> Vec<String> {
    let base_url = base_url.trim_end_matches('/');
    let mut urls = vec![format!("{base_url}/{short_id}.pdf")];
    let (base, version) = split_version(short_id);
    if version.is_some() && !base.is_empty() {
        urls.push(format!("{base_url}/{base}.pdf"));
    }
    urls
}

/// Downloads one organization's entries into its output directory.
pub struct Downloader {
    http: reqwest::Client,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(http: reqwest::Client, config: DownloadConfig) -> Self {
        Self { http, config }
    }

    /// Download PDFs for one organization's bucket.
    ///
    /// Applies the per-organization cap, then dispatches one task per
    /// entry onto a pool bounded by the configured concurrency. Returned
    /// paths are in task completion order. In dry-run mode nothing is
    /// fetched or written and the result is empty.
    pub async fn download_for_org(
        &self,
        org: &str,
        entries: &[Entry],
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let capped = match self.config.limit_per_org {
            Some(limit) => &entries[..entries.len().min(limit)],
            None => entries,
        };

        if self.config.dry_run {
            for entry in capped {
                info!(
                    org = %org,
                    id = %entry.id,
                    out_dir = %out_dir.display(),
                    "dry-run: would download"
                );
            }
            return Ok(Vec::new());
        }

        tokio::fs::create_dir_all(out_dir).await?;

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();

        for entry in capped.iter().cloned() {
            let semaphore = semaphore.clone();
            let http = self.http.clone();
            let base_url = self.config.pdf_base_url.clone();
            let out_dir = out_dir.to_path_buf();

            tasks.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore is never closed");
                download_one(&http, &base_url, &entry, &out_dir).await
            });
        }

        let mut files = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(path)) => files.push(path),
                Ok(None) => {}
                Err(e) => warn!(org = %org, error = %e, "download task panicked"),
            }
        }
        Ok(files)
    }
}

/// One entry: idempotent skip, then candidates in order. 404 advances to
/// the next candidate; any other failure abandons the entry. Returns
/// `None` when every candidate failed - the failure is logged here so the
/// batch keeps going.
async fn download_one(
    http: &reqwest::Client,
    base_url: &str,
    entry: &Entry,
    out_dir: &Path,
) -> Option<PathBuf> {
    let short_id = entry.short_id();
    let path = out_dir.join(safe_filename(&format!("{short_id}.pdf")));

    if path.exists() {
        debug!(short_id = %short_id, "already on disk, skipping");
        return Some(path);
    }

    let mut last_error = None;
    for url in candidate_urls(base_url, &short_id) {
        match fetch_candidate(http, &url, &path).await {
            Ok(()) => {
                debug!(short_id = %short_id, url = %url, "downloaded");
                return Some(path);
            }
            Err(e @ DownloadError::NotFound { .. }) => {
                last_error = Some(e);
            }
            Err(e) => {
                last_error = Some(e);
                break;
            }
        }
    }

    match last_error {
        Some(e) => warn!(short_id = %short_id, error = %e, "download failed"),
        None => warn!(short_id = %short_id, "no candidate urls"),
    }
    None
}

async fn fetch_candidate(
    http: &reqwest::Client,
    url: &str,
    path: &Path,
) -> std::result::Result<(), DownloadError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| DownloadError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(DownloadError::NotFound {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(|e| DownloadError::Network {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    tokio::fs::write(path, &body)
        .await
        .map_err(|e| DownloadError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────
