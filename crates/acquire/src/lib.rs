//! Downloads judgment PDFs from a case-law listing site.
//!
//! Listing pages link each case from `tr > td > div > a`; every case page offers an
//! anchor labelled "Download PDF". Nothing here is shared with the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};
use url::Url;

pub const CASE_LINK_SELECTOR: &str = "tr > td > div > a";
pub const PDF_LINK_TEXT: &str = "Download PDF";

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid selector {selector}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    pub cases_dir: PathBuf,
    pub request_timeout_secs: u64,
    /// Pause between case pages
    pub request_delay_ms: u64,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            cases_dir: PathBuf::from("cases"),
            request_timeout_secs: 60,
            request_delay_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseLink {
    pub title: String,
    pub url: Url,
}

#[derive(Debug, Default)]
pub struct AcquireSummary {
    pub downloaded: Vec<PathBuf>,
    /// Case titles whose page had no PDF link
    pub missing_pdf: Vec<String>,
    /// (case title, error) for cases that failed; the run carries on past them
    pub failed: Vec<(String, String)>,
}

pub struct CaseScraper {
    client: reqwest::Client,
    cases_dir: PathBuf,
    delay: Duration,
}

impl CaseScraper {
    pub fn new(config: &AcquireConfig) -> Result<Self, AcquireError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            cases_dir: config.cases_dir.clone(),
            delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    /// Download every case PDF reachable from `listing_url`. A failing case is
    /// logged and recorded, never fatal for the others.
    pub async fn run(&self, listing_url: &str) -> Result<AcquireSummary, AcquireError> {
        let listing = Url::parse(listing_url)?;
        let cases = self.scrape_listing(&listing).await?;
        info!(listing = %listing, cases = cases.len(), "Found cases");

        let mut summary = AcquireSummary::default();

        for (i, case) in cases.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.fetch_case(case).await {
                Ok(Some(path)) => summary.downloaded.push(path),
                Ok(None) => {
                    warn!(title = %case.title, url = %case.url, "No PDF found");
                    summary.missing_pdf.push(case.title.clone());
                }
                Err(e) => {
                    warn!(title = %case.title, url = %case.url, error = %e, "Case download failed");
                    summary.failed.push((case.title.clone(), e.to_string()));
                }
            }
        }

        Ok(summary)
    }

    pub async fn scrape_listing(&self, listing: &Url) -> Result<Vec<CaseLink>, AcquireError> {
        let html = self.get_text(listing).await?;
        parse_case_links(&html, listing)
    }

    async fn fetch_case(&self, case: &CaseLink) -> Result<Option<PathBuf>, AcquireError> {
        let html = self.get_text(&case.url).await?;
        let Some(pdf_url) = parse_pdf_link(&html, &case.url)? else {
            return Ok(None);
        };
        self.download(&case.title, &pdf_url).await.map(Some)
    }

    pub async fn download(&self, title: &str, pdf_url: &Url) -> Result<PathBuf, AcquireError> {
        let response = self.client.get(pdf_url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::Status {
                url: pdf_url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;

        let path = self.cases_dir.join(format!("{}.pdf", safe_slug(title)));
        write_atomic(&path, &bytes).await?;

        info!(path = %path.display(), bytes = bytes.len(), "Downloaded");
        Ok(path)
    }

    async fn get_text(&self, url: &Url) -> Result<String, AcquireError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Case title and absolute URL for every case link on a listing page
pub fn parse_case_links(html: &str, base: &Url) -> Result<Vec<CaseLink>, AcquireError> {
    let soup = scrape_core::Soup::parse(html);
    let tags = soup
        .find_all(CASE_LINK_SELECTOR)
        .map_err(|e| AcquireError::Selector {
            selector: CASE_LINK_SELECTOR.to_string(),
            reason: e.to_string(),
        })?;

    let mut links = Vec::new();
    for tag in tags {
        let title = tag.text().trim().to_string();
        let Some(href) = tag.get("href") else {
            continue;
        };
        if title.is_empty() {
            continue;
        }
        links.push(CaseLink {
            title,
            url: base.join(href)?,
        });
    }

    Ok(links)
}

/// Absolute URL of the "Download PDF" anchor on a case page, if any
pub fn parse_pdf_link(html: &str, base: &Url) -> Result<Option<Url>, AcquireError> {
    let soup = scrape_core::Soup::parse(html);
    let anchors = soup.find_all("a").map_err(|e| AcquireError::Selector {
        selector: "a".to_string(),
        reason: e.to_string(),
    })?;

    for anchor in anchors {
        if anchor.text().trim() != PDF_LINK_TEXT {
            continue;
        }
        if let Some(href) = anchor.get("href") {
            return Ok(Some(base.join(href)?));
        }
    }

    Ok(None)
}

/// File name for a case title: spaces become `_`, path separators become `-`
pub fn safe_slug(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' => '-',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AcquireError> {
    let io_err = |source| AcquireError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let staging = path.with_extension("pdf.part");
    fs::write(&staging, bytes).await.map_err(io_err)?;
    fs::rename(&staging, path).await.map_err(io_err)?;
    Ok(())
}
