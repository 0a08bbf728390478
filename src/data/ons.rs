//! Statistics-portal download client for the vacancy series vintages.
//!
//! The portal serves the current release at `BASE_URL` and older releases at
//! `BASE_URL/previous/v{n}`, where a higher `n` is a newer vintage. There is no
//! index endpoint, so the latest vintage is found by probing downward.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::domain::VintageId;
use crate::error::FetchError;

pub const DEFAULT_BASE_URL: &str = "https://www.ons.gov.uk/generator?format=csv&uri=/employmentandlabourmarket/peopleinwork/employmentandemployeetypes/timeseries/ap2y/lms";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_PAUSE: Duration = Duration::from_millis(200);
const DOWNLOAD_PAUSE: Duration = Duration::from_millis(500);
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const ATTEMPTS: u32 = 3;

/// Which vintages to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    /// Highest vintage number to probe.
    pub probe_start: u32,
    /// Lowest vintage we are willing to call "latest".
    pub floor: u32,
    /// How many vintages before the latest to download.
    pub window: u32,
}

impl Default for FetchPlan {
    fn default() -> Self {
        Self {
            probe_start: 200,
            floor: 117,
            window: 24,
        }
    }
}

impl FetchPlan {
    /// Vintage numbers to download for a given latest vintage (inclusive range).
    pub fn range(&self, latest: u32) -> std::ops::RangeInclusive<u32> {
        latest.saturating_sub(self.window).max(1)..=latest
    }
}

/// What a fetch run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub latest: u32,
    pub downloaded: Vec<VintageId>,
    pub skipped: Vec<VintageId>,
    pub failed: Vec<VintageId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Downloaded,
    Skipped,
    Failed,
}

pub struct OnsClient {
    client: Client,
    base_url: String,
}

impl OnsClient {
    /// Build a client from `ONS_BASE_URL` / `ONS_USER_AGENT` (both optional).
    ///
    /// `.env` is loaded by the application entry point, not here.
    pub fn from_env() -> Result<Self, FetchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`OnsClient::from_env`], with settings read through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FetchError> {
        let base_url = lookup("ONS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let user_agent = lookup("ONS_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        Self::new(base_url, &user_agent)
    }

    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn vintage_url(&self, id: VintageId) -> String {
        vintage_url(&self.base_url, id)
    }

    /// Probe downward from `plan.probe_start` for the newest published vintage.
    pub fn find_latest_vintage(&self, plan: &FetchPlan) -> u32 {
        info!(start = plan.probe_start, floor = plan.floor, "detecting latest vintage");
        let latest = resolve_latest(plan.probe_start, plan.floor, |n| {
            let found = self.probe(VintageId::Numbered(n));
            if !found {
                thread::sleep(PROBE_PAUSE);
            }
            found
        });
        info!(latest, "latest vintage");
        latest
    }

    /// Download the plan's window of vintages plus the current release into `dir`.
    ///
    /// Files that already exist are left alone. A vintage that still fails after
    /// all retries is logged and reported, not fatal.
    pub fn fetch_vintages(&self, dir: &Path, plan: &FetchPlan) -> Result<FetchSummary, FetchError> {
        fs::create_dir_all(dir).map_err(|e| FetchError::Io {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;

        let latest = self.find_latest_vintage(plan);
        let range = plan.range(latest);
        info!(from = range.start(), to = range.end(), "downloading vintages");

        let mut summary = FetchSummary {
            latest,
            ..FetchSummary::default()
        };
        let ids = range
            .map(VintageId::Numbered)
            .chain(std::iter::once(VintageId::Latest));
        for id in ids {
            let bucket = match self.download(id, dir)? {
                Outcome::Downloaded => {
                    thread::sleep(DOWNLOAD_PAUSE);
                    &mut summary.downloaded
                }
                Outcome::Skipped => &mut summary.skipped,
                Outcome::Failed => &mut summary.failed,
            };
            bucket.push(id);
        }

        info!(
            downloaded = summary.downloaded.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "fetch finished"
        );
        Ok(summary)
    }

    fn probe(&self, id: VintageId) -> bool {
        let url = self.vintage_url(id);
        match self.client.get(&url).send() {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(e) => {
                debug!(%url, error = %e, "probe failed");
                false
            }
        }
    }

    fn download(&self, id: VintageId, dir: &Path) -> Result<Outcome, FetchError> {
        let path: PathBuf = dir.join(id.file_name());
        if path.exists() {
            debug!(path = %path.display(), "already exists");
            return Ok(Outcome::Skipped);
        }

        let url = self.vintage_url(id);
        let body = with_retries(ATTEMPTS, BACKOFF_BASE, thread::sleep, |attempt| {
            let result = self.get_bytes(&url);
            if let Err(e) = &result {
                warn!(vintage = %id, attempt, attempts = ATTEMPTS, error = %e, "download failed");
            }
            result
        });

        match body {
            Ok(bytes) => {
                fs::write(&path, bytes).map_err(|e| FetchError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                Ok(Outcome::Downloaded)
            }
            Err(e) => {
                warn!(vintage = %id, error = %e, "giving up");
                Ok(Outcome::Failed)
            }
        }
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.client.get(url).send().map_err(|e| FetchError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if resp.status() != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        let bytes = resp.bytes().map_err(|e| FetchError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

pub fn vintage_url(base_url: &str, id: VintageId) -> String {
    match id {
        VintageId::Numbered(n) => format!("{base_url}/previous/v{n}"),
        VintageId::Latest => base_url.to_string(),
    }
}

/// First `n` in `start, start-1, .., 1` for which `exists(n)` holds, floored at `floor`.
pub fn resolve_latest(start: u32, floor: u32, mut exists: impl FnMut(u32) -> bool) -> u32 {
    (1..=start)
        .rev()
        .find(|&n| exists(n))
        .map_or(floor, |n| n.max(floor))
}

/// Run `op` up to `attempts` times, sleeping `base · 2^i` after the i-th failure.
pub fn with_retries<T, E>(
    attempts: u32,
    base: Duration,
    mut sleep: impl FnMut(Duration),
    mut op: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= attempts => return Err(e),
            Err(_) => {
                sleep(base * 2u32.pow(attempt - 1));
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_is_the_highest_existing_vintage() {
        let mut probed = Vec::new();
        let latest = resolve_latest(200, 117, |n| {
            probed.push(n);
            n <= 152
        });
        assert_eq!(latest, 152);
        assert_eq!(probed.first(), Some(&200));
        assert_eq!(probed.len(), 49);
    }

    #[test]
    fn latest_falls_back_to_the_floor() {
        assert_eq!(resolve_latest(200, 117, |_| false), 117);
        assert_eq!(resolve_latest(200, 117, |n| n <= 90), 117);
    }

    #[test]
    fn window_is_clamped_at_one() {
        let plan = FetchPlan::default();
        assert_eq!(plan.range(152), 128..=152);
        assert_eq!(plan.range(10), 1..=10);
    }

    #[test]
    fn urls_follow_the_portal_layout() {
        assert_eq!(
            vintage_url("https://host/gen", VintageId::Numbered(130)),
            "https://host/gen/previous/v130"
        );
        assert_eq!(vintage_url("https://host/gen", VintageId::Latest), "https://host/gen");
    }

    #[test]
    fn settings_come_from_the_lookup_only() {
        let lookup = |key: &str| (key == "ONS_BASE_URL").then(|| "https://mirror/gen".to_string());
        let client = OnsClient::from_lookup(lookup).unwrap();
        assert_eq!(client.vintage_url(VintageId::Numbered(7)), "https://mirror/gen/previous/v7");

        let client = OnsClient::from_lookup(|_| None).unwrap();
        assert_eq!(client.vintage_url(VintageId::Latest), DEFAULT_BASE_URL);
    }

    #[test]
    fn retries_back_off_exponentially() {
        let mut sleeps = Vec::new();
        let result: Result<(), &str> = with_retries(3, Duration::from_secs(1), |d| sleeps.push(d), |_| Err("503"));
        assert_eq!(result, Err("503"));
        assert_eq!(sleeps, vec![Duration::from_secs(1), Duration::from_secs(2)]);

        let mut calls = 0;
        let result: Result<u32, &str> = with_retries(
            3,
            Duration::from_secs(1),
            |_| {},
            |attempt| {
                calls += 1;
                if attempt == 2 { Ok(attempt) } else { Err("timeout") }
            },
        );
        assert_eq!(result, Ok(2));
        assert_eq!(calls, 2);
    }
}
