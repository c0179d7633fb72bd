use crate::error::SamplerError;
use crate::record::{RevisionBatch, max_revision_from_json};
use log::{debug, error, info, warn};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;
use tokio::time::sleep;

/// Distance between two sampled revision ids.
pub const REVISION_STEP: u64 = 10_000_000;
/// Maximum number of revision ids per API request.
pub const BATCH_SIZE: usize = 10;

const USER_AGENT: &str = concat!(
    "rev-sampler/",
    env!("CARGO_PKG_VERSION"),
    " (ops-dumps@wikimedia.org)"
);

/// Candidate ids `start, start + step, ...` strictly below `end`.
pub fn sample_ids(start: u64, end: u64, step: u64) -> Vec<u64> {
    (start..end).step_by(step as usize).collect()
}

/// Ids to try on the next retry pass: each bad id's successor.
pub fn next_candidates(bad_revids: &[u64]) -> Vec<u64> {
    bad_revids
        .iter()
        .filter_map(|revid| {
            let next = revid.checked_add(1);
            if next.is_none() {
                warn!("Dropping bad revision id {} with no successor", revid);
            }
            next
        })
        .collect()
}

/// Write one `<revid> <timestamp>` line per revision, ascending by id.
pub fn display_revisions<W: Write>(
    out: &mut W,
    revisions: &BTreeMap<u64, String>,
) -> std::io::Result<usize> {
    for (revid, timestamp) in revisions {
        writeln!(out, "{} {}", revid, timestamp)?;
    }
    out.flush()?;
    Ok(revisions.len())
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SampleSummary {
    pub printed: usize,
    pub retry_passes: u32,
    pub failed_batches: usize,
    pub abandoned: Vec<u64>,
}

#[derive(Debug, Default)]
struct PassOutcome {
    printed: usize,
    failed_batches: usize,
    bad_revids: Vec<u64>,
}

pub struct RevisionSampler {
    client: Client,
    api_url: Url,
    pub(crate) base_delay: Duration,
    pub(crate) max_retry_passes: Option<u32>,
    pub(crate) dry_run: bool,
}

impl RevisionSampler {
    pub fn new(domain: &str) -> Result<Self, SamplerError> {
        let api_url = Url::parse(&format!("https://{}/w/api.php", domain))
            .map_err(|e| SamplerError::InvalidUrl(format!("{}: {}", domain, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_url,
            base_delay: Duration::from_secs(5),
            max_retry_passes: None,
            dry_run: false,
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_retry_passes(mut self, passes: Option<u32>) -> Self {
        self.max_retry_passes = passes;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Point the sampler at a different `api.php` endpoint.
    #[cfg(test)]
    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.api_url = api_url;
        self
    }

    fn query_url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.api_url.clone();
        url.query_pairs_mut().extend_pairs(params);
        url
    }

    pub fn max_revision_url(&self) -> Url {
        self.query_url(&[
            ("action", "query"),
            ("list", "allrevisions"),
            ("arvlimit", "1"),
            ("arvdir", "older"),
            ("format", "json"),
        ])
    }

    pub fn revisions_url(&self, revids: &[u64]) -> Url {
        let revids = revids
            .iter()
            .map(|revid| revid.to_string())
            .collect::<Vec<_>>()
            .join("|");
        self.query_url(&[
            ("action", "query"),
            ("prop", "revisions"),
            ("revids", &revids),
            ("rvprop", "ids|timestamp"),
            ("format", "json"),
        ])
    }

    async fn fetch(&self, url: Url) -> Result<String, SamplerError> {
        debug!("Requesting url: {}", url);
        let response = self.client.get(url.clone()).send().await?;
        if response.status() != StatusCode::OK {
            return Err(SamplerError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        Ok(response.text().await?)
    }

    /// Look up the newest revision id of the wiki.
    pub async fn get_max_revision(&self) -> Result<u64, SamplerError> {
        let body = self.fetch(self.max_revision_url()).await?;
        max_revision_from_json(&body)
    }

    /// Look up ids and timestamps for one batch of at most `BATCH_SIZE` revision ids.
    pub async fn get_revisions(&self, revids: &[u64]) -> Result<RevisionBatch, SamplerError> {
        let body = self.fetch(self.revisions_url(revids)).await?;
        RevisionBatch::from_json(&body, revids)
    }

    async fn pause(&self) {
        if !self.dry_run && !self.base_delay.is_zero() {
            sleep(self.base_delay).await;
        }
    }

    /// Run every batch of `revids` once, printing accepted revisions as each batch completes.
    async fn sample_pass<W: Write>(
        &self,
        revids: &[u64],
        out: &mut W,
    ) -> Result<PassOutcome, SamplerError> {
        let mut outcome = PassOutcome::default();
        let batches: Vec<&[u64]> = revids.chunks(BATCH_SIZE).collect();

        for (index, batch) in batches.iter().enumerate() {
            if self.dry_run {
                writeln!(out, "GET {}", self.revisions_url(batch))?;
                continue;
            }

            match self.get_revisions(batch).await {
                Ok(result) => {
                    outcome.printed += display_revisions(out, &result.revisions)?;
                    if !result.bad_revids.is_empty() {
                        info!("Bad revision ids in batch: {:?}", result.bad_revids);
                    }
                    outcome.bad_revids.extend(result.bad_revids);
                }
                Err(e) => {
                    error!("Failed to get revisions {:?}: {}", batch, e);
                    outcome.failed_batches += 1;
                }
            }

            if index + 1 < batches.len() {
                self.pause().await;
            }
        }

        Ok(outcome)
    }

    /// Sample every `REVISION_STEP`th revision in `start_rev..end_rev`, then keep
    /// retrying the successors of bad ids until a pass comes back clean.
    pub async fn sample_range<W: Write>(
        &self,
        start_rev: u64,
        end_rev: u64,
        out: &mut W,
    ) -> Result<SampleSummary, SamplerError> {
        let mut summary = SampleSummary::default();
        let mut candidates = sample_ids(start_rev, end_rev, REVISION_STEP);
        info!(
            "Sampling {} revision ids between {} and {}",
            candidates.len(),
            start_rev,
            end_rev
        );

        loop {
            let outcome = self.sample_pass(&candidates, out).await?;
            summary.printed += outcome.printed;
            summary.failed_batches += outcome.failed_batches;

            if outcome.bad_revids.is_empty() {
                break;
            }
            if let Some(max) = self.max_retry_passes {
                if summary.retry_passes >= max {
                    warn!(
                        "Giving up on {} bad revision ids after {} retry passes: {:?}",
                        outcome.bad_revids.len(),
                        summary.retry_passes,
                        outcome.bad_revids
                    );
                    summary.abandoned = outcome.bad_revids;
                    break;
                }
            }

            self.pause().await;
            candidates = next_candidates(&outcome.bad_revids);
            summary.retry_passes += 1;
            info!(
                "Retry pass {} over {} revision ids",
                summary.retry_passes,
                candidates.len()
            );
        }

        Ok(summary)
    }
}
