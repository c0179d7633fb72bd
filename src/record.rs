use crate::error::SamplerError;
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Revision {
    pub revid: u64,
    pub timestamp: String, // ISO 8601
}

/// Result of one batch lookup: accepted revisions keyed by id, plus the ids the API rejected.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RevisionBatch {
    pub revisions: BTreeMap<u64, String>,
    pub bad_revids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<Q> {
    query: Option<Q>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct PageRevisions {
    #[serde(default)]
    revisions: Vec<Revision>,
}

#[derive(Debug, Deserialize)]
struct AllRevisionsQuery {
    allrevisions: Vec<PageRevisions>,
}

#[derive(Debug, Deserialize)]
struct RevisionsQuery {
    #[serde(default)]
    badrevids: BTreeMap<u64, IgnoredAny>,
    pages: Option<HashMap<String, PageRevisions>>,
}

impl<Q> ApiResponse<Q> {
    fn into_query(self) -> Result<Q, SamplerError> {
        if let Some(error) = self.error {
            return Err(SamplerError::Api {
                code: error.code,
                info: error.info,
            });
        }
        self.query
            .ok_or_else(|| SamplerError::Malformed("missing 'query' section".to_string()))
    }
}

/// Extract the single newest revision id from an `list=allrevisions` response.
pub fn max_revision_from_json(body: &str) -> Result<u64, SamplerError> {
    let response: ApiResponse<AllRevisionsQuery> = serde_json::from_str(body)?;
    let revisions: Vec<Revision> = response
        .into_query()?
        .allrevisions
        .into_iter()
        .flat_map(|page| page.revisions)
        .collect();

    match revisions.as_slice() {
        [revision] => Ok(revision.revid),
        _ => Err(SamplerError::Malformed(format!(
            "expected exactly one revision, found {}",
            revisions.len()
        ))),
    }
}

impl RevisionBatch {
    /// Decode a `prop=revisions&revids=...` response for the `requested` ids.
    ///
    /// A response without a `pages` section means none of the requested ids exist,
    /// so all of them are reported as bad.
    pub fn from_json(body: &str, requested: &[u64]) -> Result<Self, SamplerError> {
        let response: ApiResponse<RevisionsQuery> = serde_json::from_str(body)?;
        let query = response.into_query()?;

        let mut bad_revids: Vec<u64> = query.badrevids.into_keys().collect();

        let Some(pages) = query.pages else {
            for revid in requested {
                if !bad_revids.contains(revid) {
                    bad_revids.push(*revid);
                }
            }
            return Ok(Self {
                revisions: BTreeMap::new(),
                bad_revids,
            });
        };

        let revisions = pages
            .into_values()
            .flat_map(|page| page.revisions)
            .map(|revision| (revision.revid, revision.timestamp))
            .collect();

        Ok(Self {
            revisions,
            bad_revids,
        })
    }
}
