//! Settings sanitization: turns untrusted keyword/URL/weight input into
//! validated [`RedirectList`]s, or reports why it could not.

use std::collections::HashSet;

use crate::validate::{coerce_weight, validate_destination_url};
use crate::{CoreError, Entry, Keyword, RawList, RawWeight, RedirectList};

/// Keywords equal to or nested under this segment are taken by the admin API
/// and can never be stored.
pub const RESERVED_SEGMENT: &str = "api";

/// Normalize a raw keyword: trim whitespace, strip leading/trailing `/`,
/// collapse runs of `/`, then validate the result.
pub fn sanitize_keyword(raw: &str) -> Result<Keyword, CoreError> {
    let stripped = raw.trim().trim_matches('/');
    let mut collapsed = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        if c == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(c);
    }
    Keyword::new(collapsed).map_err(|_| CoreError::InvalidKeyword(raw.to_string()))
}

/// Keep the trimmed, non-empty entries that are well-formed absolute URLs,
/// in their original order. Duplicates are kept.
pub fn sanitize_urls<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .filter(|s| match validate_destination_url(s) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(err = %e, "url dropped");
                false
            }
        })
        .map(str::to_string)
        .collect()
}

/// Coerce each weight to a non-negative float, then truncate or zero-pad to
/// exactly `target_len` values.
pub fn sanitize_weights(raw: &[RawWeight], target_len: usize) -> Vec<f64> {
    let mut weights: Vec<f64> = raw.iter().take(target_len).map(coerce_weight).collect();
    weights.resize(target_len, 0.0);
    weights
}

/// Combine URL and weight sanitization into a list for `keyword`.
pub fn build_list<S: AsRef<str>>(
    keyword: Keyword,
    raw_urls: &[S],
    raw_weights: &[RawWeight],
    enabled: bool,
) -> Result<RedirectList, CoreError> {
    let urls = sanitize_urls(raw_urls);
    let weights = sanitize_weights(raw_weights, urls.len());
    let entries = urls
        .into_iter()
        .zip(weights)
        .map(|(url, weight)| Entry { url, weight })
        .collect();
    RedirectList::new(keyword, entries, enabled)
}

fn is_reserved(keyword: &Keyword) -> bool {
    let k = keyword.as_str();
    k == RESERVED_SEGMENT
        || k.strip_prefix(RESERVED_SEGMENT)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Sanitize one raw list end to end.
pub fn sanitize_list(raw: &RawList) -> Result<RedirectList, CoreError> {
    let keyword = sanitize_keyword(&raw.keyword)?;
    if is_reserved(&keyword) {
        return Err(CoreError::ReservedKeyword(keyword.as_str().to_string()));
    }
    build_list(keyword, &raw.urls, &raw.weights, raw.enabled)
}

/// A rejected list within a submission.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmissionProblem {
    /// Index of the list in the submitted sequence.
    pub position: usize,
    /// The keyword as submitted.
    pub keyword: String,
    pub error: CoreError,
}

/// Outcome of sanitizing a whole submission.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SanitizedSubmission {
    /// Accepted lists with their index in the submitted sequence.
    pub lists: Vec<(usize, RedirectList)>,
    pub problems: Vec<SubmissionProblem>,
}

/// Sanitize every list of a submission, collecting all problems instead of
/// stopping at the first. When two lists normalize to the same keyword the
/// earlier one is kept.
pub fn sanitize_submission(raw: &[RawList]) -> SanitizedSubmission {
    let mut out = SanitizedSubmission::default();
    let mut seen: HashSet<Keyword> = HashSet::new();
    for (position, item) in raw.iter().enumerate() {
        let result = sanitize_list(item).and_then(|list| {
            if seen.contains(&list.keyword) {
                Err(CoreError::DuplicateKeyword(list.keyword.as_str().to_string()))
            } else {
                Ok(list)
            }
        });
        match result {
            Ok(list) => {
                seen.insert(list.keyword.clone());
                out.lists.push((position, list));
            }
            Err(error) => {
                tracing::debug!(position, keyword = %item.keyword, %error, "list rejected");
                out.problems.push(SubmissionProblem {
                    position,
                    keyword: item.keyword.clone(),
                    error,
                });
            }
        }
    }
    out
}
