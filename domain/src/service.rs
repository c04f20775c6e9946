use tracing::{debug, error, info, warn};

use crate::sanitize::{sanitize_keyword, sanitize_submission, SubmissionProblem};
use crate::select::select;
use crate::{Clock, CoreError, LinkRegistry, RandomSource, RawList, RedirectList, RedirectStore};

/// What happened to the shortlink of a saved list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShortlinkSync {
    /// The registry had no mapping for the keyword.
    Created,
    /// The registry pointed at a different URL and was updated.
    Updated,
    /// The registry already pointed at the list's first URL.
    Unchanged,
    /// The registry call failed. The list itself is still saved.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SavedList {
    pub list: RedirectList,
    pub shortlink: ShortlinkSync,
}

/// Result of a settings submission: lists written and lists rejected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmissionReport {
    pub saved: Vec<SavedList>,
    pub problems: Vec<SubmissionProblem>,
}

/// Application service tying the sanitizer and selector to the store and
/// link registry.
///
/// Generic over the store, the registry, the random source and the clock so
/// the whole flow runs in tests with in-memory adapters and seeded draws.
pub struct RedirectService<S: RedirectStore, L: LinkRegistry, R: RandomSource, C: Clock> {
    store: S,
    registry: L,
    rng: R,
    clock: C,
}

impl<S: RedirectStore, L: LinkRegistry, R: RandomSource, C: Clock> RedirectService<S, L, R, C> {
    pub fn new(store: S, registry: L, rng: R, clock: C) -> Self {
        Self {
            store,
            registry,
            rng,
            clock,
        }
    }

    /// Pick a destination for a raw keyword. `Ok(None)` means no action:
    /// malformed keyword, unknown keyword, or disabled list.
    pub fn resolve(&self, raw_keyword: &str) -> Result<Option<String>, CoreError> {
        let Ok(keyword) = sanitize_keyword(raw_keyword) else {
            return Ok(None);
        };
        let Some(list) = self.store.get(&keyword)? else {
            return Ok(None);
        };
        if !list.enabled {
            debug!(keyword = %keyword, "list disabled");
            return Ok(None);
        }
        Ok(select(list.entries(), &self.rng).map(str::to_string))
    }

    /// Sanitize and persist a submission, then bring each saved keyword's
    /// shortlink in line with the list's first URL. A list the store refuses
    /// is reported as a problem and the remaining lists are still attempted.
    pub fn submit(&self, raw: &[RawList]) -> Result<SubmissionReport, CoreError> {
        let sanitized = sanitize_submission(raw);
        for problem in &sanitized.problems {
            warn!(
                position = problem.position,
                keyword = %problem.keyword,
                error = %problem.error,
                "list rejected"
            );
        }

        let now = self.clock.now();
        let mut problems = sanitized.problems;
        let mut saved = Vec::with_capacity(sanitized.lists.len());
        for (position, mut list) in sanitized.lists {
            list.updated_at = Some(now);
            if let Err(error) = self.store.put(list.clone()) {
                error!(position, keyword = %list.keyword, err = %error, "list not saved");
                problems.push(SubmissionProblem {
                    position,
                    keyword: raw
                        .get(position)
                        .map_or_else(|| list.keyword.to_string(), |r| r.keyword.clone()),
                    error,
                });
                continue;
            }
            let shortlink = self.sync_shortlink(&list);
            info!(
                keyword = %list.keyword,
                entries = list.entries().len(),
                enabled = list.enabled,
                shortlink = ?shortlink,
                "list saved"
            );
            saved.push(SavedList { list, shortlink });
        }
        problems.sort_by_key(|p| p.position);

        Ok(SubmissionReport { saved, problems })
    }

    fn sync_shortlink(&self, list: &RedirectList) -> ShortlinkSync {
        let target = list.first_url();
        let result = match self.registry.lookup(&list.keyword) {
            Ok(None) => self
                .registry
                .create(&list.keyword, target)
                .map(|_| ShortlinkSync::Created),
            Ok(Some(prior)) if prior == target => Ok(ShortlinkSync::Unchanged),
            Ok(Some(_)) => self
                .registry
                .update(&list.keyword, target)
                .map(|_| ShortlinkSync::Updated),
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!(keyword = %list.keyword, err = %e, "shortlink sync failed");
            ShortlinkSync::Failed(e.to_string())
        })
    }

    /// Load a list by raw keyword.
    pub fn get(&self, raw_keyword: &str) -> Result<Option<RedirectList>, CoreError> {
        let keyword = sanitize_keyword(raw_keyword)?;
        self.store.get(&keyword)
    }

    /// All stored lists, ordered by keyword.
    pub fn list(&self) -> Result<Vec<RedirectList>, CoreError> {
        self.store.list()
    }

    /// Delete a list. Its shortlink, if any, is left in the registry.
    pub fn delete(&self, raw_keyword: &str) -> Result<(), CoreError> {
        let keyword = sanitize_keyword(raw_keyword)?;
        self.store.delete(&keyword)?;
        info!(keyword = %keyword, "list deleted");
        Ok(())
    }
}
