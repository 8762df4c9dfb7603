//! Invalidation planning.
//!
//! A mutation on one resource turns into a set of targets: its own entry plus
//! one target per declared dependent. Targets are independent and idempotent,
//! so they are executed concurrently with no ordering between them.

use std::fmt;

use futures::future::join_all;
use metrics::counter;
use tracing::{debug, error};

use super::keys::{CacheKey, KeyPrefix, build_key};
use super::policy::ResourceCachePolicy;
use super::store::{CacheStore, CacheStoreError};
use super::template::{PathParams, TemplateError};

const METRIC_INVALIDATED: &str = "quire_cache_invalidated_total";
const METRIC_STORE_ERROR: &str = "quire_cache_store_error_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationTarget {
    /// A single key.
    Exact(CacheKey),
    /// Every key under the prefix (query or identity dimension is unbounded).
    Prefix(KeyPrefix),
}

impl InvalidationTarget {
    fn mode(&self) -> &'static str {
        match self {
            Self::Exact(_) => "exact",
            Self::Prefix(_) => "prefix",
        }
    }
}

impl fmt::Display for InvalidationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(key) => write!(f, "key `{key}`"),
            Self::Prefix(prefix) => write!(f, "prefix `{prefix}*`"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvalidationPlan {
    resource: &'static str,
    targets: Vec<InvalidationTarget>,
    unresolved: Vec<(&'static str, TemplateError)>,
}

impl InvalidationPlan {
    /// Targets for a mutation of `policy` at the concrete `uri`.
    ///
    /// `params` are the path parameters captured from the mutating request;
    /// each dependent's template is rendered with them.
    pub fn for_mutation(
        policy: &ResourceCachePolicy,
        uri: &str,
        params: &PathParams,
        identity: Option<&str>,
    ) -> Self {
        let mut targets = Vec::with_capacity(policy.dependents().len() + 1);
        let mut unresolved = Vec::new();

        if policy.includes_query() {
            targets.push(InvalidationTarget::Prefix(KeyPrefix::for_uri(uri)));
        } else {
            targets.push(InvalidationTarget::Exact(build_key(
                uri, policy, None, identity,
            )));
        }

        for dependent in policy.dependents() {
            match dependent.template().render(params) {
                Ok(rendered) if dependent.needs_keyspace_scan() => {
                    targets.push(InvalidationTarget::Prefix(KeyPrefix::for_uri(&rendered)));
                }
                Ok(rendered) => {
                    targets.push(InvalidationTarget::Exact(build_key(
                        &rendered, dependent, None, None,
                    )));
                }
                Err(err) => unresolved.push((dependent.name(), err)),
            }
        }

        Self {
            resource: policy.name(),
            targets,
            unresolved,
        }
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn targets(&self) -> &[InvalidationTarget] {
        &self.targets
    }

    /// Run every target against `store`.
    ///
    /// Store failures never abort the cascade; each one is logged at error
    /// level and returned in the report.
    pub async fn execute(&self, store: &dyn CacheStore) -> InvalidationReport {
        let mut report = InvalidationReport::default();

        for (dependent, err) in &self.unresolved {
            error!(
                target = "quire::cache::invalidate",
                resource = self.resource,
                dependent,
                error = %err,
                "Dependent cache key could not be derived; entries may be stale"
            );
            report.unresolved += 1;
        }

        let outcomes = join_all(
            self.targets
                .iter()
                .map(|target| invalidate_target(store, target)),
        )
        .await;

        for (target, outcome) in self.targets.iter().zip(outcomes) {
            counter!(METRIC_INVALIDATED, "mode" => target.mode()).increment(1);
            match outcome {
                Ok(TargetOutcome { matched, deleted }) => {
                    report.matched += matched;
                    report.deleted += deleted;
                    match target {
                        InvalidationTarget::Exact(_) => report.exact += 1,
                        InvalidationTarget::Prefix(_) => report.scans += 1,
                    }
                }
                Err(err) => {
                    counter!(METRIC_STORE_ERROR, "op" => "invalidate").increment(1);
                    error!(
                        target = "quire::cache::invalidate",
                        resource = self.resource,
                        invalidation_target = %target,
                        error = %err,
                        "Cache invalidation failed; entries may be stale"
                    );
                    report.failures.push((target.clone(), err));
                }
            }
        }

        debug!(
            target = "quire::cache::invalidate",
            resource = self.resource,
            exact = report.exact,
            scans = report.scans,
            deleted = report.deleted,
            failures = report.failures.len(),
            "Invalidation cascade finished"
        );
        report
    }
}

/// Summary of one cascade run.
#[derive(Debug, Default)]
pub struct InvalidationReport {
    /// Exact-key targets that completed.
    pub exact: usize,
    /// Prefix-scan targets that completed.
    pub scans: usize,
    /// Keys addressed (exact targets count as one).
    pub matched: usize,
    /// Entries that actually existed and were removed.
    pub deleted: usize,
    pub unresolved: usize,
    pub failures: Vec<(InvalidationTarget, CacheStoreError)>,
}

impl InvalidationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.unresolved == 0
    }
}

struct TargetOutcome {
    matched: usize,
    deleted: usize,
}

async fn invalidate_target(
    store: &dyn CacheStore,
    target: &InvalidationTarget,
) -> Result<TargetOutcome, CacheStoreError> {
    match target {
        InvalidationTarget::Exact(key) => {
            let removed = store.delete(key).await?;
            Ok(TargetOutcome {
                matched: 1,
                deleted: usize::from(removed),
            })
        }
        InvalidationTarget::Prefix(prefix) => {
            let keys = store.scan(prefix).await?;
            let results = join_all(keys.iter().map(|key| store.delete(key))).await;
            let mut deleted = 0;
            for result in results {
                if result? {
                    deleted += 1;
                }
            }
            Ok(TargetOutcome {
                matched: keys.len(),
                deleted,
            })
        }
    }
}
