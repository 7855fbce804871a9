//! Fallback/merge orchestrator.
//!
//! Pattern classification over the baseline feed misses organizations
//! whose names never appear in entry metadata, so sparse or empty buckets
//! can be backfilled with targeted searches. Search results pass the same
//! category and time-window filters as the baseline and merge into the
//! buckets with identifier-based deduplication.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::classify::{OrgBuckets, PatternSet};
use crate::config::{FallbackMode, OrgRules};
use crate::feed::Entry;
use crate::fetch::FeedFetcher;
use crate::window::{TimeWindow, in_window, is_target_category};

/// Classify the baseline entries, then backfill per-organization buckets
/// according to the fallback mode.
///
/// Organizations without configured search terms are skipped without side
/// effects. A targeted search that fails (endpoints exhausted) is logged
/// and abandoned for that organization; entries it returned before
/// failing are still merged. Post-merge, no bucket contains two entries
/// with the same `id`.
pub async fn build_buckets_with_fallback(
    fetcher: &FeedFetcher<'_>,
    patterns: &PatternSet,
    organizations: &BTreeMap<String, OrgRules>,
    category_prefixes: &[String],
    window: &TimeWindow,
    mode: FallbackMode,
    baseline: &[Entry],
) -> OrgBuckets {
    let mut buckets = patterns.group_by_organization(baseline);
    debug!(
        baseline_buckets = buckets.len(),
        baseline_entries = baseline.len(),
        "baseline classification done"
    );

    let targets: Vec<&String> = match mode {
        FallbackMode::Always => organizations.keys().collect(),
        FallbackMode::FillMissing => organizations
            .keys()
            .filter(|org| buckets.get(*org).is_none_or(|b| b.is_empty()))
            .collect(),
        FallbackMode::NoneUnlessEmpty => {
            if buckets.is_empty() {
                organizations.keys().collect()
            } else {
                Vec::new()
            }
        }
    };
    debug!(?targets, "targeted search candidates");

    for org in targets {
        let terms = &organizations[org].search_terms;
        let Some(mut stream) = fetcher.search(terms) else {
            continue;
        };

        let mut hits: Vec<Entry> = Vec::new();
        loop {
            match stream.next().await {
                Ok(Some(entry)) => {
                    if is_target_category(&entry, category_prefixes)
                        && in_window(&entry, window)
                    {
                        hits.push(entry);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(org = %org, error = %e, "targeted search failed");
                    break;
                }
            }
        }

        debug!(org = %org, hits = hits.len(), "targeted search finished");
        if hits.is_empty() {
            continue;
        }

        let bucket = buckets.entry(org.clone()).or_default();
        let mut seen: HashSet<String> = bucket.iter().map(|e| e.id.clone()).collect();
        for entry in hits {
            if seen.insert(entry.id.clone()) {
                bucket.push(entry);
            }
        }
    }

    buckets
}

// ── Tests ─────────────────────────────────────────────────────
