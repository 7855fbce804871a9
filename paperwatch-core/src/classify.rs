//! Organization classifier.
//!
//! Per-organization pattern lists are compiled once into an immutable
//! [`PatternSet`] shared read-only by every classification call. An entry
//! lands in every bucket whose patterns match - membership is not
//! exclusive.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};

use crate::config::OrgRules;
use crate::error::ConfigError;
use crate::feed::Entry;

/// Organization name -> entries, sorted by name. Within one bucket no two
/// entries share an `id`.
pub type OrgBuckets = BTreeMap<String, Vec<Entry>>;

/// Compiled, case-insensitive pattern lists per organization.
#[derive(Debug)]
pub struct PatternSet {
    patterns: BTreeMap<String, Vec<Regex>>,
}

impl PatternSet {
    /// Compile the configured pattern table. A single malformed pattern
    /// fails the whole compilation - bad configuration should not surface
    /// as silently missing matches.
    pub fn compile(organizations: &BTreeMap<String, OrgRules>) -> Result<Self, ConfigError> {
        let mut patterns = BTreeMap::new();
        for (org, rules) in organizations {
            let mut compiled = Vec::with_capacity(rules.patterns.len());
            for pattern in &rules.patterns {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConfigError::InvalidPattern {
                        organization: org.clone(),
                        message: e.to_string(),
                    })?;
                compiled.push(regex);
            }
            patterns.insert(org.clone(), compiled);
        }
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Organizations whose patterns match anywhere in the given text.
    pub fn match_text(&self, text: &str) -> Vec<String> {
        self.patterns
            .iter()
            .filter(|(_, patterns)| patterns.iter().any(|p| p.is_match(text)))
            .map(|(org, _)| org.clone())
            .collect()
    }

    /// Organizations matching the entry's metadata haystack.
    pub fn match_organizations(&self, entry: &Entry) -> Vec<String> {
        self.match_text(&metadata_haystack(entry))
    }

    /// Bucket entries by organization, preserving input order within each
    /// bucket. Entries matching nothing are dropped; entries matching
    /// several organizations appear in each of their buckets.
    pub fn group_by_organization(&self, entries: &[Entry]) -> OrgBuckets {
        let mut buckets = OrgBuckets::new();
        for entry in entries {
            for org in self.match_organizations(entry) {
                buckets.entry(org).or_default().push(entry.clone());
            }
        }
        buckets
    }
}

/// Title, summary, comment, journal reference, and the space-joined author
/// list - author strings sometimes carry affiliation text.
fn metadata_haystack(entry: &Entry) -> String {
    [
        entry.title.as_str(),
        entry.summary.as_str(),
        entry.comment.as_str(),
        entry.journal_ref.as_str(),
        &entry.authors.join(" "),
    ]
    .join("\n")
}

// ── Tests ─────────────────────────────────────────────────────
