//! Affiliation-text extraction and PDF-content classification.
//!
//! Metadata rarely names the authors' institutions, so an alternative
//! classifier reads the author/affiliation block of already-downloaded
//! PDFs. Extraction sits behind [`AffiliationExtractor`] so tests (and
//! alternative backends) can substitute the PDF machinery.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::classify::{OrgBuckets, PatternSet};
use crate::download::safe_filename;
use crate::error::Result;
use crate::feed::Entry;

/// Produces heuristically filtered affiliation-region text from a local
/// PDF, or empty text when nothing qualifies.
pub trait AffiliationExtractor {
    fn extract(&self, pdf_path: &Path, max_pages: usize) -> Result<String>;
}

/// Default extractor backed by `lopdf`.
pub struct LopdfExtractor;

impl AffiliationExtractor for LopdfExtractor {
    fn extract(&self, pdf_path: &Path, max_pages: usize) -> Result<String> {
        let doc = lopdf::Document::load(pdf_path).map_err(std::io::Error::other)?;

        let page_numbers: Vec<u32> = doc
            .get_pages()
            .keys()
            .copied()
            .take(max_pages.max(1))
            .collect();

        let mut chunks = Vec::new();
        for page in page_numbers {
            // A page that fails text extraction is skipped, not fatal:
            // scanned or malformed pages are common.
            let Ok(raw) = doc.extract_text(&[page]) else {
                continue;
            };
            let kept: Vec<&str> = raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && is_affiliation_line(line))
                .collect();
            if !kept.is_empty() {
                chunks.push(kept.join("\n"));
            }
        }

        Ok(chunks.join("\n").trim().to_string())
    }
}

/// The author/affiliation block usually carries commas, superscript
/// markers, or institution keywords.
fn is_affiliation_line(line: &str) -> bool {
    const KEYWORDS: [&str; 6] = [
        "University",
        "Institute",
        "Laboratory",
        "Lab",
        "Dept",
        "Department",
    ];
    const SUPERSCRIPTS: [&str; 7] = ["\u{b9}", "\u{b2}", "\u{b3}", "\u{2074}", "^1", "^2", "^3"];

    line.contains(',')
        || KEYWORDS.iter().any(|k| line.contains(k))
        || SUPERSCRIPTS.iter().any(|s| line.contains(s))
}

/// Bucket entries by matching extracted affiliation text against the same
/// pattern set the metadata classifier uses.
///
/// Entries without a resolvable local PDF, or whose extraction yields
/// nothing, are silently skipped.
pub fn classify_from_pdf(
    entries: &[Entry],
    id_to_pdf: &HashMap<String, PathBuf>,
    extractor: &dyn AffiliationExtractor,
    patterns: &PatternSet,
    max_pages: usize,
) -> OrgBuckets {
    let mut buckets = OrgBuckets::new();

    for entry in entries {
        let short_id = entry.short_id();
        let Some(path) = id_to_pdf.get(&short_id) else {
            continue;
        };
        if !path.exists() {
            continue;
        }
        let text = match extractor.extract(path, max_pages) {
            Ok(text) => text,
            Err(e) => {
                debug!(short_id = %short_id, error = %e, "affiliation extraction failed");
                continue;
            }
        };
        if text.is_empty() {
            continue;
        }
        for org in patterns.match_text(&text) {
            buckets.entry(org).or_default().push(entry.clone());
        }
    }

    buckets
}

/// Place an already-downloaded PDF into an organization directory,
/// preferring a hardlink and falling back to a copy. Idempotent: an
/// existing destination is returned untouched.
pub fn place_pdf_into_org_dir(short_id: &str, src_pdf: &Path, org_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(org_dir)?;
    let dst = org_dir.join(safe_filename(&format!("{short_id}.pdf")));
    if dst.exists() {
        return Ok(dst);
    }
    if fs::hard_link(src_pdf, &dst).is_err() {
        fs::copy(src_pdf, &dst)?;
    }
    Ok(dst)
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrgRules;
    use std::collections::BTreeMap;

    /// Extractor returning canned text per ShortID stem.
    struct FixtureExtractor {
        texts: HashMap<String, String>,
    }

    impl AffiliationExtractor for FixtureExtractor {
        fn extract(&self, pdf_path: &Path, _max_pages: usize) -> Result<String> {
            let stem = pdf_path.file_stem().unwrap().to_string_lossy().to_string();
            Ok(self.texts.get(&stem).cloned().unwrap_or_default())
        }
    }

    fn entry(id: &str) -> Entry {
        Entry {
            id: format!("https://arxiv.org/abs/{id}"),
            title: "A Paper".into(),
            summary: String::new(),
            comment: String::new(),
            journal_ref: String::new(),
            authors: vec![],
            published: None,
            updated: None,
            primary_category: Some("cs.AI".into()),
            links: vec![],
        }
    }

    fn google_patterns() -> PatternSet {
        let orgs: BTreeMap<String, OrgRules> = [(
            "Google".to_string(),
            OrgRules {
                patterns: vec![r"Google( Research)?".to_string()],
                search_terms: vec![],
            },
        )]
        .into();
        PatternSet::compile(&orgs).unwrap()
    }

    #[test]
    fn test_affiliation_line_heuristics() {
        assert!(is_affiliation_line("Ada Lovelace, Grace Hopper"));
        assert!(is_affiliation_line("Stanford University"));
        assert!(is_affiliation_line("Dept of Computer Science"));
        assert!(is_affiliation_line("Alan Turing\u{b9}"));
        assert!(is_affiliation_line("John von Neumann^2"));
        assert!(!is_affiliation_line("We present a novel approach"));
        assert!(!is_affiliation_line("Abstract"));
    }

    #[test]
    fn test_classify_from_pdf_buckets_on_extracted_text() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("2506.16012v2.pdf");
        fs::write(&pdf, b"%PDF-1.4 stub").unwrap();

        let entries = vec![entry("2506.16012v2"), entry("2506.99999v1")];
        let id_to_pdf: HashMap<String, PathBuf> =
            [("2506.16012v2".to_string(), pdf)].into();
        let extractor = FixtureExtractor {
            texts: [(
                "2506.16012v2".to_string(),
                "Ada Lovelace, Google Research, Mountain View".to_string(),
            )]
            .into(),
        };

        let buckets = classify_from_pdf(
            &entries,
            &id_to_pdf,
            &extractor,
            &google_patterns(),
            2,
        );
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets["Google"].len(), 1);
        assert_eq!(buckets["Google"][0].short_id(), "2506.16012v2");
    }

    #[test]
    fn test_classify_from_pdf_skips_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("2506.00001v1.pdf");
        fs::write(&present, b"%PDF").unwrap();

        let entries = vec![entry("2506.00001v1"), entry("2506.00002v1")];
        // 00001 maps to a file but extracts nothing; 00002 has no mapping.
        let id_to_pdf: HashMap<String, PathBuf> =
            [("2506.00001v1".to_string(), present)].into();
        let extractor = FixtureExtractor {
            texts: HashMap::new(),
        };

        let buckets = classify_from_pdf(
            &entries,
            &id_to_pdf,
            &extractor,
            &google_patterns(),
            2,
        );
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_place_pdf_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.pdf");
        fs::write(&src, b"%PDF content").unwrap();
        let org_dir = dir.path().join("Google");

        let first = place_pdf_into_org_dir("2506.16012v2", &src, &org_dir).unwrap();
        assert_eq!(fs::read(&first).unwrap(), b"%PDF content");

        let second = place_pdf_into_org_dir("2506.16012v2", &src, &org_dir).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_place_pdf_sanitizes_old_style_ids() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.pdf");
        fs::write(&src, b"%PDF").unwrap();
        let org_dir = dir.path().join("MIT");

        let placed = place_pdf_into_org_dir("cs/0301011v1", &src, &org_dir).unwrap();
        assert_eq!(placed.parent().unwrap(), org_dir);
        assert_eq!(
            placed.file_name().unwrap().to_string_lossy(),
            "cs_0301011v1.pdf"
        );
    }
}
