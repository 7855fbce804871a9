//! Entry data model and Atom feed parsing for the upstream search API.
//!
//! The upstream responds with Atom XML; entries are normalized into
//! [`Entry`] records. Parsing is tolerant: missing optional fields become
//! empty strings or `None`, and an unparsable timestamp never fails the
//! feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed link attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// MIME type of the target, empty when the feed omits it.
    pub kind: String,
    pub href: String,
}

/// A normalized record describing one discovered paper.
///
/// Immutable once produced by the fetcher; flows by value through the
/// filter, classifier, orchestrator, and downloader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Canonical upstream URI, e.g. `https://arxiv.org/abs/2506.16012v2`.
    /// Source of truth for identity; non-empty for every parsed entry.
    pub id: String,
    pub title: String,
    pub summary: String,
    pub comment: String,
    pub journal_ref: String,
    pub authors: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub primary_category: Option<String>,
    pub links: Vec<Link>,
}

impl Entry {
    /// The trailing identifier segment, optionally version-suffixed:
    /// `2506.16012v2`, or `cs/0301011v1` for old-style entries.
    pub fn short_id(&self) -> String {
        short_id_of(&self.id)
    }

    /// The short identifier with any `vN` version suffix removed.
    pub fn base_id(&self) -> String {
        let sid = self.short_id();
        split_version(&sid).0.to_string()
    }

    /// The `application/pdf` link advertised by the feed, if any.
    pub fn pdf_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.kind == "application/pdf")
            .map(|l| l.href.as_str())
    }

    /// Timestamp used for window membership: `updated`, else `published`.
    pub fn effective_timestamp(&self) -> Option<DateTime<Utc>> {
        self.updated.or(self.published)
    }
}

/// Extract the short identifier from an entry URI or PDF URL.
///
/// Old-style identifiers contain a slash (`cs/0301011v1`), so the segment
/// after the `/abs/` or `/pdf/` marker is taken whole; otherwise the last
/// path segment is used.
pub fn short_id_of(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let tail = if let Some(pos) = trimmed.rfind("/abs/") {
        &trimmed[pos + 5..]
    } else if let Some(pos) = trimmed.rfind("/pdf/") {
        trimmed[pos + 5..].trim_end_matches(".pdf")
    } else {
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    };
    tail.to_string()
}

/// Split a short identifier into its base and version number.
///
/// The suffix is recognized only when a final `v` is followed by one or
/// more digits: `2506.16012v2` -> (`2506.16012`, Some(2)), while
/// `cs/0301011` -> (`cs/0301011`, None).
pub fn split_version(short_id: &str) -> (&str, Option<u32>) {
    if let Some(pos) = short_id.rfind('v') {
        let digits = &short_id[pos + 1..];
        if pos > 0 && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(version) = digits.parse() {
                return (&short_id[..pos], Some(version));
            }
        }
    }
    (short_id, None)
}

// ── Atom parsing ──────────────────────────────────────────────

/// Parse an Atom response body into entry records.
///
/// Entries without an `<id>` are dropped; everything else degrades field
/// by field.
pub fn parse_feed(xml: &str) -> Vec<Entry> {
    extract_entry_blocks(xml)
        .iter()
        .filter_map(|block| parse_entry(block))
        .collect()
}

/// Extract all `<entry>...</entry>` blocks from the XML.
fn extract_entry_blocks(xml: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut search_from = 0;

    while let Some(pos) = xml[search_from..].find("<entry>") {
        let start = search_from + pos;
        let Some(end_pos) = xml[start..].find("</entry>") else {
            break;
        };
        let end = start + end_pos + "</entry>".len();
        blocks.push(&xml[start..end]);
        search_from = end;
    }

    blocks
}

fn parse_entry(block: &str) -> Option<Entry> {
    let id = extract_tag_text(block, "id")?;
    if id.is_empty() {
        return None;
    }

    let title = normalize_whitespace(&extract_tag_text(block, "title").unwrap_or_default());
    let summary = normalize_whitespace(&extract_tag_text(block, "summary").unwrap_or_default());
    let comment =
        normalize_whitespace(&extract_tag_text(block, "arxiv:comment").unwrap_or_default());
    let journal_ref =
        normalize_whitespace(&extract_tag_text(block, "arxiv:journal_ref").unwrap_or_default());

    let published = extract_tag_text(block, "published").and_then(|s| parse_timestamp(&s));
    let updated = extract_tag_text(block, "updated").and_then(|s| parse_timestamp(&s));

    let mut authors = Vec::new();
    let mut search = 0;
    while let Some(pos) = block[search..].find("<author>") {
        let start = search + pos;
        let Some(end_pos) = block[start..].find("</author>") else {
            break;
        };
        let end = start + end_pos + "</author>".len();
        if let Some(name) = extract_tag_text(&block[start..end], "name") {
            authors.push(name);
        }
        search = end;
    }

    let mut categories = Vec::new();
    let mut primary_category = None;
    for tag in extract_self_closing_tags(block, "<category") {
        if let Some(term) = extract_attribute(tag, "term") {
            categories.push(term);
        }
    }
    for tag in extract_self_closing_tags(block, "<arxiv:primary_category") {
        if let Some(term) = extract_attribute(tag, "term") {
            primary_category = Some(term);
            break;
        }
    }
    if primary_category.is_none() {
        primary_category = categories.first().cloned();
    }

    let mut links = Vec::new();
    for tag in extract_self_closing_tags(block, "<link") {
        let Some(href) = extract_attribute(tag, "href") else {
            continue;
        };
        let kind = extract_attribute(tag, "type").unwrap_or_default();
        links.push(Link { kind, href });
    }

    Some(Entry {
        id,
        title,
        summary,
        comment,
        journal_ref,
        authors,
        published,
        updated,
        primary_category,
        links,
    })
}

/// RFC 3339 with the `Z` UTC designator accepted; anything unparsable is
/// an absent timestamp, never an error.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Extract the text content of the first `<tag ...>text</tag>` occurrence.
fn extract_tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let start_pos = xml.find(&open)?;
    let content_start = xml[start_pos..].find('>')? + start_pos + 1;
    let content_end = xml[content_start..].find(&close)? + content_start;

    Some(decode_entities(xml[content_start..content_end].trim()))
}

/// Find every tag starting with `open` (e.g. `<link`), returning the tag
/// text up to its closing `/>` or `>`.
fn extract_self_closing_tags<'a>(xml: &'a str, open: &str) -> Vec<&'a str> {
    let mut tags = Vec::new();
    let mut search = 0;

    while let Some(pos) = xml[search..].find(open) {
        let start = search + pos;
        let end = if let Some(end_pos) = xml[start..].find("/>") {
            start + end_pos + 2
        } else if let Some(end_pos) = xml[start..].find('>') {
            start + end_pos + 1
        } else {
            break;
        };
        tags.push(&xml[start..end]);
        search = end;
    }

    tags
}

/// Extract an attribute value from a tag string.
fn extract_attribute(tag: &str, attr: &str) -> Option<String> {
    let search = format!("{attr}=\"");
    let start = tag.find(&search)? + search.len();
    let end = tag[start..].find('"')? + start;
    Some(decode_entities(&tag[start..end]))
}

/// Collapse runs of whitespace into single spaces.
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the predefined XML entities the feed emits in text content.
fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// ── Tests ─────────────────────────────────────────────────────
