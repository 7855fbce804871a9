//! Feed fetcher: category-sharded baseline retrieval and targeted search.
//!
//! All modes paginate the upstream search API sorted by submission date
//! descending and normalize results into [`Entry`] records through a
//! pull-based cursor: a page is fetched only when the previous page's
//! entries have been consumed, so abandoning the stream early performs no
//! further requests.

use std::collections::VecDeque;

use tracing::debug;

use crate::client::ApiClient;
use crate::config::{FetchConfig, FetchStrategy};
use crate::error::FetchError;
use crate::feed::{self, Entry};

/// Produces entry streams for the baseline feed and targeted searches.
pub struct FeedFetcher<'a> {
    client: &'a ApiClient,
    config: FetchConfig,
}

impl<'a> FeedFetcher<'a> {
    pub fn new(client: &'a ApiClient, config: FetchConfig) -> Self {
        Self { client, config }
    }

    /// The baseline stream of recent entries, sharded per subcategory or
    /// as one broad query depending on the configured strategy.
    pub fn recent(&self) -> EntryStream<'a> {
        let queries: Vec<String> = match self.config.strategy {
            FetchStrategy::Sharded => self
                .config
                .shards
                .iter()
                .map(|shard| format!("cat:{shard}"))
                .collect(),
            FetchStrategy::Single => vec![self.config.category_query.clone()],
        };
        EntryStream::new(
            self.client,
            queries,
            self.config.page_size,
            self.config.max_pages,
        )
    }

    /// A targeted search combining the category filter with a disjunction
    /// of term matches. Returns `None` for an empty term list.
    pub fn search(&self, terms: &[String]) -> Option<EntryStream<'a>> {
        if terms.is_empty() {
            return None;
        }
        let query = build_term_query(&self.config.category_query, terms);
        debug!(query = %query, "targeted search");
        Some(EntryStream::new(
            self.client,
            vec![query],
            self.config.search_page_size,
            self.config.search_max_pages,
        ))
    }
}

/// `(cat:cs.*) AND (all:term1 OR all:"multi word term" ...)`
fn build_term_query(category_query: &str, terms: &[String]) -> String {
    let or_block = terms
        .iter()
        .map(|t| quote_term(t))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("({category_query}) AND ({or_block})")
}

fn quote_term(term: &str) -> String {
    if term.contains(char::is_whitespace) {
        format!("all:\"{term}\"")
    } else {
        format!("all:{term}")
    }
}

/// State of one query's pagination.
struct QueryState {
    query: String,
    start: usize,
    pages_fetched: usize,
}

/// A lazy, finite, non-restartable sequence of entries.
///
/// Entries are yielded in strict request order within each query; a query
/// ends early when a page comes back empty or when the page bound is
/// reached, after which the next queued query (the next shard) begins.
pub struct EntryStream<'a> {
    client: &'a ApiClient,
    queries: VecDeque<String>,
    page_size: usize,
    max_pages: usize,
    current: Option<QueryState>,
    buffer: VecDeque<Entry>,
}

impl<'a> EntryStream<'a> {
    fn new(
        client: &'a ApiClient,
        queries: Vec<String>,
        page_size: usize,
        max_pages: usize,
    ) -> Self {
        Self {
            client,
            queries: queries.into(),
            page_size,
            max_pages,
            current: None,
            buffer: VecDeque::new(),
        }
    }

    /// The next entry, fetching the next page only when the buffer is
    /// drained. `Ok(None)` once every query is exhausted.
    pub async fn next(&mut self) -> Result<Option<Entry>, FetchError> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Ok(Some(entry));
            }

            if self.current.is_none() {
                self.current = self.queries.pop_front().map(|query| QueryState {
                    query,
                    start: 0,
                    pages_fetched: 0,
                });
            }
            let Some(state) = self.current.as_mut() else {
                return Ok(None);
            };

            if state.pages_fetched >= self.max_pages {
                self.current = None;
                continue;
            }

            let params = page_params(&state.query, state.start, self.page_size);
            let body = self.client.get_feed(&params).await?;
            let entries = feed::parse_feed(&body);
            state.pages_fetched += 1;
            state.start += self.page_size;

            debug!(
                query = %state.query,
                page = state.pages_fetched,
                entries = entries.len(),
                "fetched page"
            );

            if entries.is_empty() {
                // An empty page ends this query; move on to the next shard.
                self.current = None;
                continue;
            }
            self.buffer.extend(entries);
        }
    }
}

fn page_params(query: &str, start: usize, page_size: usize) -> Vec<(&'static str, String)> {
    vec![
        ("search_query", query.to_string()),
        ("sortBy", "submittedDate".to_string()),
        ("sortOrder", "descending".to_string()),
        ("start", start.to_string()),
        ("max_results", page_size.to_string()),
    ]
}

// ── Tests ─────────────────────────────────────────────────────
