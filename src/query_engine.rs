use futures::StreamExt;
use std::pin::pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{CONFIG, DEFAULT_PREFETCH_PAGES, DEFAULT_SNIPPET_RADIUS};
use crate::data_models::{Match, ScanEvent, SearchResultSet};
use crate::errors::{SearchError, SearchResult};
use crate::extraction::PageTextProvider;

pub const ELLIPSIS: &str = "...";

/// Lower-cases one char without changing the char count.
///
/// Multi-char lowercase expansions (e.g. `'İ'`) keep their first char only, so
/// offsets into folded text are offsets into the original text too. Final
/// sigma folds to `'σ'` since `'Σ'` lowers without word context.
pub fn fold_char(c: char) -> char {
    match c {
        'ς' => 'σ',
        c => c.to_lowercase().next().unwrap_or(c),
    }
}

pub fn fold_case(text: &str) -> Vec<char> {
    text.chars().map(fold_char).collect()
}

/// A validated, case-folded search string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    normalized: String,
    needle: Vec<char>,
}

impl SearchQuery {
    /// Returns `None` for empty or whitespace-only input.
    ///
    /// Only the emptiness check trims: surrounding spaces of a real query are
    /// part of what gets matched.
    pub fn parse(raw: &str) -> Option<SearchQuery> {
        if raw.trim().is_empty() {
            return None;
        }
        let needle = fold_case(raw);
        Some(SearchQuery {
            normalized: needle.iter().collect(),
            needle,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn len(&self) -> usize {
        self.needle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn chars(&self) -> &[char] {
        &self.needle
    }
}

fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

/// Context around `[offset, offset + len)`, clipped to `radius` chars each side
/// and marked with an ellipsis wherever text was cut.
pub fn build_snippet(text: &[char], offset: usize, len: usize, radius: usize) -> String {
    let start = offset.saturating_sub(radius);
    let end = offset.saturating_add(len).saturating_add(radius).min(text.len());

    let mut snippet = String::with_capacity(end - start + 2 * ELLIPSIS.len());
    if start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.extend(&text[start..end]);
    if end < text.len() {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

/// Every occurrence of `query` in one page's text, overlapping ones included,
/// in increasing offset order.
pub fn find_matches(page_number: u32, text: &str, query: &SearchQuery, radius: usize) -> Vec<Match> {
    let original: Vec<char> = text.chars().collect();
    let folded: Vec<char> = original.iter().copied().map(fold_char).collect();
    let needle = query.chars();

    let mut matches = Vec::new();
    let mut from = 0usize;
    while let Some(offset) = find_from(&folded, needle, from) {
        matches.push(Match {
            page_number,
            char_offset: offset,
            length: needle.len(),
            snippet: build_snippet(&original, offset, needle.len(), radius),
        });
        // overlapping occurrences: resume one char later, not after the match
        from = offset + 1;
    }
    matches
}

/// Full-document substring search over a [`PageTextProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchEngine {
    snippet_radius: usize,
    prefetch_pages: usize,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SNIPPET_RADIUS, DEFAULT_PREFETCH_PAGES)
    }
}

impl SearchEngine {
    pub fn new(snippet_radius: usize, prefetch_pages: usize) -> Self {
        Self {
            snippet_radius,
            prefetch_pages: prefetch_pages.max(1),
        }
    }

    pub fn from_config() -> Self {
        Self::new(CONFIG.snippet_radius, CONFIG.prefetch_pages)
    }

    pub fn with_snippet_radius(mut self, snippet_radius: usize) -> Self {
        self.snippet_radius = snippet_radius;
        self
    }

    pub fn with_prefetch_pages(mut self, prefetch_pages: usize) -> Self {
        self.prefetch_pages = prefetch_pages.max(1);
        self
    }

    pub fn snippet_radius(&self) -> usize {
        self.snippet_radius
    }

    pub fn prefetch_pages(&self) -> usize {
        self.prefetch_pages
    }

    pub async fn scan<P: PageTextProvider>(
        &self,
        query: &str,
        provider: &P,
        cancel: &CancellationToken,
    ) -> SearchResult<SearchResultSet> {
        self.scan_with_events(query, provider, cancel, None).await
    }

    /// Scans pages `1..=page_count` in order and collects every match.
    ///
    /// `cancel` is checked before each page and raced against every page text
    /// request. A provider failure aborts the scan with
    /// [`SearchError::PageAccess`]; partial results are never returned.
    /// When `events` is given, each scanned page is reported as it completes.
    pub async fn scan_with_events<P: PageTextProvider>(
        &self,
        query: &str,
        provider: &P,
        cancel: &CancellationToken,
        events: Option<&mpsc::UnboundedSender<ScanEvent>>,
    ) -> SearchResult<SearchResultSet> {
        let Some(parsed) = SearchQuery::parse(query) else {
            log::trace!("skipping empty query");
            return Ok(SearchResultSet::empty(query));
        };
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let total_pages = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SearchError::Cancelled),
            count = provider.page_count() => count.map_err(SearchError::PageCountUnavailable)?,
        };
        log::debug!(
            "scanning {total_pages} pages for {:?} (prefetch {})",
            parsed.as_str(),
            self.prefetch_pages
        );

        // `buffered` keeps up to `prefetch_pages` requests in flight but yields
        // them in page order.
        let pages = futures::stream::iter(1..=total_pages)
            .map(move |page_number| async move { (page_number, provider.page_text(page_number).await) })
            .buffered(self.prefetch_pages);
        let mut pages = pin!(pages);

        let mut matches = Vec::new();
        loop {
            if cancel.is_cancelled() {
                log::debug!("scan for {:?} cancelled", parsed.as_str());
                return Err(SearchError::Cancelled);
            }
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!("scan for {:?} cancelled while waiting for page text", parsed.as_str());
                    return Err(SearchError::Cancelled);
                }
                next = pages.next() => next,
            };
            let Some((page_number, text)) = next else {
                break;
            };
            let text = text.map_err(|cause| SearchError::PageAccess { page_number, cause })?;

            let page_matches = find_matches(page_number, &text, &parsed, self.snippet_radius);
            log::trace!("page {page_number}: {} matches", page_matches.len());
            if let Some(tx) = events {
                // a dropped receiver only means nobody is watching progress
                let _ = tx.send(ScanEvent::PageScanned {
                    page_number,
                    total_pages,
                    matches: page_matches.clone(),
                });
            }
            matches.extend(page_matches);
        }

        log::debug!(
            "scan for {:?} finished with {} matches",
            parsed.as_str(),
            matches.len()
        );
        Ok(SearchResultSet::new(query, total_pages, matches))
    }
}
