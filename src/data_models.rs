use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;

/// One positioned run of text as extracted from a PDF page.
///
/// Coordinates are in page space and only matter to the text-layer overlay;
/// search looks at `text` alone.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TextFragment {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextFragment {
    pub fn new(text: impl Into<String>) -> TextFragment {
        TextFragment {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn positioned(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> TextFragment {
        TextFragment {
            text: text.into(),
            x,
            y,
            width,
            height,
        }
    }
}

/// One occurrence of the query inside one page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// 1-based page number.
    pub page_number: u32,
    /// Offset of the first matched char in the page text, counted in chars.
    pub char_offset: usize,
    /// Matched length in chars.
    pub length: usize,
    pub snippet: String,
}

/// Every match of one query, ordered by page then by offset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResultSet {
    pub query: String,
    pub total_pages: u32,
    pub matches: Vec<Match>,
}

impl SearchResultSet {
    pub fn new(query: impl Into<String>, total_pages: u32, matches: Vec<Match>) -> SearchResultSet {
        SearchResultSet {
            query: query.into(),
            total_pages,
            matches,
        }
    }

    pub fn empty(query: impl Into<String>) -> SearchResultSet {
        SearchResultSet::new(query, 0, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Match> {
        self.matches.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.matches.iter()
    }

    /// Matches located on `page_number`, in offset order.
    pub fn on_page(&self, page_number: u32) -> impl Iterator<Item = &Match> {
        self.matches
            .iter()
            .filter(move |m| m.page_number == page_number)
    }
}

impl<'a> IntoIterator for &'a SearchResultSet {
    type Item = &'a Match;
    type IntoIter = std::slice::Iter<'a, Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

/// Index of the selected match inside a result set.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SearchCursor(pub usize);

impl SearchCursor {
    pub fn start() -> SearchCursor {
        SearchCursor(0)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Identifies one `search()` call on a session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SearchHandle(pub u64);

/// How one `search()` call ended.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Populated {
        handle: SearchHandle,
        results: SearchResultSet,
    },
    Empty {
        handle: SearchHandle,
    },
    Cancelled {
        handle: SearchHandle,
    },
    Failed {
        handle: SearchHandle,
        /// `None` when the page count itself could not be read.
        page_number: Option<u32>,
        cause: ProviderError,
    },
}

impl SearchOutcome {
    pub fn handle(&self) -> SearchHandle {
        match self {
            SearchOutcome::Populated { handle, .. }
            | SearchOutcome::Empty { handle }
            | SearchOutcome::Cancelled { handle }
            | SearchOutcome::Failed { handle, .. } => *handle,
        }
    }

    pub fn match_count(&self) -> usize {
        match self {
            SearchOutcome::Populated { results, .. } => results.len(),
            _ => 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchOutcome::Cancelled { .. })
    }

    /// Status line for the search bar. Cancellation is silent.
    pub fn summary(&self, query: &str) -> Option<String> {
        match self {
            SearchOutcome::Populated { results, .. } => {
                let n = results.len();
                Some(format!("{n} result{} found", if n == 1 { "" } else { "s" }))
            }
            SearchOutcome::Empty { .. } => Some(format!("No results found for \"{query}\"")),
            SearchOutcome::Cancelled { .. } => None,
            SearchOutcome::Failed {
                page_number: Some(page),
                ..
            } => Some(format!("Search failed on page {page}")),
            SearchOutcome::Failed { page_number: None, .. } => {
                Some("Search failed: document unavailable".to_string())
            }
        }
    }
}

/// Lifecycle of the query a session currently holds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Scanning,
    Populated,
    Empty,
}

/// Progress notification emitted after each page of a scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    PageScanned {
        page_number: u32,
        total_pages: u32,
        matches: Vec<Match>,
    },
}
