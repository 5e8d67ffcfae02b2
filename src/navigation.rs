//! Cursor movement over a result set.
//!
//! The cursor wraps in both directions. Every function returns `None` for an
//! empty result set, which has no valid cursor position.

use crate::data_models::{Match, SearchCursor, SearchResultSet};
use crate::errors::{SearchError, SearchResult};

pub fn current_match(results: &SearchResultSet, cursor: SearchCursor) -> Option<&Match> {
    results.get(cursor.index())
}

/// Next match, wrapping from the last to the first.
pub fn advance(results: &SearchResultSet, cursor: SearchCursor) -> Option<SearchCursor> {
    let len = results.len();
    if len == 0 {
        return None;
    }
    Some(SearchCursor((cursor.index() % len + 1) % len))
}

/// Previous match, wrapping from the first to the last.
pub fn retreat(results: &SearchResultSet, cursor: SearchCursor) -> Option<SearchCursor> {
    let len = results.len();
    if len == 0 {
        return None;
    }
    Some(SearchCursor((cursor.index() % len + len - 1) % len))
}

/// Selects `index` directly. Out-of-range indices are rejected, never clamped.
pub fn jump_to(results: &SearchResultSet, index: usize) -> SearchResult<SearchCursor> {
    if index < results.len() {
        Ok(SearchCursor(index))
    } else {
        Err(SearchError::IndexOutOfRange {
            index,
            len: results.len(),
        })
    }
}
