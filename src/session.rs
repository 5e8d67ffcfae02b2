use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::data_models::{
    Match, ScanEvent, SearchCursor, SearchHandle, SearchOutcome, SearchPhase, SearchResultSet,
};
use crate::errors::{ProviderError, SearchError, SearchResult};
use crate::extraction::PageTextProvider;
use crate::navigation;
use crate::query_engine::{SearchEngine, SearchQuery};

enum SessionState {
    Idle,
    Scanning {
        handle: SearchHandle,
        token: CancellationToken,
    },
    Populated {
        handle: SearchHandle,
        results: SearchResultSet,
        cursor: SearchCursor,
    },
    Empty {
        handle: SearchHandle,
    },
}

impl SessionState {
    fn phase(&self) -> SearchPhase {
        match self {
            SessionState::Idle => SearchPhase::Idle,
            SessionState::Scanning { .. } => SearchPhase::Scanning,
            SessionState::Populated { .. } => SearchPhase::Populated,
            SessionState::Empty { .. } => SearchPhase::Empty,
        }
    }

    fn handle(&self) -> Option<SearchHandle> {
        match self {
            SessionState::Idle => None,
            SessionState::Scanning { handle, .. }
            | SessionState::Populated { handle, .. }
            | SessionState::Empty { handle } => Some(*handle),
        }
    }
}

/// Puts the session back to `Idle` if a `search` future is dropped mid-scan,
/// e.g. by a caller-side timeout.
struct ScanGuard<'a> {
    state: &'a Mutex<SessionState>,
    handle: SearchHandle,
    token: CancellationToken,
    armed: bool,
}

impl ScanGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.token.cancel();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(&*state, SessionState::Scanning { handle, .. } if *handle == self.handle) {
            log::debug!("search {:?} dropped before completion", self.handle);
            *state = SessionState::Idle;
        }
    }
}

/// Search state for one open document.
///
/// At most one query is live at a time: starting a search supersedes the one
/// in flight, whose scan then ends as [`SearchOutcome::Cancelled`] and never
/// installs its results. Everything except `search` is synchronous.
pub struct SearchSession<P> {
    provider: Arc<P>,
    engine: SearchEngine,
    next_handle: AtomicU64,
    state: Mutex<SessionState>,
}

impl<P: PageTextProvider> SearchSession<P> {
    pub fn new(provider: Arc<P>, engine: SearchEngine) -> Self {
        Self {
            provider,
            engine,
            next_handle: AtomicU64::new(1),
            state: Mutex::new(SessionState::Idle),
        }
    }

    pub fn from_config(provider: Arc<P>) -> Self {
        Self::new(provider, SearchEngine::from_config())
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_handle(&self) -> SearchHandle {
        SearchHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn search(&self, query: &str) -> SearchOutcome {
        self.search_with_events(query, None).await
    }

    /// Runs a new query, discarding the previous result set and cursor.
    ///
    /// A blank query is a no-op: it reports `Empty` without touching the
    /// provider or the session's current state.
    pub async fn search_with_events(
        &self,
        query: &str,
        events: Option<&mpsc::UnboundedSender<ScanEvent>>,
    ) -> SearchOutcome {
        let handle = self.next_handle();
        if SearchQuery::parse(query).is_none() {
            return SearchOutcome::Empty { handle };
        }

        let token = CancellationToken::new();
        {
            let mut state = self.lock_state();
            if let SessionState::Scanning {
                handle: previous,
                token: previous_token,
            } = &*state
            {
                log::debug!("search {previous:?} superseded by {handle:?}");
                previous_token.cancel();
            }
            *state = SessionState::Scanning {
                handle,
                token: token.clone(),
            };
        }
        let mut guard = ScanGuard {
            state: &self.state,
            handle,
            token: token.clone(),
            armed: true,
        };

        let scanned = self
            .engine
            .scan_with_events(query, self.provider.as_ref(), &token, events)
            .await;
        guard.disarm();

        let mut state = self.lock_state();
        let still_active = matches!(
            &*state,
            SessionState::Scanning { handle: active, .. } if *active == handle
        );
        if !still_active {
            // superseded or cancelled; the newer state is not ours to touch
            return SearchOutcome::Cancelled { handle };
        }

        match scanned {
            Ok(results) if results.is_empty() => {
                *state = SessionState::Empty { handle };
                SearchOutcome::Empty { handle }
            }
            Ok(results) => {
                *state = SessionState::Populated {
                    handle,
                    results: results.clone(),
                    cursor: SearchCursor::start(),
                };
                SearchOutcome::Populated { handle, results }
            }
            Err(SearchError::Cancelled) => {
                *state = SessionState::Idle;
                SearchOutcome::Cancelled { handle }
            }
            Err(SearchError::PageAccess { page_number, cause }) => {
                *state = SessionState::Idle;
                SearchOutcome::Failed {
                    handle,
                    page_number: Some(page_number),
                    cause,
                }
            }
            Err(SearchError::PageCountUnavailable(cause)) => {
                *state = SessionState::Idle;
                SearchOutcome::Failed {
                    handle,
                    page_number: None,
                    cause,
                }
            }
            Err(err @ SearchError::IndexOutOfRange { .. }) => {
                *state = SessionState::Idle;
                SearchOutcome::Failed {
                    handle,
                    page_number: None,
                    cause: ProviderError::new(err),
                }
            }
        }
    }

    /// Cancels the scan identified by `handle` if it is still running.
    ///
    /// Returns `false` for finished or superseded searches.
    pub fn cancel(&self, handle: SearchHandle) -> bool {
        let mut state = self.lock_state();
        match &*state {
            SessionState::Scanning { handle: active, token } if *active == handle => {
                token.cancel();
                *state = SessionState::Idle;
                log::debug!("search {handle:?} cancelled");
                true
            }
            _ => false,
        }
    }

    /// Drops any result set and cancels any running scan.
    pub fn clear(&self) {
        let mut state = self.lock_state();
        if let SessionState::Scanning { token, .. } = &*state {
            token.cancel();
        }
        *state = SessionState::Idle;
    }

    pub fn phase(&self) -> SearchPhase {
        self.lock_state().phase()
    }

    pub fn active_handle(&self) -> Option<SearchHandle> {
        self.lock_state().handle()
    }

    pub fn results(&self) -> Option<SearchResultSet> {
        match &*self.lock_state() {
            SessionState::Populated { results, .. } => Some(results.clone()),
            _ => None,
        }
    }

    pub fn match_count(&self) -> usize {
        match &*self.lock_state() {
            SessionState::Populated { results, .. } => results.len(),
            _ => 0,
        }
    }

    pub fn cursor(&self) -> Option<SearchCursor> {
        match &*self.lock_state() {
            SessionState::Populated { cursor, .. } => Some(*cursor),
            _ => None,
        }
    }

    pub fn current_match(&self) -> Option<Match> {
        match &*self.lock_state() {
            SessionState::Populated {
                results, cursor, ..
            } => navigation::current_match(results, *cursor).cloned(),
            _ => None,
        }
    }

    pub fn current_page(&self) -> Option<u32> {
        self.current_match().map(|m| m.page_number)
    }

    pub fn advance(&self) -> Option<SearchCursor> {
        self.move_cursor(navigation::advance)
    }

    pub fn retreat(&self) -> Option<SearchCursor> {
        self.move_cursor(navigation::retreat)
    }

    /// Selects match `index`. An out-of-range index leaves the cursor where it was.
    pub fn jump_to(&self, index: usize) -> SearchResult<SearchCursor> {
        let mut state = self.lock_state();
        match &mut *state {
            SessionState::Populated {
                results, cursor, ..
            } => {
                *cursor = navigation::jump_to(results, index)?;
                Ok(*cursor)
            }
            _ => Err(SearchError::IndexOutOfRange { index, len: 0 }),
        }
    }

    fn move_cursor(
        &self,
        step: fn(&SearchResultSet, SearchCursor) -> Option<SearchCursor>,
    ) -> Option<SearchCursor> {
        let mut state = self.lock_state();
        match &mut *state {
            SessionState::Populated {
                results, cursor, ..
            } => {
                *cursor = step(results, *cursor)?;
                Some(*cursor)
            }
            _ => None,
        }
    }
}
