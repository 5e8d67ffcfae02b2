use anyhow::Result;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use folio_search::query_engine::{SearchQuery, find_matches};
use folio_search::{InMemoryDocument, ScanEvent, SearchEngine, SearchError};

mod test_helpers {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    use folio_search::{PageTextProvider, ProviderError};

    /// In-memory document that records every provider call and can be told to
    /// fail, stall, or answer out of order.
    #[derive(Default)]
    pub struct RecordingDocument {
        pages: Vec<String>,
        page_text_calls: Mutex<Vec<u32>>,
        page_count_calls: AtomicUsize,
        fail_on_page: Option<u32>,
        fail_page_count: bool,
        gate: Option<Arc<Semaphore>>,
        reverse_latency: Option<Duration>,
    }

    impl RecordingDocument {
        pub fn new(pages: &[&str]) -> Self {
            Self {
                pages: pages.iter().map(|p| p.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn failing_on(mut self, page_number: u32) -> Self {
            self.fail_on_page = Some(page_number);
            self
        }

        pub fn failing_page_count(mut self) -> Self {
            self.fail_page_count = true;
            self
        }

        /// Every page text request waits for one permit of `gate`.
        pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
            self.gate = Some(gate);
            self
        }

        /// Earlier pages answer more slowly than later ones.
        pub fn reverse_latency(mut self, step: Duration) -> Self {
            self.reverse_latency = Some(step);
            self
        }

        pub fn page_text_calls(&self) -> Vec<u32> {
            self.page_text_calls.lock().unwrap().clone()
        }

        pub fn page_count_calls(&self) -> usize {
            self.page_count_calls.load(Ordering::SeqCst)
        }
    }

    impl PageTextProvider for RecordingDocument {
        async fn page_count(&self) -> Result<u32, ProviderError> {
            self.page_count_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_page_count {
                return Err(ProviderError::msg("document is not loaded"));
            }
            Ok(self.pages.len() as u32)
        }

        async fn page_text(&self, page_number: u32) -> Result<String, ProviderError> {
            self.page_text_calls.lock().unwrap().push(page_number);
            if let Some(gate) = &self.gate {
                gate.acquire().await.map_err(ProviderError::new)?.forget();
            }
            if let Some(step) = self.reverse_latency {
                let remaining = self.pages.len() as u32 + 1 - page_number;
                tokio::time::sleep(step * remaining).await;
            }
            if self.fail_on_page == Some(page_number) {
                return Err(ProviderError::msg(format!("page {page_number} is corrupt")));
            }
            self.pages
                .get(page_number as usize - 1)
                .cloned()
                .ok_or_else(|| ProviderError::msg(format!("no page {page_number}")))
        }
    }

    /// Polls `cond`, yielding to other tasks between tries.
    pub async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..2000 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("condition was not reached in time");
    }
}

use test_helpers::*;

fn positions(results: &folio_search::SearchResultSet) -> Vec<(u32, usize)> {
    results
        .iter()
        .map(|m| (m.page_number, m.char_offset))
        .collect()
}

#[tokio::test]
async fn test_scan_empty_query_does_not_touch_provider() -> Result<()> {
    let doc = RecordingDocument::new(&["some text"]);
    let engine = SearchEngine::default();
    let token = CancellationToken::new();

    for query in ["", "   ", "\t\n"] {
        let results = engine.scan(query, &doc, &token).await?;
        assert!(results.is_empty(), "blank query {query:?} should find nothing");
    }
    assert_eq!(doc.page_count_calls(), 0);
    assert!(doc.page_text_calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_scan_no_matches_is_empty_not_error() -> Result<()> {
    let doc = InMemoryDocument::new(["nothing to see", "here either"]);
    let results = SearchEngine::default()
        .scan("xyz123", &doc, &CancellationToken::new())
        .await?;
    assert!(results.is_empty());
    assert_eq!(results.total_pages, 2);
    Ok(())
}

#[tokio::test]
async fn test_scan_orders_by_page_then_offset() -> Result<()> {
    let doc = InMemoryDocument::new([
        "Cat and another cat",
        "no felines",
        "CATALOG of cats: cat cat",
    ]);
    let results = SearchEngine::default()
        .scan("cat", &doc, &CancellationToken::new())
        .await?;

    assert_eq!(
        positions(&results),
        vec![(1, 0), (1, 16), (3, 0), (3, 11), (3, 17), (3, 21)]
    );
    assert_eq!(results.query, "cat");
    assert_eq!(results.get(2).map(|m| m.snippet.as_str()), Some("CATALOG of cats: cat cat"));
    Ok(())
}

#[tokio::test]
async fn test_scan_finds_overlapping_matches() -> Result<()> {
    let doc = InMemoryDocument::new(["aaaa"]);
    let results = SearchEngine::default()
        .scan("AA", &doc, &CancellationToken::new())
        .await?;
    assert_eq!(positions(&results), vec![(1, 0), (1, 1), (1, 2)]);
    Ok(())
}

#[tokio::test]
async fn test_scan_reads_each_page_once_in_order() -> Result<()> {
    let doc = RecordingDocument::new(&["one", "two", "three", "four"]);
    SearchEngine::default()
        .scan("o", &doc, &CancellationToken::new())
        .await?;
    assert_eq!(doc.page_count_calls(), 1);
    assert_eq!(doc.page_text_calls(), vec![1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn test_scan_prefetch_keeps_page_order() -> Result<()> {
    // page 1 answers last, page 5 first
    let doc = RecordingDocument::new(&["x a", "a x", "x a x", "a", "xa"])
        .reverse_latency(Duration::from_millis(5));
    let engine = SearchEngine::default().with_prefetch_pages(5);
    let results = engine.scan("a", &doc, &CancellationToken::new()).await?;

    assert_eq!(
        positions(&results),
        vec![(1, 2), (2, 0), (3, 2), (4, 0), (5, 1)]
    );
    let mut calls = doc.page_text_calls();
    calls.sort_unstable();
    assert_eq!(calls, vec![1, 2, 3, 4, 5], "every page requested exactly once");
    Ok(())
}

#[tokio::test]
async fn test_scan_page_failure_aborts_whole_search() -> Result<()> {
    let doc = RecordingDocument::new(&["hit", "hit", "hit", "hit", "hit"]).failing_on(3);
    let err = SearchEngine::default()
        .scan("hit", &doc, &CancellationToken::new())
        .await
        .expect_err("a failing page must fail the search");

    match &err {
        SearchError::PageAccess { page_number, cause } => {
            assert_eq!(*page_number, 3);
            assert!(cause.to_string().contains("corrupt"));
        }
        other => panic!("expected PageAccess, got {other:?}"),
    }
    assert_eq!(doc.page_text_calls(), vec![1, 2, 3], "no pages scanned after the failure");
    Ok(())
}

#[tokio::test]
async fn test_scan_page_count_failure() -> Result<()> {
    let doc = RecordingDocument::new(&["hit"]).failing_page_count();
    let err = SearchEngine::default()
        .scan("hit", &doc, &CancellationToken::new())
        .await
        .expect_err("page count failure must fail the search");
    assert!(matches!(err, SearchError::PageCountUnavailable(_)));
    assert!(doc.page_text_calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_scan_with_cancelled_token_reads_nothing() -> Result<()> {
    let doc = RecordingDocument::new(&["hit"]);
    let token = CancellationToken::new();
    token.cancel();

    let err = SearchEngine::default()
        .scan("hit", &doc, &token)
        .await
        .expect_err("cancelled scan must not complete");
    assert!(err.is_cancelled());
    assert_eq!(doc.page_count_calls(), 0);
    assert!(doc.page_text_calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_scan_cancelled_while_waiting_for_page() -> Result<()> {
    let gate = Arc::new(Semaphore::new(1));
    let doc = Arc::new(RecordingDocument::new(&["hit", "hit", "hit"]).gated(gate.clone()));
    let token = CancellationToken::new();

    let scan = tokio::spawn({
        let doc = doc.clone();
        let token = token.clone();
        async move { SearchEngine::default().scan("hit", doc.as_ref(), &token).await }
    });

    // page 1 passes the gate, page 2 stalls
    wait_until(|| doc.page_text_calls().len() == 2).await;
    token.cancel();

    let result = scan.await?;
    assert!(matches!(result, Err(SearchError::Cancelled)));
    assert_eq!(doc.page_text_calls(), vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn test_scan_reports_each_page() -> Result<()> {
    let doc = InMemoryDocument::new(["a b a", "b", "a"]);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let results = SearchEngine::default()
        .scan_with_events("a", &doc, &CancellationToken::new(), Some(&tx))
        .await?;
    drop(tx);

    let mut seen = Vec::new();
    while let Some(ScanEvent::PageScanned {
        page_number,
        total_pages,
        matches,
    }) = rx.recv().await
    {
        assert_eq!(total_pages, 3);
        seen.push((page_number, matches.len()));
    }
    assert_eq!(seen, vec![(1, 2), (2, 0), (3, 1)]);
    assert_eq!(results.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_scan_ignores_closed_event_receiver() -> Result<()> {
    let doc = InMemoryDocument::new(["a", "a"]);
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);

    let results = SearchEngine::default()
        .scan_with_events("a", &doc, &CancellationToken::new(), Some(&tx))
        .await?;
    assert_eq!(results.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_scan_matches_greek_final_sigma() -> Result<()> {
    let doc = InMemoryDocument::new(["ΌΛΟΣ ο κόσμος"]);
    let engine = SearchEngine::default();
    let token = CancellationToken::new();

    let results = engine.scan("όλος", &doc, &token).await?;
    assert_eq!(positions(&results), vec![(1, 0)]);
    assert_eq!(results.get(0).map(|m| m.snippet.as_str()), Some("ΌΛΟΣ ο κόσμος"));

    let results = engine.scan("ΚΌΣΜΟΣ", &doc, &token).await?;
    assert_eq!(positions(&results), vec![(1, 7)]);
    Ok(())
}

#[tokio::test]
async fn test_scan_uses_configured_radius() -> Result<()> {
    let doc = InMemoryDocument::new(["0123456789needle0123456789"]);
    let results = SearchEngine::default()
        .with_snippet_radius(3)
        .scan("needle", &doc, &CancellationToken::new())
        .await?;
    assert_eq!(results.get(0).map(|m| m.snippet.as_str()), Some("...789needle012..."));
    Ok(())
}

fn brute_force_offsets(text: &str, query: &str) -> Vec<usize> {
    // final and medial sigma are the same letter for matching
    let fold = |s: &str| -> Vec<char> {
        s.to_lowercase()
            .chars()
            .map(|c| if c == 'ς' { 'σ' } else { c })
            .collect()
    };
    let text = fold(text);
    let query = fold(query);
    if query.len() > text.len() {
        return Vec::new();
    }
    (0..=text.len() - query.len())
        .filter(|&i| text[i..i + query.len()] == query[..])
        .collect()
}

proptest! {
    #[test]
    fn prop_find_matches_is_exhaustive(text in "[abABéÉσςΣüÜ ]{0,60}", query in "[abABéÉσςΣüÜ]{1,4}") {
        let parsed = SearchQuery::parse(&query).unwrap();
        let found: Vec<usize> = find_matches(1, &text, &parsed, 50)
            .iter()
            .map(|m| m.char_offset)
            .collect();
        prop_assert_eq!(found, brute_force_offsets(&text, &query));
    }

    #[test]
    fn prop_scan_results_are_page_ordered(
        pages in proptest::collection::vec("[ab ]{0,30}", 0..6),
        prefetch in 1usize..4,
    ) {
        let doc = InMemoryDocument::new(pages.clone());
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let results = runtime
            .block_on(SearchEngine::default().with_prefetch_pages(prefetch).scan("ab", &doc, &CancellationToken::new()))
            .unwrap();

        let expected: Vec<(u32, usize)> = pages
            .iter()
            .enumerate()
            .flat_map(|(i, text)| {
                brute_force_offsets(text, "ab").into_iter().map(move |o| (i as u32 + 1, o))
            })
            .collect();
        prop_assert_eq!(positions(&results), expected);
    }
}
