//! Full-document text search for paged documents.
//!
//! Pages come from a [`extraction::PageTextProvider`]; a
//! [`query_engine::SearchEngine`] scans them in order for every
//! case-insensitive occurrence of a query, and a [`session::SearchSession`]
//! keeps the one live result set plus the cursor a viewer steps through.

pub mod config;
pub mod data_models;
pub mod errors;
pub mod extraction;
pub mod navigation;
pub mod query_engine;
pub mod session;

pub use data_models::{
    Match, ScanEvent, SearchCursor, SearchHandle, SearchOutcome, SearchPhase, SearchResultSet,
    TextFragment,
};
pub use errors::{ProviderError, SearchError, SearchResult};
pub use extraction::{FragmentSource, FragmentTextAdapter, InMemoryDocument, PageTextProvider};
pub use query_engine::{SearchEngine, SearchQuery};
pub use session::SearchSession;
