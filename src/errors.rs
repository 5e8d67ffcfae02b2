use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a page text provider.
///
/// Wraps the collaborator's own error so the original cause survives the trip
/// through the engine. Cloneable so a failed outcome can be handed to several
/// observers.
#[derive(Debug, Clone)]
pub struct ProviderError(Arc<anyhow::Error>);

impl ProviderError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(err.into()))
    }

    pub fn msg(message: impl fmt::Display) -> Self {
        Self(Arc::new(anyhow::anyhow!("{message}")))
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        (**self.0).source()
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err)
    }
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("failed to read text of page {page_number}: {cause}")]
    PageAccess {
        page_number: u32,
        #[source]
        cause: ProviderError,
    },

    #[error("failed to read the page count: {0}")]
    PageCountUnavailable(#[source] ProviderError),

    #[error("search was cancelled")]
    Cancelled,

    #[error("match index {index} is out of range (result set has {len} matches)")]
    IndexOutOfRange { index: usize, len: usize },
}

impl SearchError {
    /// Page that failed, for errors tied to a single page.
    pub fn page_number(&self) -> Option<u32> {
        match self {
            SearchError::PageAccess { page_number, .. } => Some(*page_number),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Cancelled)
    }
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;
