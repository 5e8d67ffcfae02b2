use std::future::Future;
use std::path::Path;

use crate::data_models::TextFragment;
use crate::errors::ProviderError;

/// Page separator written by `pdftotext` and most text dumps of paged documents.
pub const FORM_FEED: char = '\u{000C}';

/// Supplies the plain text of each page of a loaded document.
///
/// Page numbers are 1-based. Implementations may be slow (rendering, parsing)
/// and are not assumed to cache anything.
pub trait PageTextProvider: Send + Sync {
    fn page_count(&self) -> impl Future<Output = Result<u32, ProviderError>> + Send;

    fn page_text(
        &self,
        page_number: u32,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}

/// Positioned text fragments of each page, in extraction order.
pub trait FragmentSource: Send + Sync {
    fn page_count(&self) -> impl Future<Output = Result<u32, ProviderError>> + Send;

    fn page_fragments(
        &self,
        page_number: u32,
    ) -> impl Future<Output = Result<Vec<TextFragment>, ProviderError>> + Send;
}

/// Joins fragment texts with single spaces, keeping extraction order.
pub fn join_fragments(fragments: &[TextFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<&str>>()
        .join(" ")
}

#[derive(Debug, Clone)]
pub struct FragmentTextAdapter<S> {
    source: S,
}

impl<S: FragmentSource> FragmentTextAdapter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: FragmentSource> PageTextProvider for FragmentTextAdapter<S> {
    async fn page_count(&self) -> Result<u32, ProviderError> {
        self.source.page_count().await
    }

    async fn page_text(&self, page_number: u32) -> Result<String, ProviderError> {
        let fragments = self.source.page_fragments(page_number).await?;
        Ok(join_fragments(&fragments))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryDocument {
    pages: Vec<String>,
}

impl InMemoryDocument {
    pub fn new<I, T>(pages: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a text dump into pages on form feeds.
    ///
    /// A single trailing form feed closes the last page rather than opening an
    /// empty one. Empty input has no pages.
    pub fn from_form_feed_text(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        let body = text.strip_suffix(FORM_FEED).unwrap_or(text);
        Self::new(body.split(FORM_FEED))
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProviderError::new(anyhow::Error::new(e).context(format!("reading {}", path.display())))
        })?;
        let doc = Self::from_form_feed_text(&text);
        log::debug!("loaded {} pages from {}", doc.len(), path.display());
        Ok(doc)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, page_number: u32) -> Option<&str> {
        let idx = (page_number as usize).checked_sub(1)?;
        self.pages.get(idx).map(String::as_str)
    }
}

impl PageTextProvider for InMemoryDocument {
    async fn page_count(&self) -> Result<u32, ProviderError> {
        u32::try_from(self.pages.len())
            .map_err(|_| ProviderError::msg(format!("too many pages: {}", self.pages.len())))
    }

    async fn page_text(&self, page_number: u32) -> Result<String, ProviderError> {
        self.page(page_number)
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::msg(format!(
                    "page {page_number} does not exist (document has {} pages)",
                    self.pages.len()
                ))
            })
    }
}
