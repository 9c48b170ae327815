//! Reader configuration.

use crate::parser::pdf_parser::DEFAULT_MAX_DEPTH;

/// Thresholds for validating a stream's declared `/Length`.
///
/// Both values come from what damaged files in the wild need rather than
/// from the file format, so they are tunable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtentOptions {
    /// Bytes after `start + Length` searched for `endstream`.
    pub lookahead: usize,
    /// Bytes before a bare `endobj` searched for a truncated `endstream`.
    pub endobj_backtrack: usize,
}

impl Default for ExtentOptions {
    fn default() -> Self {
        Self {
            lookahead: 20,
            endobj_backtrack: 16,
        }
    }
}

/// Options for [`PDFDocument`](super::PDFDocument).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// `None` keeps every materialized object until released; `Some(n)`
    /// bounds the cache to `n` objects, evicting least recently used.
    pub cache_capacity: Option<usize>,
    /// Page-tree walks release each node after use.
    pub partial: bool,
    pub extent: ExtentOptions,
    /// Array/dictionary nesting bound.
    pub max_depth: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            cache_capacity: None,
            partial: false,
            extent: ExtentOptions::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ReadOptions {
    #[must_use]
    pub const fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    #[must_use]
    pub const fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    #[must_use]
    pub const fn with_extent(mut self, extent: ExtentOptions) -> Self {
        self.extent = extent;
        self
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
