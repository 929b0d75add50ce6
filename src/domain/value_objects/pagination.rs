//! History pagination parameters and result pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of messages per page
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Which side of the reference timestamp a page is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Older than the reference, walking back from it (newest first)
    #[default]
    Before,
    /// Newer than the reference, walking forward from it (oldest first)
    After,
}

/// A page request over one chat's history.
///
/// `reference` is exclusive. Without one, `Before` starts at the newest
/// message and `After` at the oldest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
    pub direction: Direction,
    pub reference: Option<DateTime<Utc>>,
    pub offset: u32,
    pub limit: u32,
}

impl PageParams {
    /// The `limit` most recent messages.
    pub fn latest(limit: u32) -> Self {
        Self {
            direction: Direction::Before,
            reference: None,
            offset: 0,
            limit,
        }
    }

    /// Messages older than `reference`.
    pub fn before(reference: DateTime<Utc>, limit: u32) -> Self {
        Self {
            reference: Some(reference),
            ..Self::latest(limit)
        }
    }

    /// Messages newer than `reference`.
    pub fn after(reference: DateTime<Utc>, limit: u32) -> Self {
        Self {
            direction: Direction::After,
            reference: Some(reference),
            offset: 0,
            limit,
        }
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Force `limit` into `1..=max_limit`.
    pub fn clamped(mut self, max_limit: u32) -> Self {
        self.limit = self.limit.clamp(1, max_limit.max(1));
        self
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::latest(DEFAULT_PAGE_LIMIT)
    }
}

/// Which history tier produced a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    Fast,
    Durable,
}

impl HistorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Durable => "durable",
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in ascending creation order
    pub items: Vec<T>,
    /// Number of items matching the window filter, when the tier knows it
    pub total: Option<u64>,
    /// Whether another page exists further along the direction
    pub has_more: bool,
    pub source: HistorySource,
}

impl<T> Page<T> {
    /// Build a page, deriving `has_more` from `total` when known and from a full
    /// page otherwise.
    pub fn new(
        items: Vec<T>,
        params: &PageParams,
        total: Option<u64>,
        source: HistorySource,
    ) -> Self {
        let has_more = match total {
            Some(total) => u64::from(params.offset) + (items.len() as u64) < total,
            None => items.len() as u64 >= u64::from(params.limit),
        };
        Self {
            items,
            total,
            has_more,
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            has_more: self.has_more,
            source: self.source,
        }
    }
}
