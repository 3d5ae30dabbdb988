//! Query planning for task listings.
//!
//! A [`TaskFilter`] becomes a [`QueryPlan`]: the owner-scoped predicate, an
//! optional text predicate, a sort order, and the pagination window. The
//! plan is pure data; [`crate::repository::TaskRepository`] renders it to SQL.
//!
//! Search text that contains whitespace is a phrase query against the
//! full-text index, ranked by relevance. Anything else is a case-insensitive
//! pattern over title and description, kept in list order.

use regex::Regex;

use crate::errors::{Result, TaskError};
use crate::types::{DEFAULT_LIMIT, DEFAULT_PAGE, PageMeta, TaskFilter, TaskPriority, TaskStatus};

/// Text match strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPredicate {
    /// FTS5 `MATCH` expression holding a single quoted phrase.
    Phrase(String),
    /// Case-insensitive regex applied to title OR description.
    Pattern(String),
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Best relevance first, then position ascending.
    Relevance,
    /// Position ascending.
    Position,
}

/// An owner-scoped, paginated task query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Owner whose live tasks are queried.
    pub owner_id: String,
    /// Exact status term.
    pub status: Option<TaskStatus>,
    /// Exact priority term.
    pub priority: Option<TaskPriority>,
    /// Text term.
    pub text: Option<TextPredicate>,
    /// Ordering.
    pub sort: SortOrder,
    /// Requested page, as given.
    pub page: i64,
    /// Requested page size, as given.
    pub limit: i64,
}

impl QueryPlan {
    /// Plan a listing for `owner_id`.
    ///
    /// Fails with [`TaskError::InvalidArgument`] when a pattern search is not
    /// a valid regular expression.
    pub fn build(owner_id: &str, filter: &TaskFilter) -> Result<Self> {
        let text = filter
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(text_predicate)
            .transpose()?;

        let sort = match text {
            Some(TextPredicate::Phrase(_)) => SortOrder::Relevance,
            _ => SortOrder::Position,
        };

        Ok(Self {
            owner_id: owner_id.to_string(),
            status: filter.status,
            priority: filter.priority,
            text,
            sort,
            page: filter.page.unwrap_or(DEFAULT_PAGE),
            limit: filter.limit.unwrap_or(DEFAULT_LIMIT),
        })
    }

    /// Rows to skip: `(page - 1) * limit`, never negative.
    pub fn offset(&self) -> i64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.limit)
            .max(0)
    }

    /// Rows to return. A non-positive limit returns none.
    pub fn row_limit(&self) -> i64 {
        self.limit.max(0)
    }

    /// Pagination metadata for `total` matching records.
    pub fn meta(&self, total: u64) -> PageMeta {
        PageMeta {
            total,
            page: self.page,
            limit: self.limit,
            pages: page_count(total, self.limit),
        }
    }
}

/// `ceil(total / limit)`, or 0 when `limit` is not positive.
pub fn page_count(total: u64, limit: i64) -> u64 {
    match u64::try_from(limit) {
        Ok(limit) if limit > 0 => total.div_ceil(limit),
        _ => 0,
    }
}

fn text_predicate(search: &str) -> Result<TextPredicate> {
    if search.chars().any(char::is_whitespace) {
        return Ok(TextPredicate::Phrase(phrase_query(search)));
    }
    let pattern = format!("(?i){search}");
    let _ = Regex::new(&pattern).map_err(|e| {
        TaskError::InvalidArgument(format!("search is not a valid pattern: {e}"))
    })?;
    Ok(TextPredicate::Pattern(pattern))
}

/// Quote `text` as one FTS5 phrase.
pub fn phrase_query(text: &str) -> String {
    format!("\"{}\"", text.trim().replace('"', "\"\""))
}
