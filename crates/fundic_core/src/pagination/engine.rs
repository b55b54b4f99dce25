//! Keyset pagination over `(created_at DESC, id ASC)` ordered sources.
//!
//! # Contract
//! - The source is already ordered; the engine never sorts. It only applies
//!   the strictly-after-cursor filter and bounds the page.
//! - Out-of-range limits are replaced with the configured default, not
//!   rejected.
//! - `limit + 1` rows are fetched so `has_more` needs no count query.
//! - `next_cursor` encodes the last item of the returned page and is `None`
//!   whenever `has_more` is false.

use super::cursor::{decode_cursor, encode_cursor, CursorError, CursorKey, CursorKeyed};
use crate::config::PaginationConfig;
use crate::repo::{RepoError, RepoResult};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(#[from] CursorError),
    #[error(transparent)]
    Storage(#[from] RepoError),
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Decoded view of a cursor, for diagnostics and API envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub limit: u32,
    pub is_first_page: bool,
    pub cursor_created_at: Option<i64>,
    pub cursor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    config: PaginationConfig,
}

impl Paginator {
    pub fn new(config: PaginationConfig) -> Self {
        Self { config }
    }

    /// Clamps a caller-supplied page size.
    ///
    /// `limit < 1` or `limit > max_limit` yields `default_limit`.
    pub fn normalize_limit(&self, limit: i64) -> u32 {
        if limit < 1 || limit > i64::from(self.config.max_limit) {
            self.config.default_limit
        } else {
            // In range 1..=max_limit, which fits u32.
            limit as u32
        }
    }

    /// Runs one page fetch.
    ///
    /// `fetch(after, n)` must return at most `n` rows in
    /// `(created_at DESC, id ASC)` order, each admitted by `after` when set.
    pub fn paginate<T, F>(
        &self,
        cursor: Option<&str>,
        limit: i64,
        fetch: F,
    ) -> Result<CursorPage<T>, PaginationError>
    where
        T: CursorKeyed,
        F: FnOnce(Option<&CursorKey>, u32) -> RepoResult<Vec<T>>,
    {
        let limit = self.normalize_limit(limit);
        let after = match cursor {
            Some(token) => Some(decode_cursor(token)?),
            None => None,
        };

        let mut items = fetch(after.as_ref(), limit.saturating_add(1))?;
        let has_more = items.len() > limit as usize;
        if has_more {
            items.truncate(limit as usize);
        }

        let next_cursor = if has_more {
            items.last().map(|item| encode_cursor(&item.cursor_key()))
        } else {
            None
        };

        Ok(CursorPage {
            items,
            next_cursor,
            has_more,
        })
    }

    /// Pages through an in-memory slice already sorted by
    /// `(created_at DESC, id ASC)`.
    pub fn paginate_sorted<T>(
        &self,
        sorted: &[T],
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<CursorPage<T>, PaginationError>
    where
        T: CursorKeyed + Clone,
    {
        self.paginate(cursor, limit, |after, fetch_limit| {
            Ok(sorted
                .iter()
                .filter(|item| after.map_or(true, |key| key.admits(&item.cursor_key())))
                .take(fetch_limit as usize)
                .cloned()
                .collect())
        })
    }

    /// Describes a cursor without fetching. Undecodable cursors are reported
    /// as a non-first page with no position.
    pub fn page_info(&self, cursor: Option<&str>, limit: i64) -> PageInfo {
        let decoded = cursor.and_then(|token| decode_cursor(token).ok());
        PageInfo {
            limit: self.normalize_limit(limit),
            is_first_page: cursor.is_none(),
            cursor_created_at: decoded.map(|key| key.created_at),
            cursor_id: decoded.map(|key| key.id),
        }
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PaginationConfig::default())
    }
}
