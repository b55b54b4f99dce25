//! Cursor-based (keyset) pagination.
//!
//! # Responsibility
//! - Encode/decode opaque cursor tokens.
//! - Bound and filter pre-ordered sources into pages.
//!
//! # Invariants
//! - Sources are ordered by `(created_at DESC, id ASC)`; the id tiebreak is
//!   what keeps pages stable when many rows share a timestamp.
//! - Pages are stable under inserts/deletes ahead of the cursor as long as
//!   ordering keys are immutable once assigned.

pub mod cursor;
pub mod engine;

pub use cursor::{decode_cursor, encode_cursor, CursorError, CursorKey, CursorKeyed};
pub use engine::{CursorPage, PageInfo, PaginationError, Paginator};
