//! Opaque cursor token codec.
//!
//! A token is URL-safe base64 (no padding) of a small JSON object
//! `{"created_at": <epoch ms>, "id": "<uuid>"}` naming the last item of the
//! previous page.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Ordering key of one row under `(created_at DESC, id ASC)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorKey {
    pub created_at: i64,
    pub id: Uuid,
}

impl CursorKey {
    pub fn new(created_at: i64, id: Uuid) -> Self {
        Self { created_at, id }
    }

    /// Returns whether `candidate` sorts strictly after `self`.
    ///
    /// Newer timestamps come first; equal timestamps are ordered by id
    /// ascending, so rows sharing one timestamp are never skipped.
    pub fn admits(&self, candidate: &CursorKey) -> bool {
        candidate.created_at < self.created_at
            || (candidate.created_at == self.created_at && candidate.id > self.id)
    }
}

/// Anything listable through the cursor engine.
pub trait CursorKeyed {
    fn cursor_key(&self) -> CursorKey;
}

impl CursorKeyed for CursorKey {
    fn cursor_key(&self) -> CursorKey {
        *self
    }
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("invalid cursor format: empty token")]
    Empty,
    #[error("invalid cursor format: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("invalid cursor format: {0}")]
    Payload(#[from] serde_json::Error),
}

pub fn encode_cursor(key: &CursorKey) -> String {
    // Serializing an i64 and a Uuid cannot fail.
    let payload = serde_json::json!({
        "created_at": key.created_at,
        "id": key.id,
    });
    URL_SAFE_NO_PAD.encode(payload.to_string())
}

pub fn decode_cursor(token: &str) -> Result<CursorKey, CursorError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CursorError::Empty);
    }
    let bytes = URL_SAFE_NO_PAD.decode(token)?;
    let key = serde_json::from_slice::<CursorKey>(&bytes)?;
    Ok(key)
}
