//! Shared types for streaming-props sessions

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One incremental piece of a field's eventual full value
///
/// Upstream sources (SSE payload scanners, provider adapters) emit these in
/// arrival order; the tracker concatenates fragments per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Field name this fragment belongs to
    pub key: String,
    /// Opaque text fragment (may be empty or a partial JSON/UTF-8 piece)
    pub value: String,
}

impl Token {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Lifecycle state of a single expected field
///
/// `NotStarted → Streaming → Complete`, or `NotStarted → Skipped` when the
/// stream finishes without the field ever receiving a token. Serialized
/// camelCase for the JS-facing renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyState {
    /// No token received yet, stream still open
    NotStarted,
    /// At least one token received; the field is (or was most recently) active
    Streaming,
    /// Finished receiving tokens, via key switch or the done signal
    Complete,
    /// Stream finished without this field ever receiving a token
    Skipped,
}

impl KeyState {
    /// Terminal states never transition again within a session
    pub fn is_terminal(self) -> bool {
        matches!(self, KeyState::Complete | KeyState::Skipped)
    }
}

/// Per-field metadata tracked alongside the accumulated value
///
/// Timestamps are wall-clock milliseconds. `stream_started_at` is set once,
/// on the first token ever received for the field; `stream_completed_at` is
/// overwritten on each transition into `Complete` (a field revisited after an
/// implicit completion keeps its original start time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMeta {
    pub state: KeyState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_completed_at: Option<i64>,
}

impl Default for KeyMeta {
    fn default() -> Self {
        Self {
            state: KeyState::NotStarted,
            stream_started_at: None,
            stream_completed_at: None,
        }
    }
}

/// What to do with a token whose key is outside the expected set
///
/// Selected at construction time, not a runtime toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeyPolicy {
    /// Drop the token silently (best-effort rendering keeps going)
    #[default]
    Ignore,
    /// Fail the `process_token` call with [`StreamError::UnknownKey`]
    ///
    /// [`StreamError::UnknownKey`]: crate::error::StreamError::UnknownKey
    Error,
}

/// Owned, serializable view of a session's state
///
/// Safe to hand to subscribers on another task; the renderer reads `props`
/// for the accumulated values and `meta` to pick per-field indicators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub props: IndexMap<String, String>,
    pub meta: IndexMap<String, KeyMeta>,
    pub is_done: bool,
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
