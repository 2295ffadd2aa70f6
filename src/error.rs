//! Typed errors for streaming-props sessions
//!
//! The tracker itself raises only `UnknownKey`, and only when constructed
//! with the error policy. Everything else that could go wrong with a token
//! (empty fragment, token after done, duplicate done) is defined as a no-op:
//! a degraded render beats a crashed one.

use thiserror::Error;

/// Streaming-props errors with typed variants
#[derive(Debug, Error)]
pub enum StreamError {
    /// A token arrived for a key outside the expected set
    ///
    /// Only raised by trackers constructed with `UnknownKeyPolicy::Error`;
    /// the default policy drops the token instead. Carries the offending key
    /// and the full expected list for diagnostics.
    #[error("unknown key '{key}', expected one of {expected:?}")]
    UnknownKey { key: String, expected: Vec<String> },

    /// The upstream transport failed mid-stream
    ///
    /// Raised by the session driver, never by the tracker. The session is
    /// finished early before this is returned, so every field is already in
    /// a terminal state.
    #[error("transport error: {0}")]
    Transport(String),

    /// Other errors not fitting the above categories
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl StreamError {
    /// Check if this error indicates schema drift (an unexpected key)
    pub fn is_unknown_key(&self) -> bool {
        matches!(self, StreamError::UnknownKey { .. })
    }
}
