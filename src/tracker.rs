//! Per-key lifecycle tracking for streamed props
//!
//! This module provides the core state machine that turns a model's
//! incremental emission of a JSON object's fields into a partially-filled
//! props map plus per-field state a renderer can act on.

use indexmap::{IndexMap, IndexSet};

use crate::error::StreamError;
use crate::types::{now_millis, KeyMeta, KeyState, Snapshot, UnknownKeyPolicy};

/// Tracks per-field progress while an object's fields stream in
///
/// The upstream source emits a field's value as a contiguous run of
/// fragments, then moves to the next field, without ever announcing "field X
/// is finished". The tracker infers completion from the key changing, and
/// falls back to [`mark_done`] for the final field and for fields that never
/// received a token (which become `Skipped` rather than silently absent, so
/// the renderer can distinguish "this will never arrive" from "still
/// waiting").
///
/// Exactly one field is active at a time before the done signal; revisiting
/// a previously completed key before done re-opens it as `Streaming` and
/// keeps accumulating.
///
/// [`mark_done`]: StreamPropsTracker::mark_done
#[derive(Debug)]
pub struct StreamPropsTracker {
    /// Declared schema, in render order; all other keys are unknown
    expected: IndexSet<String>,
    policy: UnknownKeyPolicy,
    /// Accumulated value per field; a field appears only after its first token
    props: IndexMap<String, String>,
    /// Lifecycle per expected field; keys are always exactly `expected`
    meta: IndexMap<String, KeyMeta>,
    /// Most recently written-to key, cleared by the done signal
    active: Option<String>,
    done: bool,
}

impl StreamPropsTracker {
    /// Create a tracker with the default unknown-key policy (ignore)
    pub fn new<I, K>(expected_keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::with_policy(expected_keys, UnknownKeyPolicy::Ignore)
    }

    /// Create a tracker with an explicit unknown-key policy
    pub fn with_policy<I, K>(expected_keys: I, policy: UnknownKeyPolicy) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let expected: IndexSet<String> = expected_keys.into_iter().map(Into::into).collect();
        let meta = expected
            .iter()
            .map(|k| (k.clone(), KeyMeta::default()))
            .collect();
        Self {
            expected,
            policy,
            props: IndexMap::new(),
            meta,
            active: None,
            done: false,
        }
    }

    /// Process one `(key, fragment)` token
    ///
    /// Appends the fragment to the key's accumulated value, transitions the
    /// key to `Streaming` on its first-ever token, and implicitly completes
    /// the previously active key when the key switches.
    ///
    /// Tokens arriving after [`mark_done`] are dropped: the session is
    /// frozen. Tokens for unknown keys are dropped or rejected per the
    /// construction-time policy.
    ///
    /// [`mark_done`]: StreamPropsTracker::mark_done
    pub fn process_token(&mut self, key: &str, fragment: &str) -> Result<(), StreamError> {
        if self.done {
            tracing::debug!(key, "dropping token received after done");
            return Ok(());
        }

        if !self.expected.contains(key) {
            return match self.policy {
                UnknownKeyPolicy::Ignore => {
                    tracing::warn!(key, "dropping token for unknown key");
                    Ok(())
                }
                UnknownKeyPolicy::Error => Err(StreamError::UnknownKey {
                    key: key.to_string(),
                    expected: self.expected.iter().cloned().collect(),
                }),
            };
        }

        self.props
            .entry(key.to_string())
            .or_default()
            .push_str(fragment);

        if let Some(meta) = self.meta.get_mut(key) {
            if meta.state != KeyState::Streaming {
                // First start wins: the timestamp is set once, even when a
                // previously completed key is re-opened.
                if meta.stream_started_at.is_none() {
                    meta.stream_started_at = Some(now_millis());
                }
                meta.state = KeyState::Streaming;
                tracing::debug!(key, "field started streaming");
            }
        }

        // Implicit completion on key switch: fields arrive as contiguous
        // runs, so tokens for a new field mean the previous one is done.
        if let Some(previous) = self.active.take() {
            if previous != key {
                if let Some(meta) = self.meta.get_mut(&previous) {
                    if meta.state == KeyState::Streaming {
                        meta.state = KeyState::Complete;
                        meta.stream_completed_at = Some(now_millis());
                        tracing::debug!(key = %previous, "field completed on key switch");
                    }
                }
            }
        }
        self.active = Some(key.to_string());

        Ok(())
    }

    /// Signal that no more tokens will arrive
    ///
    /// Forces every field into a terminal state: `Streaming` fields become
    /// `Complete`, untouched fields become `Skipped`. Idempotent; subsequent
    /// calls and tokens are no-ops.
    pub fn mark_done(&mut self) {
        if self.done {
            return;
        }

        let now = now_millis();
        for (key, meta) in self.meta.iter_mut() {
            match meta.state {
                KeyState::Streaming => {
                    meta.state = KeyState::Complete;
                    meta.stream_completed_at = Some(now);
                    tracing::debug!(key = %key, "field completed on done");
                }
                KeyState::NotStarted => {
                    meta.state = KeyState::Skipped;
                    tracing::debug!(key = %key, "field skipped, never received a token");
                }
                KeyState::Complete | KeyState::Skipped => {}
            }
        }

        self.active = None;
        self.done = true;
    }

    /// Accumulated values, keyed by field name
    pub fn props(&self) -> &IndexMap<String, String> {
        &self.props
    }

    /// Per-field lifecycle metadata; keys are exactly the expected set
    pub fn meta(&self) -> &IndexMap<String, KeyMeta> {
        &self.meta
    }

    /// Accumulated value for one field, if any token has arrived for it
    pub fn value(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// Lifecycle state for one expected field
    pub fn key_state(&self, key: &str) -> Option<KeyState> {
        self.meta.get(key).map(|m| m.state)
    }

    /// The most recently written-to key, if the stream is still open
    pub fn active_key(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Whether the done signal has been received
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The declared schema, in declaration order
    pub fn expected_keys(&self) -> impl Iterator<Item = &str> {
        self.expected.iter().map(String::as_str)
    }

    /// Owned view of the current state, safe to hand to another task
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            props: self.props.clone(),
            meta: self.meta.clone(),
            is_done: self.done,
        }
    }
}
