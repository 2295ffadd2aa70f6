//! propstream: per-field lifecycle tracking for LLM-streamed component props
//!
//! A model rendering a registered UI component emits the component's props
//! as a JSON object, field by field, character by character. This library
//! turns that live stream into a progressively-filling props map plus
//! per-field lifecycle state (`NotStarted → Streaming → Complete`, or
//! `Skipped` for fields that never arrive), so a renderer can show each
//! field's progress while the response is still streaming.
//!
//! The layers, outermost first:
//! - [`StreamSession`] - async driver; feeds a tracker from a token or SSE
//!   stream and publishes [`Snapshot`]s over a watch channel
//! - [`SseDecoder`] - transport framing; bytes to SSE `data:` payloads
//! - [`FieldScanner`] - raw JSON text deltas to per-field [`Token`]s
//! - [`StreamPropsTracker`] - the core state machine over `(key, fragment)`
//!   tokens
//!
//! Each layer is usable on its own; callers that already have per-field
//! tokens can drive a [`StreamPropsTracker`] directly.

pub mod driver;
pub mod error;
pub mod scanner;
pub mod sse;
pub mod tracker;
pub mod types;

pub use driver::StreamSession;
pub use error::StreamError;
pub use scanner::FieldScanner;
pub use sse::{SseDecoder, SseItem};
pub use tracker::StreamPropsTracker;
pub use types::{KeyMeta, KeyState, Snapshot, Token, UnknownKeyPolicy};
