//! Async session driver
//!
//! Owns a tracker, feeds it from a stream, and publishes a fresh
//! [`Snapshot`] over a watch channel after every mutation. The renderer
//! side subscribes and reacts to snapshot changes; the session side keeps
//! the single-writer discipline the tracker assumes.

use futures::{pin_mut, Stream, StreamExt};
use tokio::sync::watch;

use crate::error::StreamError;
use crate::scanner::FieldScanner;
use crate::sse::{SseDecoder, SseItem};
use crate::tracker::StreamPropsTracker;
use crate::types::{Snapshot, Token, UnknownKeyPolicy};

/// One streaming response being tracked and published to subscribers
///
/// Scoped to a single response; create a new session for the next one.
pub struct StreamSession {
    tracker: StreamPropsTracker,
    tx: watch::Sender<Snapshot>,
}

impl StreamSession {
    /// Create a session with the default unknown-key policy (ignore)
    pub fn new<I, K>(expected_keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::with_policy(expected_keys, UnknownKeyPolicy::Ignore)
    }

    pub fn with_policy<I, K>(expected_keys: I, policy: UnknownKeyPolicy) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let tracker = StreamPropsTracker::with_policy(expected_keys, policy);
        let (tx, _) = watch::channel(tracker.snapshot());
        Self { tracker, tx }
    }

    /// Subscribe to snapshot updates
    ///
    /// The receiver holds the latest snapshot at all times; slow readers
    /// observe the newest state, not every intermediate one.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// Current state of the session
    pub fn snapshot(&self) -> Snapshot {
        self.tracker.snapshot()
    }

    /// Feed one token and publish the updated snapshot
    ///
    /// A rejected token (strict unknown-key policy) leaves the session
    /// unchanged and publishes nothing.
    pub fn process_token(&mut self, key: &str, fragment: &str) -> Result<(), StreamError> {
        self.tracker.process_token(key, fragment)?;
        self.publish();
        Ok(())
    }

    /// Force every remaining field into a terminal state and publish
    ///
    /// Safe to call early (cancellation) and more than once.
    pub fn finish(&mut self) {
        self.tracker.mark_done();
        self.publish();
    }

    /// Drive the session from a token stream until it ends
    ///
    /// Tokens are applied strictly sequentially in arrival order. When the
    /// stream ends the session is finished. An `Err` item finishes the
    /// session early (all fields forced terminal) and surfaces as
    /// [`StreamError::Transport`].
    pub async fn run_tokens<S>(&mut self, stream: S) -> Result<Snapshot, StreamError>
    where
        S: Stream<Item = Result<Token, StreamError>>,
    {
        pin_mut!(stream);
        while let Some(item) = stream.next().await {
            match item {
                Ok(token) => self.process_token(&token.key, &token.value)?,
                Err(e) => {
                    tracing::warn!(error = %e, "upstream failed, finishing session early");
                    self.finish();
                    return Err(StreamError::Transport(e.to_string()));
                }
            }
        }
        self.finish();
        Ok(self.snapshot())
    }

    /// Drive the session from an SSE byte-chunk stream until it ends
    ///
    /// Each decoded `data:` payload is treated as a raw text delta of the
    /// streamed JSON object and scanned into per-field tokens. The `[DONE]`
    /// sentinel or the end of the stream finishes the session.
    pub async fn run_sse<S, B>(&mut self, stream: S) -> Result<Snapshot, StreamError>
    where
        S: Stream<Item = Result<B, StreamError>>,
        B: AsRef<[u8]>,
    {
        let mut decoder = SseDecoder::new();
        let mut scanner = FieldScanner::new();
        let mut saw_done = false;

        pin_mut!(stream);
        'chunks: while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(error = %e, "transport failed, finishing session early");
                    self.finish();
                    return Err(StreamError::Transport(e.to_string()));
                }
            };
            for item in decoder.push(chunk.as_ref()) {
                match item {
                    SseItem::Done => {
                        saw_done = true;
                        break 'chunks;
                    }
                    SseItem::Data(payload) => self.scan_payload(&mut scanner, &payload)?,
                }
            }
        }

        if !saw_done {
            for item in decoder.finish() {
                if let SseItem::Data(payload) = item {
                    self.scan_payload(&mut scanner, &payload)?;
                }
            }
        }

        self.finish();
        Ok(self.snapshot())
    }

    fn scan_payload(
        &mut self,
        scanner: &mut FieldScanner,
        payload: &str,
    ) -> Result<(), StreamError> {
        for token in scanner.push(payload) {
            self.process_token(&token.key, &token.value)?;
        }
        Ok(())
    }

    fn publish(&self) {
        // send_replace stores the value even with no receivers alive, so a
        // late subscriber still starts from the latest state
        self.tx.send_replace(self.tracker.snapshot());
    }
}
