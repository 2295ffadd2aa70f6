//! End-to-end pipeline tests: SSE bytes -> field scanner -> tracker

use propstream::sse::{SseDecoder, SseItem};
use propstream::{
    FieldScanner, KeyState, StreamError, StreamPropsTracker, StreamSession, Token,
    UnknownKeyPolicy,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("propstream=debug")
        .try_init();
}

/// Feed one SSE chunk through decoder and scanner into the tracker
fn feed_chunk(
    decoder: &mut SseDecoder,
    scanner: &mut FieldScanner,
    tracker: &mut StreamPropsTracker,
    chunk: &[u8],
) -> bool {
    for item in decoder.push(chunk) {
        match item {
            SseItem::Done => return true,
            SseItem::Data(payload) => {
                for token in scanner.push(&payload) {
                    tracker.process_token(&token.key, &token.value).unwrap();
                }
            }
        }
    }
    false
}

#[test]
fn sse_chunks_fill_fields_progressively() {
    init_logging();
    let mut decoder = SseDecoder::new();
    let mut scanner = FieldScanner::new();
    let mut tracker = StreamPropsTracker::new(["headline", "body", "cta"]);

    // First event opens the object and starts the headline
    let done = feed_chunk(
        &mut decoder,
        &mut scanner,
        &mut tracker,
        b"data: {\"headline\":\"Big\n\n",
    );
    assert!(!done);
    assert_eq!(tracker.value("headline"), Some("Big"));
    assert_eq!(tracker.key_state("headline"), Some(KeyState::Streaming));
    assert_eq!(tracker.key_state("body"), Some(KeyState::NotStarted));

    // Second event finishes the headline and starts the body; the switch
    // implicitly completes the headline
    let done = feed_chunk(
        &mut decoder,
        &mut scanner,
        &mut tracker,
        b"data: ger\",\"body\":\"It happened\n\n",
    );
    assert!(!done);
    assert_eq!(tracker.value("headline"), Some("Bigger"));
    assert_eq!(tracker.key_state("headline"), Some(KeyState::Complete));
    assert_eq!(tracker.key_state("body"), Some(KeyState::Streaming));

    // Sentinel ends the stream; the body completes, the cta was never
    // touched and is skipped
    let done = feed_chunk(
        &mut decoder,
        &mut scanner,
        &mut tracker,
        b"data: \"}\n\ndata: [DONE]\n\n",
    );
    assert!(done);
    tracker.mark_done();

    assert_eq!(tracker.value("body"), Some("It happened"));
    assert_eq!(tracker.key_state("body"), Some(KeyState::Complete));
    assert_eq!(tracker.key_state("cta"), Some(KeyState::Skipped));
    assert!(tracker.value("cta").is_none());
}

#[test]
fn scanner_escapes_survive_event_boundaries() {
    let mut decoder = SseDecoder::new();
    let mut scanner = FieldScanner::new();
    let mut tracker = StreamPropsTracker::new(["quote"]);

    // The é escape is split across two SSE events
    feed_chunk(
        &mut decoder,
        &mut scanner,
        &mut tracker,
        b"data: {\"quote\":\"caf\\u00\n\n",
    );
    feed_chunk(&mut decoder, &mut scanner, &mut tracker, b"data: e9\"}\n\n");
    tracker.mark_done();

    assert_eq!(tracker.value("quote"), Some("caf\u{e9}"));
    assert_eq!(tracker.key_state("quote"), Some(KeyState::Complete));
}

#[tokio::test]
async fn run_sse_finishes_on_done_sentinel() {
    let chunks: Vec<Result<&[u8], StreamError>> = vec![
        Ok(b"data: {\"name\":\"Alice\",\"email\":\"a@b.com\"}\n\n"),
        Ok(b"data: [DONE]\n\n"),
        // Anything after the sentinel is never read
        Ok(b"data: {\"name\":\"Bob\"}\n\n"),
    ];

    let mut session = StreamSession::new(["name", "email"]);
    let snapshot = session.run_sse(tokio_stream::iter(chunks)).await.unwrap();

    assert!(snapshot.is_done);
    assert_eq!(snapshot.props["name"], "Alice");
    assert_eq!(snapshot.props["email"], "a@b.com");
    assert_eq!(snapshot.meta["name"].state, KeyState::Complete);
    assert_eq!(snapshot.meta["email"].state, KeyState::Complete);
}

#[tokio::test]
async fn run_sse_finishes_on_stream_end_without_sentinel() {
    // Final event has no trailing newline; the decoder's flush recovers it
    let chunks: Vec<Result<&[u8], StreamError>> =
        vec![Ok(b"data: {\"name\":\"Ali\n\n"), Ok(b"data: ce\"}")];

    let mut session = StreamSession::new(["name", "email"]);
    let snapshot = session.run_sse(tokio_stream::iter(chunks)).await.unwrap();

    assert!(snapshot.is_done);
    assert_eq!(snapshot.props["name"], "Alice");
    assert_eq!(snapshot.meta["name"].state, KeyState::Complete);
    assert_eq!(snapshot.meta["email"].state, KeyState::Skipped);
}

#[tokio::test]
async fn run_sse_transport_error_forces_terminal_states() {
    let chunks: Vec<Result<&[u8], StreamError>> = vec![
        Ok(b"data: {\"name\":\"Al\n\n"),
        Err(StreamError::Transport("connection reset".to_string())),
    ];

    let mut session = StreamSession::new(["name", "email"]);
    let err = session.run_sse(tokio_stream::iter(chunks)).await.unwrap_err();
    assert!(matches!(err, StreamError::Transport(_)));

    let snapshot = session.snapshot();
    assert!(snapshot.is_done);
    assert_eq!(snapshot.props["name"], "Al");
    assert_eq!(snapshot.meta["name"].state, KeyState::Complete);
    assert_eq!(snapshot.meta["email"].state, KeyState::Skipped);
}

#[tokio::test]
async fn strict_session_surfaces_schema_drift() {
    let chunks: Vec<Result<&[u8], StreamError>> =
        vec![Ok(b"data: {\"name\":\"Al\",\"intruder\":\"x\"}\n\n")];

    let mut session = StreamSession::with_policy(["name"], UnknownKeyPolicy::Error);
    let err = session.run_sse(tokio_stream::iter(chunks)).await.unwrap_err();

    match err {
        StreamError::UnknownKey { key, expected } => {
            assert_eq!(key, "intruder");
            assert_eq!(expected, vec!["name".to_string()]);
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[tokio::test]
async fn early_finish_acts_as_cancellation() {
    let mut session = StreamSession::new(["name", "email"]);
    session.process_token("name", "Al").unwrap();

    // Caller aborts: remaining fields are forced terminal
    session.finish();
    let snapshot = session.snapshot();
    assert!(snapshot.is_done);
    assert_eq!(snapshot.meta["name"].state, KeyState::Complete);
    assert_eq!(snapshot.meta["email"].state, KeyState::Skipped);

    // Late tokens from the abandoned stream are dropped
    session.process_token("email", "late").unwrap();
    assert_eq!(session.snapshot().props.get("email"), None);
}

#[test]
fn snapshot_serializes_for_the_renderer() {
    let mut tracker = StreamPropsTracker::new(["name", "email"]);
    tracker.process_token("name", "Alice").unwrap();
    tracker.mark_done();

    let json = serde_json::to_value(tracker.snapshot()).unwrap();
    assert_eq!(json["props"]["name"], "Alice");
    assert_eq!(json["meta"]["name"]["state"], "complete");
    assert_eq!(json["meta"]["email"]["state"], "skipped");
    assert_eq!(json["isDone"], true);
    assert!(json["meta"]["name"]["streamStartedAt"].is_i64());
    assert!(json["meta"]["email"].get("streamStartedAt").is_none());
}

#[test]
fn tokens_round_trip_through_serde() {
    let token = Token::new("name", "Al");
    let json = serde_json::to_string(&token).unwrap();
    let back: Token = serde_json::from_str(&json).unwrap();
    assert_eq!(back, token);
}
