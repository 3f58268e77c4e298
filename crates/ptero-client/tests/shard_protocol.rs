//! Integration tests driving the shard state machine over a scripted
//! transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use ptero_api::events::RawFrame;
use ptero_api::resources::WebSocketAuth;
use ptero_client::error::{Error, Result};
use ptero_client::shard::{Shard, ShardState, event};
use ptero_client::transport::{ShardConnector, SocketReader, SocketSink};

/// Everything the mock transport observed, shared with the test body.
#[derive(Default)]
struct TransportLog {
    sent: Mutex<Vec<RawFrame>>,
    opened: AtomicUsize,
    tokens: AtomicUsize,
}

impl TransportLog {
    fn sent_frames(&self) -> Vec<RawFrame> {
        self.sent.lock().unwrap().clone()
    }

    fn auth_tokens(&self) -> Vec<String> {
        self.sent_frames()
            .into_iter()
            .filter(|f| f.event == "auth")
            .flat_map(|f| f.args)
            .collect()
    }
}

/// Hands out one scripted connection per `open` call; auth tokens are
/// numbered in fetch order.
struct ScriptConnector {
    scripts: Mutex<VecDeque<Vec<RawFrame>>>,
    log: Arc<TransportLog>,
}

impl ScriptConnector {
    fn new(scripts: Vec<Vec<RawFrame>>, log: Arc<TransportLog>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            log,
        }
    }
}

#[async_trait]
impl ShardConnector for ScriptConnector {
    async fn fetch_auth(&self) -> Result<WebSocketAuth> {
        let n = self.log.tokens.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(WebSocketAuth {
            token: format!("token-{n}"),
            socket: "wss://node.example/ws".into(),
        })
    }

    async fn open(
        &self,
        _auth: &WebSocketAuth,
    ) -> Result<(Box<dyn SocketReader>, Box<dyn SocketSink>)> {
        let frames = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Shard("no scripted connections left".into()))?;
        self.log.opened.fetch_add(1, Ordering::SeqCst);

        Ok((
            Box::new(ScriptReader {
                frames: frames.into(),
            }),
            Box::new(RecordingSink {
                log: Arc::clone(&self.log),
            }),
        ))
    }
}

struct ScriptReader {
    frames: VecDeque<RawFrame>,
}

#[async_trait]
impl SocketReader for ScriptReader {
    async fn next_frame(&mut self) -> Option<Result<RawFrame>> {
        self.frames.pop_front().map(Ok)
    }
}

struct RecordingSink {
    log: Arc<TransportLog>,
}

#[async_trait]
impl SocketSink for RecordingSink {
    async fn send_frame(&mut self, frame: RawFrame) -> Result<()> {
        self.log.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A connector whose REST auth fetch always fails.
struct BrokenPanel;

#[async_trait]
impl ShardConnector for BrokenPanel {
    async fn fetch_auth(&self) -> Result<WebSocketAuth> {
        Err(Error::Request(
            "panel returned an invalid or unacceptable response (status: 502)".into(),
        ))
    }

    async fn open(
        &self,
        _auth: &WebSocketAuth,
    ) -> Result<(Box<dyn SocketReader>, Box<dyn SocketSink>)> {
        unreachable!("auth never succeeds")
    }
}

fn scripted_shard(scripts: Vec<Vec<RawFrame>>) -> (Shard, Arc<TransportLog>) {
    let log = Arc::new(TransportLog::default());
    let shard = Shard::with_connector(
        "6f54a229",
        Box::new(ScriptConnector::new(scripts, Arc::clone(&log))),
    );
    (shard, log)
}

fn capture(shard: &Shard, name: &'static str) -> Arc<Mutex<Vec<Value>>> {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    shard.add_event(name, move |payload| {
        sink.lock().unwrap().push(payload);
        Ok(())
    });
    captured
}

#[tokio::test]
async fn full_session_with_heartbeat_and_reconnect() {
    // First connection: authenticate, survive a token warning, receive
    // stats, then get expired. Second connection: authenticate, then the
    // server closes.
    let (shard, log) = scripted_shard(vec![
        vec![
            RawFrame::bare("auth success"),
            RawFrame::bare("token expiring"),
            RawFrame::new("stats", vec![r#"{"memory_bytes":1024,"cpu_absolute":1.5}"#.into()]),
            RawFrame::bare("token expired"),
        ],
        vec![RawFrame::bare("auth success")],
    ]);

    let auth_events = capture(&shard, event::AUTH_SUCCESS);
    let stats_events = capture(&shard, event::STATS_UPDATE);

    shard.launch().await.unwrap();

    // Both connections were opened and the shard ends up closed.
    assert_eq!(log.opened.load(Ordering::SeqCst), 2);
    assert_eq!(shard.state(), ShardState::Closed);

    // One auth per connection plus one for the heartbeat, each with a
    // fresh token, all without tearing the first socket down early.
    assert_eq!(log.auth_tokens(), ["token-1", "token-2", "token-3"]);

    // Authenticated once per connection.
    assert_eq!(auth_events.lock().unwrap().len(), 2);
    assert!(shard.ping().is_some());
    assert!(shard.last_authenticated().is_some());

    // The stats payload was JSON-decoded before re-emission.
    let stats = stats_events.lock().unwrap();
    assert_eq!(stats.as_slice(), [json!({"memory_bytes": 1024, "cpu_absolute": 1.5})]);
}

#[tokio::test]
async fn commands_are_noops_while_closed() {
    let (shard, log) = scripted_shard(vec![]);

    shard.send_command("say hi").await.unwrap();
    shard.send_state("start").await.unwrap();
    shard.request_logs().await.unwrap();
    shard.request_stats().await.unwrap();

    assert!(log.sent_frames().is_empty());
    assert_eq!(shard.state(), ShardState::Closed);
}

#[tokio::test]
async fn destroy_is_idempotent_and_forces_closed() {
    let (shard, _log) = scripted_shard(vec![vec![RawFrame::bare("auth success")]]);

    shard.launch().await.unwrap();
    assert_eq!(shard.state(), ShardState::Closed);

    shard.destroy().await;
    shard.destroy().await;
    assert_eq!(shard.state(), ShardState::Closed);
}

#[tokio::test]
async fn daemon_error_without_handler_is_fatal() {
    let (shard, _log) = scripted_shard(vec![vec![
        RawFrame::bare("auth success"),
        RawFrame::new("daemon error", vec!["the daemon exploded".into()]),
    ]]);

    let err = shard.launch().await.unwrap_err();
    match err {
        Error::Shard(detail) => assert_eq!(detail, "the daemon exploded"),
        other => panic!("expected Error::Shard, got {other:?}"),
    }
    assert_eq!(shard.state(), ShardState::Closed);
}

#[tokio::test]
async fn daemon_error_with_handler_keeps_channel_open() {
    let (shard, _log) = scripted_shard(vec![vec![
        RawFrame::bare("auth success"),
        RawFrame::new("jwt error", vec!["token rejected".into()]),
        RawFrame::new("status", vec!["running".into()]),
    ]]);

    let errors = capture(&shard, event::ERROR);
    let statuses = capture(&shard, event::STATUS_UPDATE);

    shard.launch().await.unwrap();

    assert_eq!(errors.lock().unwrap().as_slice(), [json!("token rejected")]);
    // the status frame after the soft error was still dispatched
    assert_eq!(statuses.lock().unwrap().as_slice(), [json!("running")]);
}

#[tokio::test]
async fn unknown_events_are_forwarded_not_dropped() {
    let (shard, _log) = scripted_shard(vec![vec![
        RawFrame::bare("auth success"),
        RawFrame::bare("surprise event"),
    ]]);

    let errors = capture(&shard, event::ERROR);

    shard.launch().await.unwrap();

    assert_eq!(
        errors.lock().unwrap().as_slice(),
        [json!("received unknown event 'surprise event'")]
    );
}

#[tokio::test]
async fn handler_failures_do_not_tear_down_the_channel() {
    let (shard, _log) = scripted_shard(vec![vec![
        RawFrame::bare("auth success"),
        RawFrame::new("console output", vec!["boom".into()]),
        RawFrame::new("status", vec!["running".into()]),
    ]]);

    shard.add_event(event::OUTPUT, |_| Err("consumer bug".into()));
    let statuses = capture(&shard, event::STATUS_UPDATE);

    shard.launch().await.unwrap();

    // dispatch continued past the failing handler
    assert_eq!(statuses.lock().unwrap().as_slice(), [json!("running")]);
}

#[tokio::test]
async fn named_events_demultiplex_with_decoded_payloads() {
    let (shard, _log) = scripted_shard(vec![vec![
        RawFrame::bare("auth success"),
        RawFrame::new("console output", vec!["[Server] ".into(), "ready".into()]),
        RawFrame::bare("install start"),
        RawFrame::new("install output", vec!["unpacking".into()]),
        RawFrame::bare("install completed"),
        RawFrame::new("backup completed", vec![r#"{"checksum":"abc123"}"#.into()]),
        RawFrame::bare("backup completed"),
    ]]);

    let output = capture(&shard, event::OUTPUT);
    let install_start = capture(&shard, event::INSTALL_START);
    let install_log = capture(&shard, event::INSTALL_LOG);
    let install_end = capture(&shard, event::INSTALL_END);
    let backups = capture(&shard, event::BACKUP_COMPLETE);

    shard.launch().await.unwrap();

    // multi-chunk args are joined before re-emission
    assert_eq!(
        output.lock().unwrap().as_slice(),
        [json!("[Server] ready")]
    );
    assert_eq!(install_start.lock().unwrap().len(), 1);
    assert_eq!(install_log.lock().unwrap().as_slice(), [json!("unpacking")]);
    assert_eq!(install_end.lock().unwrap().len(), 1);
    // decoded when present, null when the daemon sends no payload
    assert_eq!(
        backups.lock().unwrap().as_slice(),
        [json!({"checksum": "abc123"}), Value::Null]
    );
}

#[tokio::test]
async fn auth_failure_before_first_success_is_not_retried() {
    let shard = Shard::with_connector("6f54a229", Box::new(BrokenPanel));

    let err = shard.launch().await.unwrap_err();
    assert!(matches!(err, Error::Request(_)));
    assert_eq!(shard.state(), ShardState::Closed);

    // the caller decides whether to relaunch; nothing happened implicitly
    let err = shard.launch().await.unwrap_err();
    assert!(matches!(err, Error::Request(_)));
}

#[tokio::test]
async fn raw_hook_sees_every_frame() {
    let (shard, _log) = scripted_shard(vec![vec![
        RawFrame::bare("auth success"),
        RawFrame::new("status", vec!["offline".into()]),
    ]]);

    let raw = capture(&shard, event::RAW);

    shard.launch().await.unwrap();

    assert_eq!(
        raw.lock().unwrap().as_slice(),
        [
            json!({"event": "auth success", "args": []}),
            json!({"event": "status", "args": ["offline"]}),
        ]
    );
}
