//! Shard session driver
//!
//! Owns one gateway session identified by `(shard_id, shard_count)`. The
//! driver task dials, performs the handshake, then runs the read loop while
//! a separate task beats the heart. Transport failures feed the reconnect
//! loop; protocol-fatal close codes stop the shard.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use courier_common::GatewaySettings;

use crate::error::{GatewayError, GatewayResult};
use crate::events::{EventKind, RawEvent, ShardPayload};
use crate::limiter::{BucketStore, Ticket, TicketPool};
use crate::protocol::{
    GatewayMessage, IdentifyPayload, IdentifyProperties, OpCode, RequestGuildMembersPayload,
    ResumePayload, StatusUpdate,
};
use crate::shard::connection::{self, GatewayReader, GatewayWriter};
use crate::shard::{Backoff, ShardState};

/// Identify bucket refill interval mandated by the platform
const IDENTIFY_REFILL: Duration = Duration::from_secs(5);

/// Shared identify limits, owned by the manager
pub struct SessionLimits {
    buckets: BucketStore,
    tickets: TicketPool,
    max_concurrency: u32,
}

impl SessionLimits {
    /// Create limits for a session-start configuration
    #[must_use]
    pub fn new(max_concurrent_identifies: usize, max_concurrency: u32) -> Self {
        Self {
            buckets: BucketStore::new(),
            tickets: TicketPool::new(max_concurrent_identifies),
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Identify ratelimit bucket key for a shard
    #[must_use]
    pub fn bucket_key(&self, shard_id: u32) -> String {
        format!("gateway/identify/{}", shard_id % self.max_concurrency)
    }

    /// Block until the shard's identify bucket has a token
    pub async fn wait_for_identify(&self, shard_id: u32) {
        self.buckets
            .wait_for_bucket(&self.bucket_key(shard_id), 1, IDENTIFY_REFILL)
            .await;
    }

    /// Acquire a handshake concurrency ticket
    pub async fn acquire_ticket(&self) -> Ticket {
        self.tickets.acquire().await
    }
}

/// Configuration for one shard
pub struct ShardConfig {
    pub shard_id: u32,
    pub shard_count: u32,
    /// Token including the `Bot ` prefix
    pub token: String,
    pub gateway_url: String,
    pub settings: GatewaySettings,
    pub presence: Option<StatusUpdate>,
    pub event_tx: mpsc::Sender<RawEvent>,
    pub limits: Arc<SessionLimits>,
    /// Reconnect under backoff on transient errors
    pub reconnect: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum OpenStatus {
    Pending,
    Ready,
    Failed,
}

enum SessionEnd {
    Shutdown,
    Reconnect,
}

/// A single gateway session
#[derive(Clone)]
pub struct Shard {
    inner: Arc<ShardInner>,
}

struct ShardInner {
    shard_id: u32,
    shard_count: u32,
    token: String,
    gateway_url: String,
    settings: GatewaySettings,
    presence: Option<StatusUpdate>,
    event_tx: mpsc::Sender<RawEvent>,
    limits: Arc<SessionLimits>,
    reconnect: bool,

    started: AtomicBool,
    state: StdMutex<ShardState>,
    sequence: AtomicU64,
    session_id: StdMutex<Option<String>>,
    last_ack: StdMutex<Instant>,
    last_sent: StdMutex<Instant>,
    writer: StdMutex<Option<Arc<GatewayWriter>>>,
    status_tx: watch::Sender<OpenStatus>,
    shutdown_tx: watch::Sender<bool>,
    error: StdMutex<Option<GatewayError>>,
}

impl Shard {
    /// Create a shard; the session starts on [`Shard::open`]
    #[must_use]
    pub fn new(config: ShardConfig) -> Self {
        let (status_tx, _) = watch::channel(OpenStatus::Pending);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(ShardInner {
                shard_id: config.shard_id,
                shard_count: config.shard_count,
                token: config.token,
                gateway_url: config.gateway_url,
                settings: config.settings,
                presence: config.presence,
                event_tx: config.event_tx,
                limits: config.limits,
                reconnect: config.reconnect,
                started: AtomicBool::new(false),
                state: StdMutex::new(ShardState::Disconnected),
                sequence: AtomicU64::new(0),
                session_id: StdMutex::new(None),
                last_ack: StdMutex::new(Instant::now()),
                last_sent: StdMutex::new(Instant::now()),
                writer: StdMutex::new(None),
                status_tx,
                shutdown_tx,
                error: StdMutex::new(None),
            }),
        }
    }

    /// Shard id within the shard count
    #[must_use]
    pub fn id(&self) -> u32 {
        self.inner.shard_id
    }

    /// Current protocol state
    #[must_use]
    pub fn state(&self) -> ShardState {
        *self.inner.state.lock().unwrap()
    }

    /// Round-trip time between the last heartbeat and its ack
    #[must_use]
    pub fn heartbeat_latency(&self) -> Duration {
        let ack = *self.inner.last_ack.lock().unwrap();
        let sent = *self.inner.last_sent.lock().unwrap();
        ack.saturating_duration_since(sent)
    }

    /// Open the shard; blocks until the session has produced at least one
    /// READY (or RESUMED), or until a terminal error with reconnect
    /// disabled
    pub async fn open(&self) -> GatewayResult<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::AlreadyOpen);
        }
        if self.inner.shard_id >= self.inner.shard_count {
            return Err(GatewayError::ShardBounds {
                shard_id: self.inner.shard_id,
                shard_count: self.inner.shard_count,
            });
        }

        let mut status_rx = self.inner.status_tx.subscribe();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run().await });

        loop {
            let status = status_rx.borrow().clone();
            match status {
                OpenStatus::Ready => return Ok(()),
                OpenStatus::Failed => return Err(self.inner.take_error()),
                OpenStatus::Pending => {}
            }
            if status_rx.changed().await.is_err() {
                return Err(self.inner.take_error());
            }
        }
    }

    /// Close the session; idempotent and unblocks the read loop
    pub async fn close(&self, code: u16) {
        tracing::info!(shard = self.inner.shard_id, code = code, "Closing shard");
        let _ = self.inner.shutdown_tx.send(true);

        let writer = self.inner.writer.lock().unwrap().clone();
        if let Some(writer) = writer {
            let _ = writer.close(code).await;
        }
    }

    /// Send an out-of-band guild-member request (op=8)
    pub async fn request_guild_members(
        &self,
        guild_id: impl Into<String>,
        query: impl Into<String>,
        limit: u32,
    ) -> GatewayResult<()> {
        let message = GatewayMessage::request_guild_members(&RequestGuildMembersPayload {
            guild_id: guild_id.into(),
            query: query.into(),
            limit,
        })?;
        self.inner.write(&message).await
    }

    /// Send a presence update (op=3)
    pub async fn update_status(&self, status: &StatusUpdate) -> GatewayResult<()> {
        let message = GatewayMessage::presence_update(status)?;
        self.inner.write(&message).await
    }
}

impl ShardInner {
    fn set_state(&self, state: ShardState) {
        *self.state.lock().unwrap() = state;
    }

    fn take_error(&self) -> GatewayError {
        self.error
            .lock()
            .unwrap()
            .take()
            .unwrap_or(GatewayError::NotConnected)
    }

    fn touch_ack(&self) {
        *self.last_ack.lock().unwrap() = Instant::now();
    }

    fn touch_sent(&self) {
        *self.last_sent.lock().unwrap() = Instant::now();
    }

    fn can_resume(&self) -> bool {
        self.sequence.load(Ordering::SeqCst) != 0 && self.session_id.lock().unwrap().is_some()
    }

    async fn write(&self, message: &GatewayMessage) -> GatewayResult<()> {
        let writer = self.writer.lock().unwrap().clone();
        match writer {
            Some(writer) => writer.send(message).await,
            None => Err(GatewayError::NotConnected),
        }
    }

    async fn forward(&self, event: RawEvent) -> GatewayResult<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| GatewayError::QueueClosed)
    }

    async fn forward_shard_event(&self, kind: EventKind, payload: ShardPayload) {
        let data = match serde_json::to_value(&payload) {
            Ok(data) => data,
            Err(_) => return,
        };
        // Best-effort: the queue is gone during shutdown
        let _ = self.forward(RawEvent::synthetic(self.shard_id, kind, data)).await;
    }

    /// Reconnect driver; exits on shutdown or a protocol-fatal error
    async fn run(self: Arc<Self>) {
        let mut backoff = Backoff::new();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.run_session(&mut shutdown_rx).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Reconnect) => {
                    self.set_state(ShardState::Reconnecting);
                    backoff.reset();
                }
                Err(e) if e.is_terminal() => {
                    tracing::error!(
                        shard = self.shard_id,
                        error = %e,
                        "Shard stopped on protocol-fatal error"
                    );
                    *self.error.lock().unwrap() = Some(e);
                    let _ = self.status_tx.send(OpenStatus::Failed);
                    break;
                }
                Err(e) => {
                    if !self.reconnect {
                        tracing::error!(shard = self.shard_id, error = %e, "Shard setup failed");
                        *self.error.lock().unwrap() = Some(e);
                        let _ = self.status_tx.send(OpenStatus::Failed);
                        break;
                    }

                    let delay = backoff.next();
                    tracing::warn!(
                        shard = self.shard_id,
                        error = %e,
                        delay_secs = delay.as_secs(),
                        "Session error, reconnecting after backoff"
                    );
                    self.set_state(ShardState::Reconnecting);

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown_rx.changed() => break,
                    }
                }
            }
        }

        self.set_state(ShardState::Stopped);
        *self.writer.lock().unwrap() = None;

        // A shutdown before the first READY must still unblock open()
        if *self.status_tx.borrow() == OpenStatus::Pending {
            let _ = self.status_tx.send(OpenStatus::Failed);
        }
    }

    /// One connection attempt: handshake, identify/resume, then the read
    /// loop until the session ends
    async fn run_session(
        self: &Arc<Self>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> GatewayResult<SessionEnd> {
        tracing::debug!(shard = self.shard_id, "Waiting for identify ratelimit");
        self.limits.wait_for_identify(self.shard_id).await;

        tracing::debug!(shard = self.shard_id, "Waiting for concurrent handshake ticket");
        let mut ticket = Some(self.limits.acquire_ticket().await);

        tracing::info!(shard = self.shard_id, url = %self.gateway_url, "Connecting to gateway");
        let (writer, mut reader) = connection::connect(&self.gateway_url).await?;
        let writer = Arc::new(writer);
        *self.writer.lock().unwrap() = Some(Arc::clone(&writer));
        self.set_state(ShardState::AwaitHello);

        self.forward_shard_event(EventKind::ShardConnect, ShardPayload::new(self.shard_id))
            .await;

        // First inbound frame must be Hello
        let first = reader
            .next()
            .await?
            .ok_or_else(|| GatewayError::protocol("connection closed before hello"))?;
        let hello = first.as_hello().ok_or_else(|| {
            GatewayError::protocol(format!("expected op 10, got {}", first.op))
        })?;
        let interval = Duration::from_millis(hello.heartbeat_interval);
        tracing::debug!(
            shard = self.shard_id,
            heartbeat_ms = hello.heartbeat_interval,
            "Received hello"
        );
        self.touch_ack();

        if self.can_resume() {
            let sequence = self.sequence.load(Ordering::SeqCst);
            let session_id = self
                .session_id
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_default();
            tracing::debug!(
                shard = self.shard_id,
                session = %session_id,
                seq = sequence,
                "Sending resume"
            );
            writer
                .send(&GatewayMessage::resume(&ResumePayload {
                    token: self.token.clone(),
                    session_id,
                    seq: sequence,
                })?)
                .await?;
            self.set_state(ShardState::AwaitResumed);
        } else {
            tracing::debug!(shard = self.shard_id, "Sending identify");
            self.send_identify(&writer).await?;
            self.set_state(ShardState::AwaitReady);
        }

        // Heartbeat task; any failure reported over the channel closes the
        // session with 4000
        let (dead_tx, mut dead_rx) = mpsc::channel::<()>(1);
        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(self),
            Arc::clone(&writer),
            interval,
            dead_tx,
        ));

        let result = self
            .read_loop(&mut reader, &writer, &mut ticket, shutdown_rx, &mut dead_rx)
            .await;

        heartbeat.abort();
        *self.writer.lock().unwrap() = None;
        self.set_state(ShardState::Disconnected);

        let code = match &result {
            Ok(SessionEnd::Shutdown) => 1000,
            Ok(SessionEnd::Reconnect) => 4000,
            Err(GatewayError::Closed(code)) => code.as_u16(),
            Err(_) => 4000,
        };
        self.forward_shard_event(
            EventKind::ShardDisconnect,
            ShardPayload::disconnect(self.shard_id, code),
        )
        .await;

        result
    }

    async fn read_loop(
        self: &Arc<Self>,
        reader: &mut GatewayReader,
        writer: &Arc<GatewayWriter>,
        ticket: &mut Option<Ticket>,
        shutdown_rx: &mut watch::Receiver<bool>,
        dead_rx: &mut mpsc::Receiver<()>,
    ) -> GatewayResult<SessionEnd> {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    let _ = writer.close(1000).await;
                    return Ok(SessionEnd::Shutdown);
                }
                _ = dead_rx.recv() => {
                    tracing::error!(
                        shard = self.shard_id,
                        "No heartbeat ack, closing with 4000"
                    );
                    let _ = writer.close(4000).await;
                    return Ok(SessionEnd::Reconnect);
                }
                frame = reader.next() => {
                    let message = frame?
                        .ok_or_else(|| GatewayError::protocol("connection closed"))?;
                    if let Some(end) = self.handle_frame(message, writer, ticket).await? {
                        return Ok(end);
                    }
                }
            }
        }
    }

    async fn handle_frame(
        self: &Arc<Self>,
        message: GatewayMessage,
        writer: &Arc<GatewayWriter>,
        ticket: &mut Option<Ticket>,
    ) -> GatewayResult<Option<SessionEnd>> {
        match message.op {
            OpCode::Dispatch => {
                if let Some(sequence) = message.s {
                    self.sequence.store(sequence, Ordering::SeqCst);
                }

                let kind = message.t.clone().unwrap_or_default();
                match kind.as_str() {
                    "READY" => {
                        if let Some(session_id) = message
                            .d
                            .as_ref()
                            .and_then(|d| d.get("session_id"))
                            .and_then(|s| s.as_str())
                        {
                            *self.session_id.lock().unwrap() = Some(session_id.to_string());
                        }
                        self.mark_running(ticket);
                        tracing::info!(shard = self.shard_id, "Session ready");
                    }
                    "RESUMED" => {
                        self.mark_running(ticket);
                        tracing::info!(shard = self.shard_id, "Session resumed");
                    }
                    _ => {}
                }

                self.forward(RawEvent::dispatch(
                    self.shard_id,
                    message.s.unwrap_or(0),
                    kind,
                    message.d.unwrap_or(serde_json::Value::Null),
                ))
                .await?;
            }
            OpCode::Heartbeat => {
                // The gateway asked for an immediate beat
                let sequence = self.sequence.load(Ordering::SeqCst);
                writer.send(&GatewayMessage::heartbeat(sequence)).await?;
            }
            OpCode::Reconnect => {
                tracing::info!(shard = self.shard_id, "Gateway requested reconnect");
                let _ = writer.close(4000).await;
                return Ok(Some(SessionEnd::Reconnect));
            }
            OpCode::InvalidSession => {
                let resumable = message.as_invalid_session().unwrap_or(false);
                tracing::warn!(
                    shard = self.shard_id,
                    resumable = resumable,
                    "Session invalidated"
                );
                if !resumable {
                    *self.session_id.lock().unwrap() = None;
                    self.sequence.store(0, Ordering::SeqCst);
                }
                self.set_state(ShardState::Identifying);
                self.send_identify(writer).await?;
            }
            OpCode::HeartbeatAck => {
                self.touch_ack();
            }
            OpCode::Hello => {
                // Handled during the handshake
                tracing::debug!(shard = self.shard_id, "Ignoring duplicate hello");
            }
            other => {
                tracing::warn!(shard = self.shard_id, op = %other, "Unexpected op");
            }
        }

        Ok(None)
    }

    fn mark_running(&self, ticket: &mut Option<Ticket>) {
        self.set_state(ShardState::Running);
        let _ = self.status_tx.send(OpenStatus::Ready);
        // Handshake finished, free the concurrency slot
        ticket.take();
    }

    async fn send_identify(&self, writer: &GatewayWriter) -> GatewayResult<()> {
        let payload = IdentifyPayload {
            token: self.token.clone(),
            properties: IdentifyProperties::default(),
            compress: self.settings.compress,
            large_threshold: self.settings.large_threshold,
            shard: Some([self.shard_id, self.shard_count]),
            presence: self.presence.clone(),
            guild_subscriptions: self.settings.guild_subscriptions,
            intents: self.settings.intents,
        };
        writer.send(&GatewayMessage::identify(&payload)?).await
    }
}

/// Heartbeat timer task
///
/// Sends op=1 with the last observed sequence every interval. Reports over
/// `dead_tx` when the ack deadline passes or a write fails.
async fn heartbeat_loop(
    inner: Arc<ShardInner>,
    writer: Arc<GatewayWriter>,
    interval: Duration,
    dead_tx: mpsc::Sender<()>,
) {
    let deadline = interval * inner.settings.max_heartbeat_failures;

    loop {
        tokio::time::sleep(interval).await;

        let sequence = inner.sequence.load(Ordering::SeqCst);
        tracing::debug!(shard = inner.shard_id, seq = sequence, "Sending heartbeat");
        inner.touch_sent();
        let sent = writer.send(&GatewayMessage::heartbeat(sequence)).await;

        let since_ack = inner.last_ack.lock().unwrap().elapsed();
        if sent.is_err() || since_ack > deadline {
            let _ = dead_tx.send(()).await;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_shard(shard_id: u32, shard_count: u32) -> Shard {
        let (event_tx, _event_rx) = mpsc::channel(16);
        Shard::new(ShardConfig {
            shard_id,
            shard_count,
            token: "Bot token".to_string(),
            gateway_url: "wss://gateway.invalid".to_string(),
            settings: GatewaySettings::default(),
            presence: None,
            event_tx,
            limits: Arc::new(SessionLimits::new(1, 1)),
            reconnect: false,
        })
    }

    #[tokio::test]
    async fn test_initial_state() {
        let shard = test_shard(0, 1);
        assert_eq!(shard.state(), ShardState::Disconnected);
        assert!(!shard.inner.can_resume());
    }

    #[tokio::test]
    async fn test_can_resume_requires_session_and_sequence() {
        let shard = test_shard(0, 1);

        shard.inner.sequence.store(10, Ordering::SeqCst);
        assert!(!shard.inner.can_resume());

        *shard.inner.session_id.lock().unwrap() = Some("abc".to_string());
        assert!(shard.inner.can_resume());

        shard.inner.sequence.store(0, Ordering::SeqCst);
        assert!(!shard.inner.can_resume());
    }

    #[tokio::test]
    async fn test_open_rejects_out_of_bounds_shard() {
        let shard = test_shard(4, 4);
        match shard.open().await {
            Err(GatewayError::ShardBounds {
                shard_id,
                shard_count,
            }) => {
                assert_eq!(shard_id, 4);
                assert_eq!(shard_count, 4);
            }
            other => panic!("expected ShardBounds, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_double_open_is_rejected() {
        let shard = test_shard(2, 4);
        // First open marks the shard started (the dial itself fails fast
        // with reconnect disabled)
        let _ = shard.open().await;
        assert!(matches!(
            shard.open().await,
            Err(GatewayError::AlreadyOpen)
        ));
    }

    #[tokio::test]
    async fn test_ops_require_connection() {
        let shard = test_shard(0, 1);
        assert!(matches!(
            shard.update_status(&StatusUpdate::default()).await,
            Err(GatewayError::NotConnected)
        ));
        assert!(matches!(
            shard.request_guild_members("1", "", 0).await,
            Err(GatewayError::NotConnected)
        ));
    }

    #[test]
    fn test_bucket_keys_wrap_on_concurrency() {
        let limits = SessionLimits::new(4, 2);
        assert_eq!(limits.bucket_key(0), limits.bucket_key(2));
        assert_eq!(limits.bucket_key(1), limits.bucket_key(3));
        assert_ne!(limits.bucket_key(0), limits.bucket_key(1));
    }
}
