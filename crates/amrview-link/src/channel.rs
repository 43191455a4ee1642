use crossbeam_channel::Sender;
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::protocol::{ChannelKind, Incoming};
use crate::transport::{Connector, Frame, ABNORMAL_CLOSURE, NORMAL_CLOSURE, NO_STATUS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot of one channel for status badges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub state: ConnState,
    pub reconnecting: bool,
    pub error: Option<String>,
    pub attempt: u32,
}

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub kind: ChannelKind,
    pub url: String,
    pub backoff: Backoff,
    /// Period of the watchdog that re-arms a channel whose retry timer was lost.
    pub watch_interval: Duration,
}

impl ChannelSettings {
    pub fn new(kind: ChannelKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            backoff: Backoff::default(),
            watch_interval: Duration::from_secs(5),
        }
    }
}

struct Shared {
    state: ConnState,
    error: Option<String>,
    reconnecting: bool,
    /// Set by `disconnect()`; suppresses every automatic reconnect path.
    stopped: bool,
    generation: u64,
    attempt: u32,
    conn_token: Option<CancellationToken>,
}

struct Inner {
    settings: ChannelSettings,
    connector: Arc<dyn Connector>,
    tx: Sender<Incoming>,
    root: CancellationToken,
    shared: Mutex<Shared>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, inc: Incoming) {
        // receiver gone means the viewer is shutting down
        let _ = self.tx.send(inc);
    }

    fn kind(&self) -> ChannelKind {
        self.settings.kind.clone()
    }
}

/// Reconnecting WebSocket client. Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

impl Channel {
    /// Creates the channel and starts its watchdog. Must be called inside a tokio runtime.
    /// The channel stays `Disconnected` until `connect()`.
    pub fn spawn(
        settings: ChannelSettings,
        connector: Arc<dyn Connector>,
        tx: Sender<Incoming>,
        parent: &CancellationToken,
    ) -> Self {
        let inner = Arc::new(Inner {
            settings,
            connector,
            tx,
            root: parent.child_token(),
            shared: Mutex::new(Shared {
                state: ConnState::Disconnected,
                error: None,
                reconnecting: false,
                stopped: false,
                generation: 0,
                attempt: 0,
                conn_token: None,
            }),
        });
        tokio::spawn(watchdog(Arc::clone(&inner)));
        Self { inner }
    }

    pub fn kind(&self) -> ChannelKind {
        self.inner.kind()
    }

    pub fn status(&self) -> ChannelStatus {
        let sh = self.inner.lock();
        ChannelStatus {
            state: sh.state,
            reconnecting: sh.reconnecting,
            error: sh.error.clone(),
            attempt: sh.attempt,
        }
    }

    /// Opens the socket. A no-op while `Connecting` or `Connected`.
    pub fn connect(&self) {
        self.inner.lock().stopped = false;
        try_connect(&self.inner);
    }

    /// Closes with the normal-closure code. Terminal until the next explicit `connect()`.
    pub fn disconnect(&self) {
        let token = {
            let mut sh = self.inner.lock();
            sh.stopped = true;
            sh.generation += 1;
            sh.state = ConnState::Disconnected;
            sh.error = None;
            sh.reconnecting = false;
            sh.attempt = 0;
            sh.conn_token.take()
        };
        if let Some(token) = token {
            token.cancel();
        }
        tracing::info!(channel = %self.inner.settings.kind, "channel disconnected by request");
        self.inner.emit(Incoming::disconnected(self.inner.kind()));
    }

    /// Disconnects and stops the watchdog and any pending retry.
    pub fn shutdown(&self) {
        self.disconnect();
        self.inner.root.cancel();
    }
}

fn try_connect(inner: &Arc<Inner>) {
    let (generation, token) = {
        let mut sh = inner.lock();
        if matches!(sh.state, ConnState::Connecting | ConnState::Connected) {
            tracing::debug!(channel = %inner.settings.kind, state = ?sh.state, "connect ignored");
            return;
        }
        if sh.stopped || inner.root.is_cancelled() {
            return;
        }
        sh.state = ConnState::Connecting;
        sh.generation += 1;
        let token = inner.root.child_token();
        sh.conn_token = Some(token.clone());
        (sh.generation, token)
    };
    tracing::info!(channel = %inner.settings.kind, url = %inner.settings.url, "connecting");
    tokio::spawn(run_socket(Arc::clone(inner), generation, token));
}

async fn run_socket(inner: Arc<Inner>, generation: u64, token: CancellationToken) {
    let opened = tokio::select! {
        _ = token.cancelled() => return,
        opened = inner.connector.open(&inner.settings.url) => opened,
    };
    let mut socket = match opened {
        Ok(socket) => socket,
        Err(err) => {
            on_closed(&inner, generation, ABNORMAL_CLOSURE, Some(err.to_string()));
            return;
        }
    };

    if !mark_connected(&inner, generation) {
        let _ = socket.outgoing.send(Frame::Close(Some(NORMAL_CLOSURE))).await;
        return;
    }

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                let _ = socket.outgoing.send(Frame::Close(Some(NORMAL_CLOSURE))).await;
                let _ = socket.outgoing.close().await;
                return;
            }
            frame = socket.incoming.next() => match frame {
                Some(Ok(Frame::Text(text))) => on_text(&inner, generation, &text),
                Some(Ok(Frame::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => on_text(&inner, generation, &text),
                    Err(e) => on_bad_message(&inner, generation, format!("non-utf8 frame: {e}")),
                },
                Some(Ok(Frame::Close(code))) => {
                    on_closed(&inner, generation, code.unwrap_or(NO_STATUS), None);
                    return;
                }
                Some(Err(err)) => {
                    on_closed(&inner, generation, ABNORMAL_CLOSURE, Some(err.to_string()));
                    return;
                }
                None => {
                    on_closed(&inner, generation, ABNORMAL_CLOSURE, Some("stream ended".into()));
                    return;
                }
            }
        }
    }
}

fn mark_connected(inner: &Inner, generation: u64) -> bool {
    {
        let mut sh = inner.lock();
        if sh.generation != generation || sh.stopped {
            return false;
        }
        sh.state = ConnState::Connected;
        sh.error = None;
        sh.reconnecting = false;
        sh.attempt = 0;
    }
    tracing::info!(channel = %inner.settings.kind, "connected");
    inner.emit(Incoming::connected(inner.kind()));
    true
}

fn on_text(inner: &Inner, generation: u64, text: &str) {
    match Incoming::decode(inner.kind(), text) {
        Ok(inc) => inner.emit(inc),
        Err(e) => on_bad_message(inner, generation, format!("invalid json: {e}")),
    }
}

// the frame is dropped; the channel stays connected
fn on_bad_message(inner: &Inner, generation: u64, reason: String) {
    {
        let mut sh = inner.lock();
        if sh.generation != generation {
            return;
        }
        sh.error = Some(reason.clone());
    }
    tracing::warn!(channel = %inner.settings.kind, %reason, "message dropped");
    inner.emit(Incoming::error(inner.kind(), reason));
}

fn on_closed(inner: &Arc<Inner>, generation: u64, code: u16, reason: Option<String>) {
    let retry = {
        let mut sh = inner.lock();
        if sh.generation != generation {
            return;
        }
        sh.state = ConnState::Disconnected;
        sh.conn_token = None;
        if code == NORMAL_CLOSURE || sh.stopped {
            None
        } else {
            sh.error = Some(reason.unwrap_or_else(|| format!("closed with code {code}")));
            if sh.reconnecting {
                None
            } else {
                sh.reconnecting = true;
                let delay = inner.settings.backoff.delay(sh.attempt);
                sh.attempt = sh.attempt.saturating_add(1);
                Some((delay, sh.error.clone().unwrap_or_default()))
            }
        }
    };

    tracing::info!(channel = %inner.settings.kind, code, "socket closed");
    inner.emit(Incoming::disconnected(inner.kind()));
    if let Some((delay, error)) = retry {
        tracing::warn!(channel = %inner.settings.kind, ?delay, %error, "reconnect scheduled");
        inner.emit(Incoming::error(inner.kind(), error));
        inner.emit(Incoming::reconnecting(inner.kind(), delay));
        tokio::spawn(retry_after(Arc::clone(inner), delay));
    }
}

async fn retry_after(inner: Arc<Inner>, delay: Duration) {
    tokio::select! {
        _ = inner.root.cancelled() => return,
        _ = tokio::time::sleep(delay) => {}
    }
    inner.lock().reconnecting = false;
    try_connect(&inner);
}

async fn watchdog(inner: Arc<Inner>) {
    let mut tick = tokio::time::interval(inner.settings.watch_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = inner.root.cancelled() => return,
            _ = tick.tick() => {}
        }
        let stale = {
            let sh = inner.lock();
            sh.state == ConnState::Disconnected
                && sh.error.is_some()
                && !sh.reconnecting
                && !sh.stopped
        };
        if stale {
            tracing::warn!(channel = %inner.settings.kind, "watchdog re-arming connect");
            try_connect(&inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionError;
    use crate::protocol::IncomingKind;
    use crate::transport::Socket;
    use futures_util::future::{self, BoxFuture};
    use futures_util::{sink, stream, FutureExt};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    enum Script {
        Pending,
        Fail,
        Accept(mpsc::UnboundedReceiver<Frame>, Arc<Mutex<Vec<Frame>>>),
    }

    #[derive(Default)]
    struct FakeConnector {
        opened: AtomicUsize,
        script: Mutex<VecDeque<Script>>,
    }

    struct Server {
        tx: mpsc::UnboundedSender<Frame>,
        sent: Arc<Mutex<Vec<Frame>>>,
    }

    impl FakeConnector {
        fn push(&self, s: Script) {
            self.script.lock().unwrap().push_back(s);
        }

        fn accept(&self) -> Server {
            let (tx, rx) = mpsc::unbounded_channel();
            let sent = Arc::new(Mutex::new(Vec::new()));
            self.push(Script::Accept(rx, Arc::clone(&sent)));
            Server { tx, sent }
        }

        fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }
    }

    impl Connector for FakeConnector {
        fn open(&self, url: &str) -> BoxFuture<'static, Result<Socket, ConnectionError>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front().unwrap_or(Script::Fail);
            let url = url.to_string();
            match next {
                Script::Pending => future::pending().boxed(),
                Script::Fail => future::ready(Err(ConnectionError::Connect {
                    url,
                    reason: "refused".into(),
                }))
                .boxed(),
                Script::Accept(rx, sent) => {
                    let incoming = stream::unfold(rx, |mut rx| async move {
                        rx.recv().await.map(|f| (Ok(f), rx))
                    })
                    .boxed();
                    let outgoing = sink::unfold(sent, |sent, frame: Frame| async move {
                        sent.lock().unwrap().push(frame);
                        Ok::<_, ConnectionError>(sent)
                    });
                    future::ready(Ok(Socket {
                        incoming,
                        outgoing: Box::pin(outgoing),
                    }))
                    .boxed()
                }
            }
        }
    }

    fn settings(retry: Duration) -> ChannelSettings {
        let mut s = ChannelSettings::new(
            ChannelKind::Monitor { group: "5".into() },
            "ws://test/ws/group/5",
        );
        s.backoff = Backoff::fixed(retry);
        s.watch_interval = Duration::from_secs(10);
        s
    }

    fn open_with(
        connector: &Arc<FakeConnector>,
        settings: ChannelSettings,
    ) -> (Channel, crossbeam_channel::Receiver<Incoming>, CancellationToken) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let root = CancellationToken::new();
        let dyn_connector: Arc<dyn Connector> = connector.clone();
        let ch = Channel::spawn(settings, dyn_connector, tx, &root);
        (ch, rx, root)
    }

    fn open_channel(
        connector: &Arc<FakeConnector>,
    ) -> (Channel, crossbeam_channel::Receiver<Incoming>, CancellationToken) {
        open_with(connector, settings(Duration::from_secs(3)))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn double_connect_while_connecting_opens_one_socket() {
        let connector = Arc::new(FakeConnector::default());
        connector.push(Script::Pending);
        let (ch, _rx, _root) = open_channel(&connector);

        ch.connect();
        ch.connect();
        settle().await;

        assert_eq!(connector.opened(), 1);
        assert_eq!(ch.status().state, ConnState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn bad_json_keeps_channel_connected() {
        let connector = Arc::new(FakeConnector::default());
        let server = connector.accept();
        let (ch, rx, _root) = open_channel(&connector);

        ch.connect();
        settle().await;
        server.tx.send(Frame::Text("{broken".into())).unwrap();
        server
            .tx
            .send(Frame::Text(r#"{"type":"Clear","order_id":"X"}"#.into()))
            .unwrap();
        settle().await;

        let status = ch.status();
        assert_eq!(status.state, ConnState::Connected);
        assert!(status.error.unwrap().contains("invalid json"));
        let kinds: Vec<_> = rx.try_iter().map(|i| i.kind).collect();
        assert!(matches!(kinds[0], IncomingKind::Connected));
        assert!(matches!(kinds[1], IncomingKind::Error(_)));
        assert!(matches!(kinds[2], IncomingKind::Monitor(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_close_schedules_exactly_one_retry() {
        let connector = Arc::new(FakeConnector::default());
        let first = connector.accept();
        let _second = connector.accept();
        let (ch, _rx, _root) = open_channel(&connector);

        ch.connect();
        settle().await;
        first.tx.send(Frame::Close(Some(ABNORMAL_CLOSURE))).unwrap();
        settle().await;

        let status = ch.status();
        assert_eq!(status.state, ConnState::Disconnected);
        assert!(status.reconnecting);
        assert!(status.error.is_some());
        assert_eq!(connector.opened(), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;

        assert_eq!(connector.opened(), 2);
        let status = ch.status();
        assert_eq!(status.state, ConnState::Connected);
        assert!(!status.reconnecting);
        assert_eq!(status.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn normal_close_from_server_does_not_retry() {
        let connector = Arc::new(FakeConnector::default());
        let server = connector.accept();
        let (ch, _rx, _root) = open_channel(&connector);

        ch.connect();
        settle().await;
        server.tx.send(Frame::Close(Some(NORMAL_CLOSURE))).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(connector.opened(), 1);
        let status = ch.status();
        assert_eq!(status.state, ConnState::Disconnected);
        assert!(!status.reconnecting);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_sends_normal_close_and_suppresses_retry() {
        let connector = Arc::new(FakeConnector::default());
        let server = connector.accept();
        let (ch, _rx, _root) = open_channel(&connector);

        ch.connect();
        settle().await;
        ch.disconnect();
        settle().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(
            server.sent.lock().unwrap().first(),
            Some(&Frame::Close(Some(NORMAL_CLOSURE)))
        );
        assert_eq!(connector.opened(), 1);
        assert_eq!(
            ch.status(),
            ChannelStatus {
                state: ConnState::Disconnected,
                reconnecting: false,
                error: None,
                attempt: 0,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_during_backoff_cancels_pending_retry() {
        let connector = Arc::new(FakeConnector::default());
        connector.push(Script::Fail);
        let (ch, _rx, _root) = open_channel(&connector);

        ch.connect();
        settle().await;
        assert!(ch.status().reconnecting);
        ch.disconnect();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_rearms_when_retry_timer_was_lost() {
        let connector = Arc::new(FakeConnector::default());
        connector.push(Script::Fail);
        let _server = connector.accept();
        let (ch, _rx, _root) = open_with(&connector, settings(Duration::from_secs(3600)));

        ch.connect();
        settle().await;
        // the scheduled retry is an hour away: pretend it was lost
        ch.inner.lock().reconnecting = false;
        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;

        assert_eq!(connector.opened(), 2);
        assert_eq!(ch.status().state, ConnState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_all_background_work() {
        let connector = Arc::new(FakeConnector::default());
        connector.push(Script::Fail);
        let (ch, _rx, root) = open_channel(&connector);

        ch.connect();
        settle().await;
        root.cancel();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(connector.opened(), 1);
        ch.shutdown();
        ch.connect();
        settle().await;
        assert_eq!(connector.opened(), 1);
    }
}
