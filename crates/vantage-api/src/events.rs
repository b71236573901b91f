//! Pushed status stream with auto-reconnect.
//!
//! A background task owns a dedicated connection to the controller and
//! reads pushed lines in a loop. Each line is normalized into a
//! [`StatusEvent`] and routed through a category-keyed [`Registry`].
//!
//! Two pushed framings are understood:
//!
//! ```text
//! S:BTN 447 PRESS                          -> ("BTN", 447, ["PRESS"])
//! S:STATUS 447 Button.GetState 1           -> ("STATUS", 447, ["Button.GetState", "1"])
//! EL: 447 Button.GetState 1                -> ("STATUS", 447, ["Button.GetState", "1"])
//! ```
//!
//! The stream only writes to the wire to arm categories (`STATUS <CAT>`)
//! and the enhanced log (`ELENABLE` / `ELLOG`). Everything it armed is
//! recorded and replayed after every reconnect, so subscriptions outlive
//! connection drops.
//!
//! Callbacks run on the read task. See [`crate::subscribers`] for the
//! blocking contract.
//!
//! ```rust,ignore
//! use vantage_api::{EventStream, EventOptions, TlsMode, TransportConfig};
//!
//! let stream = EventStream::new(TransportConfig::new("192.168.0.200", TlsMode::Disabled), EventOptions::default());
//! stream.start();
//! let sub = stream.subscribe_status(|event| println!("{event:?}"), "BTN");
//! // ...
//! sub.unsubscribe();
//! stream.stop().await;
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::Error;
use crate::protocol::Frame;
use crate::reconnect::{ReconnectConfig, calculate_backoff};
use crate::subscribers::{Registry, Subscription};
use crate::transport::{Connection, TransportConfig};

/// Category that object status and enhanced-log records normalize to.
pub const STATUS_CATEGORY: &str = "STATUS";

// ── StatusEvent ──────────────────────────────────────────────────────

/// One pushed status notification, normalized to `(category, vid, args)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// `BTN`, `LED`, `LOAD`, ... or [`STATUS_CATEGORY`].
    pub category: String,
    pub vid: u32,
    pub args: Vec<String>,
}

impl StatusEvent {
    /// Normalize a pushed frame. Returns `None` for non-pushed or
    /// malformed frames.
    pub fn from_frame(frame: Frame) -> Option<Self> {
        let (category, tokens) = match frame {
            Frame::Status { category, tokens } => (category, tokens),
            Frame::EnhancedLog { tokens } => (STATUS_CATEGORY.to_owned(), tokens),
            _ => return None,
        };
        let mut tokens = tokens.into_iter();
        let vid = tokens.next()?.parse().ok()?;
        Some(Self {
            category,
            vid,
            args: tokens.collect(),
        })
    }
}

// ── Options ──────────────────────────────────────────────────────────

/// Tuning for the event connection.
#[derive(Debug, Clone)]
pub struct EventOptions {
    /// Backoff between reconnect attempts. Retries forever by default.
    pub reconnect: ReconnectConfig,
    /// Longest wait for the reply to an enablement command.
    pub request_timeout: Duration,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

// ── EventStream ──────────────────────────────────────────────────────

/// Handle to the pushed status stream. Cheaply cloneable.
#[derive(Clone)]
pub struct EventStream {
    inner: Arc<EventInner>,
}

struct EventInner {
    transport: TransportConfig,
    options: EventOptions,
    registry: Registry<String, StatusEvent>,
    /// Enablement lines to (re)send after every connect, in arming order.
    enablement: Mutex<Vec<String>>,
    connected: watch::Sender<bool>,
    task: Mutex<Option<Running>>,
}

struct Running {
    control: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

enum Control {
    /// Send any recorded enablement lines not yet armed on this connection.
    Arm,
    /// Enable the enhanced log for one log type.
    EnableLog {
        log_type: String,
        reply: oneshot::Sender<Result<(), Error>>,
    },
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("address", &self.inner.transport.address())
            .field("connected", &self.is_connected())
            .field("subscribers", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

impl EventStream {
    /// Create a stopped stream. Call [`start`](Self::start) to connect.
    pub fn new(transport: TransportConfig, options: EventOptions) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            inner: Arc::new(EventInner {
                transport,
                options,
                registry: Registry::new(),
                enablement: Mutex::new(Vec::new()),
                connected,
                task: Mutex::new(None),
            }),
        }
    }

    /// Spawn the read loop. Returns immediately; the first connection
    /// attempt happens in the background. No-op if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.inner.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return;
        }

        let (control, control_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            event_loop(inner, control_rx, task_cancel).await;
        });

        *task = Some(Running {
            control,
            cancel,
            handle,
        });
    }

    /// Stop the read loop and close the connection. Subscriptions and the
    /// recorded enablement state are kept for a later [`start`](Self::start).
    pub async fn stop(&self) {
        let running = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.handle.await {
                warn!(error = %e, "event loop task failed");
            }
        }
        self.inner.connected.send_replace(false);
    }

    /// Returns `true` while the event connection is up.
    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    /// Watch connection up/down transitions.
    pub fn connection_state(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    /// Register `callback` for events of `category` and arm that category
    /// on the wire (`STATUS <category>`) if it is not armed yet.
    pub fn subscribe_status<F>(&self, callback: F, category: &str) -> Subscription
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        let subscription = self
            .inner
            .registry
            .subscribe(Some(category.to_owned()), callback);
        // STATUS/EL records are armed through enable_enhanced_log instead.
        if category != STATUS_CATEGORY {
            self.inner.record(format!("STATUS {category}"));
            self.send(Control::Arm);
        }
        subscription
    }

    /// Register a catch-all for events no category subscriber matched.
    pub fn subscribe_all<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe(None, callback)
    }

    /// Enable the enhanced log for `log_type` (e.g. `STATUSEX`).
    ///
    /// Succeeds once the controller has acknowledged both `ELENABLE` and
    /// `ELLOG`. The stream must be started; the call waits for the
    /// connection to come up, bounded by the request timeout.
    pub async fn enable_enhanced_log(&self, log_type: &str) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        if !self.send(Control::EnableLog {
            log_type: log_type.to_owned(),
            reply,
        }) {
            return Err(Error::ConnectionClosed);
        }

        let timeout = self.inner.options.request_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => Err(Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Number of registered callbacks, catch-alls included.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Enablement lines that will be replayed on the next connect.
    pub fn enablement(&self) -> Vec<String> {
        self.inner
            .enablement
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn send(&self, message: Control) -> bool {
        let task = self.inner.task.lock().unwrap_or_else(PoisonError::into_inner);
        task.as_ref()
            .is_some_and(|running| running.control.send(message).is_ok())
    }
}

impl EventInner {
    fn record(&self, line: String) {
        let mut lines = self.enablement.lock().unwrap_or_else(PoisonError::into_inner);
        if !lines.contains(&line) {
            lines.push(line);
        }
    }

    fn forget(&self, line: &str) {
        self.enablement
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| l != line);
    }

    fn dispatch_line(&self, line: &str) {
        let frame = Frame::parse(line);
        if !frame.is_pushed() {
            trace!(line, "ignoring non-status line");
            return;
        }
        match StatusEvent::from_frame(frame) {
            Some(event) => {
                let handled = self.registry.dispatch(&event.category, &event);
                if handled == 0 {
                    trace!(category = %event.category, vid = event.vid, "no subscriber for event");
                }
            }
            None => warn!(line, "skipping malformed status line"),
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → arm → read → on error, backoff → reconnect.
async fn event_loop(
    inner: Arc<EventInner>,
    mut control: mpsc::UnboundedReceiver<Control>,
    cancel: CancellationToken,
) {
    let reconnect = inner.options.reconnect.clone();
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = Connection::connect(&inner.transport) => result,
        };

        match result {
            Ok(mut conn) => {
                info!(peer = %conn.peer(), "event stream connected");
                attempt = 0;
                inner.connected.send_replace(true);
                let outcome = run_connection(&inner, &mut conn, &mut control, &cancel).await;
                inner.connected.send_replace(false);
                conn.close().await;
                match outcome {
                    Ok(()) => break,
                    Err(e) => info!(error = %e, "event stream disconnected, reconnecting"),
                }
            }
            Err(e) => {
                warn!(error = %e, attempt, "event stream connection failed");
                if reconnect.exhausted(attempt) {
                    warn!(
                        max_retries = reconnect.max_retries,
                        "event stream reconnection limit reached, giving up"
                    );
                    break;
                }

                let delay = calculate_backoff(attempt, &reconnect);
                info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }

    // Fail any requests still queued.
    control.close();
    while let Ok(message) = control.try_recv() {
        if let Control::EnableLog { reply, .. } = message {
            let _ = reply.send(Err(Error::ConnectionClosed));
        }
    }
    debug!("event loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Serve one connection until it drops (`Err`) or the stream is cancelled
/// (`Ok`).
async fn run_connection(
    inner: &EventInner,
    conn: &mut Connection,
    control: &mut mpsc::UnboundedReceiver<Control>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let mut armed = HashSet::new();
    arm_pending(inner, conn, &mut armed, cancel).await?;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            message = control.recv() => match message {
                Some(Control::Arm) => arm_pending(inner, conn, &mut armed, cancel).await?,
                Some(Control::EnableLog { log_type, reply }) => {
                    // The caller gave up while this sat in the queue.
                    if reply.is_closed() {
                        debug!(log_type = %log_type, "dropping abandoned enhanced-log request");
                        continue;
                    }
                    let result = enable_log(inner, conn, &mut armed, &log_type, cancel).await;
                    let fatal = result
                        .as_ref()
                        .err()
                        .filter(|e| e.is_connection() || matches!(e, Error::Timeout { .. }))
                        .map(ToString::to_string);
                    // Enabled after the caller timed out: nobody expects the log.
                    if let Err(Ok(())) = reply.send(result) {
                        disable_log(inner, conn, &mut armed, &log_type, cancel).await?;
                    }
                    if let Some(message) = fatal {
                        return Err(Error::Connection { message });
                    }
                }
                // The sender only goes away in stop(), right after cancel.
                None => return Ok(()),
            },
            line = conn.read_line() => inner.dispatch_line(&line?),
        }
    }
}

/// Send every recorded enablement line not yet armed on this connection.
async fn arm_pending(
    inner: &EventInner,
    conn: &mut Connection,
    armed: &mut HashSet<String>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let pending: Vec<String> = inner
        .enablement
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter(|line| !armed.contains(*line))
        .cloned()
        .collect();

    for line in pending {
        match exchange(inner, conn, &line, cancel).await {
            Ok(()) => debug!(line = %line, "armed"),
            Err(Error::Command { code, message }) => {
                warn!(line = %line, code, message = %message, "controller rejected enablement");
            }
            Err(e) => return Err(e),
        }
        armed.insert(line);
    }
    Ok(())
}

async fn enable_log(
    inner: &EventInner,
    conn: &mut Connection,
    armed: &mut HashSet<String>,
    log_type: &str,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let lines = [format!("ELENABLE {log_type} ON"), format!("ELLOG {log_type} ON")];
    for line in &lines {
        exchange(inner, conn, line, cancel).await?;
    }
    for line in lines {
        inner.record(line.clone());
        armed.insert(line);
    }
    Ok(())
}

/// Undo [`enable_log`] and drop its lines from the replay list.
async fn disable_log(
    inner: &EventInner,
    conn: &mut Connection,
    armed: &mut HashSet<String>,
    log_type: &str,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    for verb in ["ELLOG", "ELENABLE"] {
        let on = format!("{verb} {log_type} ON");
        inner.forget(&on);
        armed.remove(&on);
        match exchange(inner, conn, &format!("{verb} {log_type} OFF"), cancel).await {
            Ok(()) | Err(Error::Command { .. }) => {}
            Err(e) => return Err(e),
        }
    }
    debug!(log_type, "enhanced log disabled");
    Ok(())
}

/// Send one line and wait for its terminal reply, dispatching any pushed
/// lines that arrive in between.
async fn exchange(
    inner: &EventInner,
    conn: &mut Connection,
    line: &str,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    conn.send_line(line).await?;

    let timeout = inner.options.request_timeout;
    let read = async {
        loop {
            let reply = conn.read_line().await?;
            match Frame::parse(&reply) {
                Frame::Error { code, message } => return Err(Error::Command { code, message }),
                frame if frame.is_terminal() => return Ok(()),
                frame if frame.is_pushed() => inner.dispatch_line(&reply),
                _ => trace!(line = %reply, "skipping line while awaiting reply"),
            }
        }
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::ConnectionClosed),
        result = tokio::time::timeout(timeout, read) => result.unwrap_or_else(|_| {
            Err(Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }),
    }
}
