//! Scripted in-process controller for integration tests.
//!
//! Accepts any number of connections on an ephemeral port, records every
//! request line, and answers through a caller-supplied responder. Lines
//! can be pushed to every live connection, and all connections can be
//! dropped at once to exercise reconnect paths.

#![allow(dead_code, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use vantage_api::{TlsMode, TransportConfig};

type Responder = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

struct State {
    responder: Responder,
    reply_delay: Duration,
    received: Mutex<Vec<String>>,
    accepted: AtomicUsize,
    live: AtomicUsize,
    overlapped: AtomicBool,
    push: broadcast::Sender<String>,
    kill: broadcast::Sender<()>,
}

pub struct MockController {
    addr: SocketAddr,
    state: Arc<State>,
    handle: JoinHandle<()>,
}

impl MockController {
    /// Start a controller that answers each request line through `responder`.
    /// An empty reply list means "never answer".
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        Self::with_delay(Duration::ZERO, responder).await
    }

    /// Like [`start`](Self::start), but waits `reply_delay` before each
    /// answer and flags any request that arrives in the meantime.
    pub async fn with_delay<F>(reply_delay: Duration, responder: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        Self::listen(listener, reply_delay, responder)
    }

    /// Like [`start`](Self::start), on a fixed port (one a client is
    /// already retrying against).
    pub async fn start_on<F>(port: u16, responder: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        Self::listen(listener, Duration::ZERO, responder)
    }

    fn listen<F>(listener: TcpListener, reply_delay: Duration, responder: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        let addr = listener.local_addr().unwrap();
        let (push, _) = broadcast::channel(64);
        let (kill, _) = broadcast::channel(4);
        let state = Arc::new(State {
            responder: Arc::new(responder),
            reply_delay,
            received: Mutex::new(Vec::new()),
            accepted: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            overlapped: AtomicBool::new(false),
            push,
            kill,
        });

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_state.accepted.fetch_add(1, Ordering::SeqCst);
                accept_state.live.fetch_add(1, Ordering::SeqCst);
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    serve(stream, &state).await;
                    state.live.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::new("127.0.0.1", TlsMode::Disabled).with_port(self.addr.port())
    }

    /// Push a line to every live connection.
    pub fn push(&self, line: &str) {
        let _ = self.state.push.send(line.to_owned());
    }

    /// Drop every live connection.
    pub fn drop_connections(&self) {
        let _ = self.state.kill.send(());
    }

    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn count(&self, line: &str) -> usize {
        self.received().iter().filter(|l| *l == line).count()
    }

    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    /// `true` if a request ever arrived before the previous one was answered.
    pub fn overlapped(&self) -> bool {
        self.state.overlapped.load(Ordering::SeqCst)
    }
}

impl Drop for MockController {
    fn drop(&mut self) {
        self.handle.abort();
        let _ = self.state.kill.send(());
    }
}

async fn serve(stream: TcpStream, state: &State) {
    let (rd, mut wr) = stream.into_split();
    let mut lines = BufReader::new(rd).lines();
    let mut push = state.push.subscribe();
    let mut kill = state.kill.subscribe();
    let mut pending: Option<String> = None;

    loop {
        let line = if let Some(line) = pending.take() {
            line
        } else {
            tokio::select! {
                _ = kill.recv() => return,
                Ok(line) = push.recv() => {
                    if write(&mut wr, &[line]).await.is_err() {
                        return;
                    }
                    continue;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => line,
                    _ => return,
                },
            }
        };

        state.received.lock().unwrap().push(line.clone());

        if !state.reply_delay.is_zero() {
            if let Ok(Ok(Some(next))) = tokio::time::timeout(state.reply_delay, lines.next_line()).await {
                state.overlapped.store(true, Ordering::SeqCst);
                pending = Some(next);
            }
        }

        let replies = (state.responder)(&line);
        if write(&mut wr, &replies).await.is_err() {
            return;
        }
    }
}

async fn write(wr: &mut OwnedWriteHalf, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        wr.write_all(line.as_bytes()).await?;
        wr.write_all(b"\r\n").await?;
    }
    wr.flush().await
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Reply to `INVOKE <vid> <method> [args]` with `R:INVOKE <vid> <result> <method> [args]`.
pub fn invoke_reply(line: &str, result: &str) -> Vec<String> {
    let rest = line.strip_prefix("INVOKE ").unwrap_or(line);
    let mut parts = rest.splitn(3, ' ');
    let vid = parts.next().unwrap_or_default();
    let method = parts.next().unwrap_or_default();
    match parts.next() {
        Some(args) => vec![format!("R:INVOKE {vid} {result} {method} {args}")],
        None => vec![format!("R:INVOKE {vid} {result} {method}")],
    }
}

/// Acknowledge any enablement verb by echoing it back as `R:<line>`.
pub fn acknowledge(line: &str) -> Vec<String> {
    vec![format!("R:{line}")]
}
