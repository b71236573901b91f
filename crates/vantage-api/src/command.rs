//! Request/reply client for the host command connection.
//!
//! Replies only echo the object id and method name, so at most one
//! request may be in flight on a connection. Callers serialize at a
//! single async gate: the connection lives inside a `tokio::sync::Mutex`
//! and is held from the moment a request line is written until its
//! terminal reply (`R:...` or `R:ERROR`) has been read.
//!
//! ```rust,ignore
//! use vantage_api::{CommandClient, CommandOptions, TlsMode, TransportConfig};
//!
//! let transport = TransportConfig::new("192.168.0.200", TlsMode::DangerAcceptInvalid);
//! let client = CommandClient::new(transport, CommandOptions::default());
//!
//! let reply = client.invoke(447, "Button.GetState", &[] as &[&str]).await?;
//! println!("button 447 is {}", reply.result);
//!
//! let lines = client.raw_request("GETLED 447").await?;
//! client.close().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::protocol::{Frame, InvokeReply, format_invoke};
use crate::reconnect::{ReconnectConfig, calculate_backoff};
use crate::transport::{Connection, TransportConfig};

/// Tuning for the command connection.
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Longest wait for the terminal reply to one request.
    pub request_timeout: Duration,
    /// Backoff used when (re)opening the connection on demand.
    pub reconnect: ReconnectConfig,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig {
                max_retries: Some(2),
                ..ReconnectConfig::default()
            },
        }
    }
}

/// Client for `INVOKE` and ad hoc commands.
///
/// Cheaply cloneable via `Arc<CommandInner>`; all clones share one
/// connection and one serialization gate. The connection is opened on
/// first use and re-opened transparently after it drops.
#[derive(Clone)]
pub struct CommandClient {
    inner: Arc<CommandInner>,
}

struct CommandInner {
    transport: TransportConfig,
    options: CommandOptions,
    /// The serialization gate. `None` while disconnected.
    connection: Mutex<Option<Connection>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for CommandClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandClient")
            .field("address", &self.inner.transport.address())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl CommandClient {
    /// Create a client. Does NOT connect -- the first request does.
    pub fn new(transport: TransportConfig, options: CommandOptions) -> Self {
        Self {
            inner: Arc::new(CommandInner {
                transport,
                options,
                connection: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Open the connection eagerly, surfacing connect/auth failures now.
    pub async fn connect(&self) -> Result<(), Error> {
        let mut gate = self.acquire().await?;
        if gate.is_none() {
            *gate = Some(self.open().await?);
        }
        Ok(())
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Invoke `method` (`Interface.Method`) on object `vid`.
    ///
    /// The reply must echo the same object id and method; anything else
    /// fails this call with [`Error::Protocol`].
    pub async fn invoke<S: AsRef<str>>(
        &self,
        vid: u32,
        method: &str,
        args: &[S],
    ) -> Result<InvokeReply, Error> {
        let line = format_invoke(vid, method, args);
        let lines = self.request(&line).await?;
        let terminal = lines.last().map(String::as_str).unwrap_or_default();

        match Frame::parse(terminal) {
            Frame::Reply { verb, tokens } if verb == "INVOKE" => {
                let reply = InvokeReply::from_tokens(tokens)?;
                if reply.vid != vid || reply.method != method {
                    return Err(Error::protocol(format!(
                        "reply for {} {} does not match request {vid} {method}",
                        reply.vid, reply.method
                    )));
                }
                Ok(reply)
            }
            other => Err(Error::protocol(format!(
                "unexpected reply to INVOKE: {other:?}"
            ))),
        }
    }

    /// Send a command outside the `INVOKE` convention (`GETLED`, `LED`, ...).
    ///
    /// Returns every line received up to and including the terminal reply.
    pub async fn raw_request(&self, line: &str) -> Result<Vec<String>, Error> {
        self.request(line).await
    }

    /// Tear down the connection. Outstanding and future requests fail with
    /// [`Error::ConnectionClosed`].
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        let mut gate = self.inner.connection.lock().await;
        if let Some(mut connection) = gate.take() {
            connection.close().await;
        }
        debug!("command client closed");
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn acquire(&self) -> Result<tokio::sync::MutexGuard<'_, Option<Connection>>, Error> {
        tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Err(Error::ConnectionClosed),
            guard = self.inner.connection.lock() => Ok(guard),
        }
    }

    async fn request(&self, line: &str) -> Result<Vec<String>, Error> {
        let mut gate = self.acquire().await?;
        let mut retried = false;

        loop {
            let mut conn = match gate.take() {
                Some(conn) => conn,
                None => self.open().await?,
            };

            let result = self.exchange(&mut conn, line).await;
            match result {
                // A socket the controller dropped while idle only fails on
                // first use. Resend once on a fresh connection.
                Err(ref e) if e.is_connection() && !retried && !self.is_closed() => {
                    warn!(error = %e, line, "command connection lost, reconnecting");
                    conn.close().await;
                    retried = true;
                }
                // The stream position is unknown after these; start over next time.
                Err(ref e) if discards_connection(e) => {
                    debug!(error = %e, line, "discarding command connection");
                    conn.close().await;
                    return result;
                }
                _ => {
                    *gate = Some(conn);
                    return result;
                }
            }
        }
    }

    /// Write one request and read its response. The request timeout covers
    /// both halves.
    async fn exchange(&self, conn: &mut Connection, line: &str) -> Result<Vec<String>, Error> {
        let timeout = self.inner.options.request_timeout;
        let round_trip = async {
            conn.send_line(line).await?;
            read_response(conn).await
        };

        tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Err(Error::ConnectionClosed),
            result = tokio::time::timeout(timeout, round_trip) => {
                result.unwrap_or_else(|_| Err(Error::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }))
            }
        }
    }

    async fn open(&self) -> Result<Connection, Error> {
        let reconnect = &self.inner.options.reconnect;
        let mut attempt: u32 = 0;

        loop {
            let err = tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => return Err(Error::ConnectionClosed),
                result = Connection::connect(&self.inner.transport) => match result {
                    Ok(conn) => return Ok(conn),
                    Err(e) => e,
                },
            };

            if matches!(err, Error::Authentication { .. }) || reconnect.exhausted(attempt) {
                return Err(err);
            }

            let delay = calculate_backoff(attempt, reconnect);
            warn!(
                error = %err,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "command connection failed, retrying"
            );
            tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => return Err(Error::ConnectionClosed),
                () = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

fn discards_connection(err: &Error) -> bool {
    err.is_connection() || matches!(err, Error::Timeout { .. } | Error::Protocol { .. })
}

/// Read lines until the terminal reply. Pushed status lines that leak onto
/// the command connection are skipped.
async fn read_response(conn: &mut Connection) -> Result<Vec<String>, Error> {
    let mut lines = Vec::new();
    loop {
        let line = conn.read_line().await?;
        let frame = Frame::parse(&line);
        if frame.is_pushed() {
            trace!(line = %line, "ignoring pushed line on command connection");
            continue;
        }
        if let Frame::Error { code, message } = frame {
            return Err(Error::Command { code, message });
        }
        let terminal = frame.is_terminal();
        lines.push(line);
        if terminal {
            return Ok(lines);
        }
    }
}
