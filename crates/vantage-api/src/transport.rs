// Line transport over one persistent controller connection.
//
// Both the command client and the event stream own exactly one
// `Connection` each. The transport frames lines, runs the optional TLS
// and LOGIN handshakes, and reports closure. It never retries on its
// own; reconnection is the owner's job.

use std::path::PathBuf;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, trace};

use crate::error::Error;
use crate::protocol::{Frame, quote};

/// Longest line accepted from the controller before the frame is rejected.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// How long `close` waits for buffered output to drain.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Plaintext host command port.
pub const DEFAULT_PLAIN_PORT: u16 = 3001;

/// TLS host command port.
pub const DEFAULT_TLS_PORT: u16 = 3010;

/// TLS verification mode for the command port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Plaintext TCP.
    Disabled,
    /// Verify against the bundled web PKI roots.
    System,
    /// Verify against a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (controllers ship self-signed).
    #[default]
    DangerAcceptInvalid,
}

impl TlsMode {
    /// Port the controller listens on for this mode.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Disabled => DEFAULT_PLAIN_PORT,
            _ => DEFAULT_TLS_PORT,
        }
    }
}

/// Login credentials for the host command port.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Shared transport configuration for opening connections.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub tls: TlsMode,
    pub credentials: Option<Credentials>,
    pub connect_timeout: Duration,
}

impl TransportConfig {
    /// Configuration for `host` with the default port for `tls`.
    pub fn new(host: impl Into<String>, tls: TlsMode) -> Self {
        Self {
            host: host.into(),
            port: tls.default_port(),
            tls,
            credentials: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Attach `LOGIN` credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password,
        });
        self
    }

    /// Override the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `host:port` for logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

trait LineStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> LineStream for T {}

/// One framed, authenticated connection to the controller.
pub struct Connection {
    framed: Framed<Box<dyn LineStream>, LinesCodec>,
    peer: String,
    closed: bool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Open a connection: TCP, optional TLS, optional `LOGIN`.
    pub async fn connect(config: &TransportConfig) -> Result<Self, Error> {
        let address = config.address();
        debug!(address = %address, tls = ?config.tls, "connecting");

        let tcp = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| Error::Connection {
            message: format!("connect to {address} timed out"),
        })?
        .map_err(|e| Error::Connection {
            message: format!("connect to {address} failed: {e}"),
        })?;
        if let Err(e) = tcp.set_nodelay(true) {
            debug!(error = %e, "could not disable Nagle on command socket");
        }

        let mut connection = match crate::tls::connector(&config.tls)? {
            Some(connector) => {
                let name = crate::tls::server_name(&config.host)?;
                let stream = tokio::time::timeout(config.connect_timeout, connector.connect(name, tcp))
                    .await
                    .map_err(|_| Error::Tls(format!("handshake with {address} timed out")))?
                    .map_err(|e| Error::Tls(format!("handshake with {address} failed: {e}")))?;
                Self::from_stream(stream, address)
            }
            None => Self::from_stream(tcp, address),
        };

        if let Some(ref credentials) = config.credentials {
            tokio::time::timeout(config.connect_timeout, connection.login(credentials))
                .await
                .map_err(|_| Error::Authentication {
                    message: "no reply to LOGIN".into(),
                })??;
        }

        debug!(peer = %connection.peer, "connected");
        Ok(connection)
    }

    /// Wrap an already-established byte stream.
    pub fn from_stream<S>(stream: S, peer: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let boxed: Box<dyn LineStream> = Box::new(stream);
        Self {
            framed: Framed::new(boxed, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            peer: peer.into(),
            closed: false,
        }
    }

    /// Remote address this connection was opened against.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Run the `LOGIN` handshake.
    async fn login(&mut self, credentials: &Credentials) -> Result<(), Error> {
        self.send_line(&format!(
            "LOGIN {} {}",
            quote(&credentials.username),
            quote(credentials.password.expose_secret())
        ))
        .await?;

        loop {
            let line = self.read_line().await?;
            match Frame::parse(&line) {
                Frame::Reply { verb, .. } if verb == "LOGIN" => return Ok(()),
                Frame::Error { message, .. } => return Err(Error::Authentication { message }),
                frame => trace!(?frame, "skipping line during login"),
            }
        }
    }

    /// Write one newline-terminated frame.
    pub async fn send_line(&mut self, line: &str) -> Result<(), Error> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        trace!(peer = %self.peer, line, "send");
        self.framed.send(line).await.map_err(codec_error)
    }

    /// Wait for the next frame. Fails with [`Error::ConnectionClosed`] at EOF.
    pub async fn read_line(&mut self) -> Result<String, Error> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        match self.framed.next().await {
            Some(Ok(line)) => {
                trace!(peer = %self.peer, line = %line, "recv");
                Ok(line)
            }
            Some(Err(e)) => Err(codec_error(e)),
            None => {
                self.closed = true;
                Err(Error::ConnectionClosed)
            }
        }
    }

    /// Flush and shut down the socket. Safe to call more than once.
    ///
    /// A peer that stopped reading gets [`CLOSE_TIMEOUT`] to drain; after
    /// that the socket is dropped with output still buffered.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match tokio::time::timeout(CLOSE_TIMEOUT, SinkExt::<&str>::close(&mut self.framed)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(peer = %self.peer, error = %e, "error while closing connection"),
            Err(_) => debug!(peer = %self.peer, "close timed out with output pending"),
        }
    }
}

fn codec_error(err: LinesCodecError) -> Error {
    match err {
        LinesCodecError::MaxLineLengthExceeded => Error::Protocol {
            message: format!("line exceeds {MAX_LINE_LENGTH} bytes"),
        },
        LinesCodecError::Io(e) => Error::Io(e),
    }
}
