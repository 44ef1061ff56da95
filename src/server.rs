//! Single-client TCP delivery of a packed frame.
//!
//! The protocol has no framing at all: on connect the server writes the whole
//! packed buffer and closes the socket. The client reads until end of stream
//! and must already know the frame dimensions.
//!
//! Clients are served strictly one after another. While a frame is being
//! sent, the next client waits in the listen backlog (depth 1 by default).
//! A client that goes away mid-transfer is logged and dropped; the listener
//! keeps running.
//!
//! # Example
//!
//! ```rust,ignore
//! use inkcal::{DeliveryServer, ServerConfig};
//!
//! let config = ServerConfig::default().with_source("compressed_image.bin");
//! let server = DeliveryServer::bind(&config).await?;
//!
//! // Serve until Ctrl-C
//! server.run().await;
//! ```

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::config::ServerConfig;
use crate::error::Error;

/// Where the server is in its accept/send cycle.
///
/// `Listening → Accepted → Sending → Closed → Listening`. A new connection is
/// only accepted once the previous one is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting in `accept`
    Listening,
    /// A client is connected, nothing sent yet
    Accepted,
    /// Writing the frame
    Sending,
    /// Connection finished, successfully or not
    Closed,
}

impl SessionState {
    /// Whether moving to `next` is a legal step.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Listening, Accepted)
                | (Accepted, Sending)
                | (Accepted, Closed)
                | (Sending, Closed)
                | (Closed, Listening)
        )
    }
}

/// Result of one client session.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The whole frame was written
    Completed {
        /// Bytes written
        bytes: usize,
    },
    /// Writing failed part way
    Failed {
        /// Bytes handed to the socket before the failure
        sent: usize,
        /// What went wrong
        error: io::Error,
    },
}

impl SessionOutcome {
    /// Whether the whole frame went out.
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed { .. })
    }
}

/// Session counters returned when the server stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    /// Sessions that delivered the whole frame
    pub completed: u64,
    /// Sessions that ended in a transport error
    pub failed: u64,
}

/// Blocking-style, one-client-at-a-time frame server.
#[derive(Debug)]
pub struct DeliveryServer {
    listener: TcpListener,
    frame: Vec<u8>,
    source: PathBuf,
    chunk_size: usize,
    write_timeout: Option<Duration>,
    state: SessionState,
}

impl DeliveryServer {
    /// Load the packed buffer and start listening.
    ///
    /// The source file is read once here and served unchanged for the
    /// lifetime of the server.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for invalid settings or an unresolvable host
    /// - [`Error::SourceMissing`] if the source file does not exist; no
    ///   socket is bound in that case
    /// - [`Error::Io`] if the source cannot be read
    /// - [`Error::Bind`] if the listener cannot be created
    pub async fn bind(config: &ServerConfig) -> Result<Self, Error> {
        config.validate()?;

        if !config.source.exists() {
            return Err(Error::SourceMissing(config.source.clone()));
        }
        let frame = std::fs::read(&config.source).map_err(|e| Error::io(&config.source, e))?;

        let address = config.address();
        let addr = tokio::net::lookup_host(&address)
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| Error::Config(format!("cannot resolve listen address '{}'", address)))?;

        let listener = listen(addr, config.backlog).map_err(|source| Error::Bind { addr, source })?;

        let local = listener.local_addr().unwrap_or(addr);
        tracing::info!(
            "Server is listening on {} ({} bytes from {})",
            local,
            frame.len(),
            config.source.display()
        );

        Ok(Self {
            listener,
            frame,
            source: config.source.clone(),
            chunk_size: config.chunk_size,
            write_timeout: config.write_timeout(),
            state: SessionState::Listening,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Size of the frame every client receives.
    pub fn frame_len(&self) -> usize {
        self.frame.len()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Accept one client and deliver the frame to it.
    ///
    /// Only accept errors are returned; transport errors end up in the
    /// outcome.
    pub async fn serve_one(&mut self) -> io::Result<SessionOutcome> {
        let (stream, peer) = self.listener.accept().await?;
        Ok(self.session(stream, peer).await)
    }

    /// Serve clients until `shutdown` resolves, then close the listener.
    ///
    /// A shutdown that arrives mid-transfer drops the current client.
    pub async fn serve_until<F>(mut self, shutdown: F) -> ServeSummary
    where
        F: Future<Output = ()>,
    {
        let mut summary = ServeSummary::default();
        tokio::pin!(shutdown);

        let mut accept_failures = 0u32;

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(pair) => {
                    accept_failures = 0;
                    pair
                }
                Err(e) => {
                    accept_failures = accept_failures.saturating_add(1);
                    let delay = accept_backoff(accept_failures);
                    tracing::warn!("Accept failed: {}, retrying in {:?}", e, delay);
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
            };

            let outcome = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(peer = %peer, "Shutdown during transfer, dropping client");
                    break;
                }
                outcome = self.session(stream, peer) => outcome,
            };

            if outcome.is_completed() {
                summary.completed += 1;
            } else {
                summary.failed += 1;
            }
        }

        tracing::info!(
            "Server shutting down ({} completed, {} failed)",
            summary.completed,
            summary.failed
        );
        summary
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> ServeSummary {
        self.serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    async fn session(&mut self, mut stream: TcpStream, peer: SocketAddr) -> SessionOutcome {
        self.transition(SessionState::Accepted);
        tracing::info!(peer = %peer, "Connection established");

        self.transition(SessionState::Sending);
        let outcome = deliver(&mut stream, &self.frame, self.chunk_size, self.write_timeout).await;
        drop(stream);
        self.transition(SessionState::Closed);

        match &outcome {
            SessionOutcome::Completed { bytes } => tracing::info!(
                peer = %peer,
                bytes = *bytes,
                "File {} sent successfully",
                self.source.display()
            ),
            SessionOutcome::Failed { sent, error } => tracing::warn!(
                peer = %peer,
                sent = *sent,
                total = self.frame.len(),
                "Error while sending file: {}",
                error
            ),
        }
        tracing::info!(peer = %peer, "Connection closed");

        self.transition(SessionState::Listening);
        outcome
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!("Session {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Write `frame` to `writer` in `chunk_size` pieces, then shut the write side
/// down.
///
/// With `write_timeout` set, each chunk must be accepted within that time.
pub async fn deliver<W>(
    writer: &mut W,
    frame: &[u8],
    chunk_size: usize,
    write_timeout: Option<Duration>,
) -> SessionOutcome
where
    W: AsyncWrite + Unpin,
{
    let mut sent = 0;

    for chunk in frame.chunks(chunk_size.max(1)) {
        let written = match write_timeout {
            Some(limit) => match tokio::time::timeout(limit, writer.write_all(chunk)).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("client did not accept data within {:?}", limit),
                )),
            },
            None => writer.write_all(chunk).await,
        };

        if let Err(error) = written {
            return SessionOutcome::Failed { sent, error };
        }
        sent += chunk.len();
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!("Shutdown after full send failed: {}", e);
    }

    SessionOutcome::Completed { bytes: sent }
}

/// Delay before retrying after the `failures`th consecutive accept error.
///
/// Doubles from 100ms up to a 5s ceiling, so a persistent error such as
/// running out of file descriptors does not spin the loop.
fn accept_backoff(failures: u32) -> Duration {
    const FIRST: Duration = Duration::from_millis(100);
    const CEILING: Duration = Duration::from_secs(5);

    let shift = failures.saturating_sub(1).min(16);
    FIRST.saturating_mul(1 << shift).min(CEILING)
}

fn listen(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    #[cfg(unix)]
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::AsyncReadExt;

    /// Accepts `limit` bytes, then fails every write with a reset.
    struct FlakyWriter {
        accepted: Vec<u8>,
        limit: usize,
    }

    impl AsyncWrite for FlakyWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let room = self.limit - self.accepted.len();
            if room == 0 {
                return Poll::Ready(Err(io::Error::from(io::ErrorKind::ConnectionReset)));
            }
            let n = room.min(buf.len());
            self.accepted.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_state_machine() {
        use SessionState::*;
        assert!(Listening.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(Sending));
        assert!(Sending.can_transition_to(Closed));
        assert!(Closed.can_transition_to(Listening));

        assert!(!Listening.can_transition_to(Sending));
        assert!(!Sending.can_transition_to(Accepted));
        assert!(!Closed.can_transition_to(Accepted));
    }

    #[tokio::test]
    async fn test_deliver_whole_frame_in_chunks() {
        let frame: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        let (mut server, mut client) = tokio::io::duplex(64);

        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            client.read_to_end(&mut received).await.unwrap();
            received
        });

        let outcome = deliver(&mut server, &frame, 1024, None).await;
        drop(server);

        assert!(matches!(outcome, SessionOutcome::Completed { bytes: 5000 }));
        assert_eq!(reader.await.unwrap(), frame);
    }

    #[tokio::test]
    async fn test_deliver_reports_partial_send() {
        let frame = vec![0xAA; 3000];
        let mut writer = FlakyWriter {
            accepted: Vec::new(),
            limit: 1500,
        };

        let outcome = deliver(&mut writer, &frame, 1024, None).await;
        match outcome {
            SessionOutcome::Failed { sent, error } => {
                // First chunk went out whole, second was cut short
                assert_eq!(sent, 1024);
                assert_eq!(error.kind(), io::ErrorKind::ConnectionReset);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(writer.accepted.len(), 1500);
    }

    #[tokio::test]
    async fn test_deliver_times_out_on_stalled_client() {
        // Nobody reads the other end, so the second chunk never fits
        let (mut server, _client) = tokio::io::duplex(16);
        let frame = vec![0u8; 64];

        let outcome = deliver(&mut server, &frame, 16, Some(Duration::from_millis(50))).await;
        match outcome {
            SessionOutcome::Failed { sent, error } => {
                assert_eq!(sent, 16);
                assert_eq!(error.kind(), io::ErrorKind::TimedOut);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bind_missing_source() {
        let config = ServerConfig::default()
            .with_host("127.0.0.1")
            .with_port(0)
            .with_source("/nonexistent/compressed_image.bin");

        let err = DeliveryServer::bind(&config).await.unwrap_err();
        assert!(matches!(err, Error::SourceMissing(_)));
    }

    #[tokio::test]
    async fn test_bind_rejects_zero_chunk_size() {
        let config = ServerConfig::default().with_chunk_size(0);
        let err = DeliveryServer::bind(&config).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_accept_backoff_grows_then_caps() {
        assert_eq!(accept_backoff(1), Duration::from_millis(100));
        assert_eq!(accept_backoff(2), Duration::from_millis(200));
        assert_eq!(accept_backoff(4), Duration::from_millis(800));
        assert_eq!(accept_backoff(7), Duration::from_secs(5));
        assert_eq!(accept_backoff(u32::MAX), Duration::from_secs(5));
        assert!(accept_backoff(0) > Duration::ZERO);
    }
}
