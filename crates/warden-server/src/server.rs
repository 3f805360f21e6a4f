//! TCP ingest server.
//!
//! One listener accepts camera hosts; each accepted connection gets its
//! own task that frames the stream, walks the handshake, and then feeds
//! a [`HostSession`] until the host disconnects. Sessions push
//! [`DashboardEvent`]s into a single unbounded channel owned by the
//! server, so a slow or absent consumer never stalls ingestion.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};
use warden_alerts::AlertDispatcher;
use warden_proto::{
    decode_header, decode_payload, DashboardEvent, DetectionBox, FrameCodec, HeaderTag,
    ProtocolError,
};
use warden_store::{scan, timestamp};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::session::{Handshake, HostSession};

/// Ingest server for a fleet of camera hosts.
#[derive(Debug)]
pub struct IngestServer {
    /// Server configuration.
    config: Arc<ServerConfig>,
    /// Alert delivery shared by every session.
    dispatcher: Arc<AlertDispatcher>,
    /// Sink every session pushes dashboard events into.
    events: mpsc::UnboundedSender<DashboardEvent>,
    /// Shutdown signal sender, cloned into every [`ShutdownHandle`].
    shutdown_tx: mpsc::Sender<()>,
    /// Receive half the accept loop waits on. Taken by [`serve`].
    ///
    /// [`serve`]: IngestServer::serve
    shutdown_rx: Option<mpsc::Receiver<()>>,
}

/// Stops a running [`IngestServer`] from another task.
///
/// `serve` borrows the server mutably for as long as it runs, so the
/// handle is how anything else reaches the accept loop. Cloning is
/// cheap; any clone can signal.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::Sender<()>,
}

impl ShutdownHandle {
    /// Signals the accept loop to stop. Never blocks; signaling more
    /// than once is harmless.
    pub fn shutdown(&self) {
        let _ = self.tx.try_send(());
    }
}

impl IngestServer {
    /// Creates a server and the event stream its sessions feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured notification channels cannot
    /// be built (for example an MMS recipient with an unknown carrier).
    pub fn new(
        config: ServerConfig,
    ) -> ServerResult<(Self, mpsc::UnboundedReceiver<DashboardEvent>)> {
        let dispatcher = config.notifications.build_dispatcher()?;
        Ok(Self::with_dispatcher(config, dispatcher))
    }

    /// Creates a server around an already-built dispatcher.
    #[must_use]
    pub fn with_dispatcher(
        config: ServerConfig,
        dispatcher: AlertDispatcher,
    ) -> (Self, mpsc::UnboundedReceiver<DashboardEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let server = Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            events,
            shutdown_tx,
            shutdown_rx: Some(shutdown_rx),
        };
        (server, rx)
    }

    /// The server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Starts the listener and serves connections until shut down.
    ///
    /// When run continuation is configured, every host with a prior run
    /// under the record root is announced downstream before the first
    /// connection is accepted, so the presentation layer can restore
    /// its last-known state.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails. Individual connection failures
    /// are logged and never stop the listener.
    pub async fn serve(&mut self) -> ServerResult<()> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;

        info!(addr = %addr, root = %self.config.record_root.display(), "ingest server listening");

        if self.config.continue_run {
            self.announce_recovered_runs();
        }

        let mut shutdown_rx = match self.shutdown_rx.take() {
            Some(rx) => rx,
            None => {
                // A previous serve consumed the receiver; arm a fresh
                // channel. Handles from before this point go stale.
                let (tx, rx) = mpsc::channel(1);
                self.shutdown_tx = tx;
                rx
            }
        };

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            self.handle_connection(stream, peer_addr);
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        info!("ingest server shutting down");
        Ok(())
    }

    /// Signals the accept loop to stop.
    ///
    /// The signal is buffered, so it also takes effect when sent before
    /// [`serve`] starts.
    ///
    /// [`serve`]: IngestServer::serve
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.try_send(());
    }

    /// A handle that can stop the accept loop while [`serve`] runs.
    ///
    /// [`serve`]: IngestServer::serve
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Announces every host's most recent run from a previous server
    /// lifetime.
    ///
    /// Hosts whose directories cannot be recovered are skipped with a
    /// warning; recovery of one host never blocks the others.
    fn announce_recovered_runs(&self) {
        let hosts = match scan::list_hosts(&self.config.record_root) {
            Ok(hosts) => hosts,
            Err(e) => {
                warn!(
                    root = %self.config.record_root.display(),
                    error = %e,
                    "record root scan failed, nothing recovered"
                );
                return;
            }
        };

        for hostname in hosts {
            match scan::recover_latest(&self.config.record_root, &hostname) {
                Ok(recovered) => {
                    let last_seen = recovered
                        .heartbeat
                        .and_then(|hb| timestamp::from_unix_seconds(hb.unix_seconds))
                        .unwrap_or_else(Utc::now);
                    info!(
                        host = %hostname,
                        dir = %recovered.run_dir.display(),
                        "recovered prior run"
                    );
                    let summary = recovered.summary;
                    self.emit(DashboardEvent::initialize(
                        summary.hostname,
                        summary.filter_classes,
                        summary.image_log,
                        last_seen,
                    ));
                }
                Err(e) => {
                    warn!(host = %hostname, error = %e, "skipping unrecoverable host");
                }
            }
        }
    }

    /// Hands a new connection its own task.
    fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) {
        debug!(peer = %peer_addr, "new connection");

        let config = Arc::clone(&self.config);
        let dispatcher = Arc::clone(&self.dispatcher);
        let events = self.events.clone();

        tokio::spawn(async move {
            match run_connection(stream, &config, dispatcher, events).await {
                Ok(()) => debug!(peer = %peer_addr, "connection closed"),
                Err(e) => warn!(peer = %peer_addr, error = %e, "connection ended with error"),
            }
        });
    }

    /// Pushes an event downstream, best-effort.
    fn emit(&self, event: DashboardEvent) {
        if self.events.send(event).is_err() {
            debug!("dashboard receiver gone, event dropped");
        }
    }
}

/// Drives one host connection from handshake to disconnect.
async fn run_connection(
    stream: TcpStream,
    config: &ServerConfig,
    dispatcher: Arc<AlertDispatcher>,
    events: mpsc::UnboundedSender<DashboardEvent>,
) -> ServerResult<()> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    // Handshake: CONFIG, then fields in any order, then DONE.
    let Some(first) = next_frame(&mut framed).await? else {
        return Ok(());
    };
    let header = decode_header(&first)?;
    if header != HeaderTag::Config {
        return Err(ProtocolError::UnexpectedHeader { header }.into());
    }

    let mut handshake = Handshake::new();
    let settings = loop {
        let header = match next_frame(&mut framed).await? {
            Some(frame) => decode_header(&frame)?,
            None => return Err(ServerError::ConnectionClosed),
        };
        if header == HeaderTag::Done {
            break handshake.finish()?;
        }
        let body = read_body(&mut framed, header).await?;
        handshake.absorb(header, &body)?;
    };

    let mut session = HostSession::activate(config, dispatcher, events, settings, Utc::now())?;

    // Active: images and liveness signals until the host hangs up.
    loop {
        let Some(frame) = next_frame(&mut framed).await? else {
            info!(host = %session.hostname(), "host disconnected");
            return Ok(());
        };
        let header = decode_header(&frame)?;
        match header {
            HeaderTag::Image => {
                let boxes: Vec<DetectionBox> =
                    decode_payload(&read_body(&mut framed, header).await?)?;
                let image = read_body(&mut framed, header).await?;
                session.handle_image(&boxes, &image, Utc::now())?;
            }
            HeaderTag::Connection => {
                let unix_seconds: f64 = decode_payload(&read_body(&mut framed, header).await?)?;
                session.handle_heartbeat(unix_seconds)?;
            }
            other => return Err(ProtocolError::UnexpectedHeader { header: other }.into()),
        }
    }
}

/// Pulls the next complete frame off the stream.
///
/// `None` means the peer closed cleanly on a frame boundary.
async fn next_frame(framed: &mut Framed<TcpStream, FrameCodec>) -> ServerResult<Option<Bytes>> {
    match framed.next().await {
        Some(Ok(frame)) => Ok(Some(frame)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(None),
    }
}

/// Reads the body frame a header requires.
async fn read_body(
    framed: &mut Framed<TcpStream, FrameCodec>,
    header: HeaderTag,
) -> ServerResult<Bytes> {
    match next_frame(framed).await? {
        Some(body) => Ok(body),
        None => Err(ProtocolError::MissingBody { header }.into()),
    }
}
