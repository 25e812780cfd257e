use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::handlers::dispatch;
use crate::request::ParsedRequest;
use crate::response::ResponseWriter;

/// How long shutdown waits for in-flight handlers before abandoning them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Process-wide handler outcome counters, shared into every connection task.
/// Observability only; never consulted by routing or response code.
#[derive(Debug, Default)]
pub struct Telemetry {
    handled: AtomicU64,
    failed: AtomicU64,
}

impl Telemetry {
    pub fn record_success(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

pub struct HttpServer {
    listener: TcpListener,
    directory: PathBuf,
    telemetry: Arc<Telemetry>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl HttpServer {
    /// Binds the listener. A bind failure aborts startup entirely.
    pub async fn serve(addr: &str, directory: PathBuf) -> Result<(Self, oneshot::Sender<()>)> {
        let listener = TcpListener::bind(addr).await?;
        let (tx, rx) = oneshot::channel::<()>();
        Ok((
            Self {
                listener,
                directory,
                telemetry: Arc::new(Telemetry::default()),
                shutdown_rx: rx,
            },
            tx,
        ))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        Arc::clone(&self.telemetry)
    }

    /// Accept loop. Each connection runs on its own task, tracked so that
    /// shutdown can drain in-flight handlers; the loop itself never waits on
    /// a handler.
    pub async fn listen(mut self) -> Result<()> {
        let tracker = TaskTracker::new();
        loop {
            tokio::select! {
                _ = &mut self.shutdown_rx => break,
                result = self.listener.accept() => {
                    let (conn, addr) = result?;
                    let directory = self.directory.clone();
                    let telemetry = Arc::clone(&self.telemetry);
                    tracker.spawn(async move {
                        match Self::handle_connection(conn, addr, &directory).await {
                            Ok(()) => telemetry.record_success(),
                            Err(e) => {
                                telemetry.record_failure();
                                warn!(%addr, error = %e, "connection failed");
                            }
                        }
                    });
                }
            }
        }

        // stop accepting, then drain; stragglers past the grace period are
        // abandoned rather than killed
        drop(self.listener);
        tracker.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, tracker.wait())
            .await
            .is_err()
        {
            warn!(
                in_flight = tracker.len(),
                "shutdown grace period elapsed, abandoning in-flight handlers"
            );
        }

        info!(
            handled = self.telemetry.handled(),
            failed = self.telemetry.failed(),
            "server stopped"
        );
        Ok(())
    }

    /// One request, one response, then the connection closes. No keep-alive.
    async fn handle_connection(conn: TcpStream, addr: SocketAddr, directory: &Path) -> Result<()> {
        debug!(%addr, "accepted connection");
        let mut reader = BufReader::new(conn);
        let request = ParsedRequest::parse_from(&mut reader).await?;
        let response = dispatch(&request, &mut reader, directory).await?;
        let mut writer = ResponseWriter::from(reader.into_inner());
        writer.write_response(&response).await?;
        debug!(%addr, status = response.status().code(), "request served");
        Ok(())
    }
}
