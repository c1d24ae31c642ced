//! Compose an email in a web form (or from a Markdown file) and broadcast it,
//! blind-copied in batches, to a CSV mailing list through an SMTP relay.

pub mod address;
pub mod batch;
pub mod body;
pub mod dispatch;
pub mod email;
pub mod error;
mod http;
pub mod markdown;
pub mod session;
pub mod store;
pub mod transport;

pub use address::AddressSource;
pub use batch::{chunk, BatchSize};
pub use dispatch::{Dispatcher, SendOutcome, SendReport};
pub use email::{ComposeRequest, Message};
pub use error::{DeliveryError, Error, Result};
pub use session::{Draft, SessionRegistry};
pub use store::AttachmentStore;
pub use transport::{DryRun, RelayConfig, SmtpRelay, TlsMode, Transport};

use lettre::message::Mailbox;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Default upper bound for a request body, attachments included.
pub const DEFAULT_MAX_UPLOAD: usize = 25 * 1024 * 1024;

/// What a broadcast sends from, to whom, and in which batch size.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// `From` address (optionally with a display name)
    pub sender: String,
    pub batch_size: BatchSize,
    pub source: AddressSource,
}

impl BroadcastConfig {
    /// Build the dispatcher for this configuration.
    pub fn dispatcher(&self, transport: Arc<dyn Transport>) -> Result<Dispatcher> {
        let sender: Mailbox = self
            .sender
            .parse()
            .map_err(|e| Error::Config(format!("invalid sender {:?}: {e}", self.sender)))?;
        Ok(Dispatcher::new(sender, self.batch_size, transport))
    }
}

/// Configuration options for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub http_port: Option<u16>,
    pub max_upload: Option<usize>,
    pub broadcast: BroadcastConfig,
}

/// Running server handle.
pub struct RunningServer {
    pub http_addr: SocketAddr,
    pub sessions: Arc<SessionRegistry>,
    http_handle: tokio::task::JoinHandle<()>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RunningServer {
    /// Stop the server gracefully.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.http_handle.await;
    }
}

/// Start the compose/broadcast HTTP server, delivering through `transport`.
pub async fn start_server(
    opts: ServerOptions,
    transport: Arc<dyn Transport>,
) -> std::io::Result<RunningServer> {
    let http_port = opts.http_port.unwrap_or(8080);
    let max_upload = opts.max_upload.unwrap_or(DEFAULT_MAX_UPLOAD);

    let dispatcher = opts.broadcast.dispatcher(transport)?;
    let sessions = Arc::new(SessionRegistry::new());
    let source = Arc::new(opts.broadcast.source);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let http_listener = TcpListener::bind((opts.host.as_str(), http_port)).await?;
    let http_addr = http_listener.local_addr()?;

    tracing::info!(
        "Serving listmail at http://{http_addr}, batches of {}, recipients from {}",
        dispatcher.batch_size(),
        source.describe()
    );

    let app = http::router(Arc::clone(&sessions), dispatcher, source, max_upload);
    let http_shutdown = shutdown_tx.subscribe();
    let http_handle = tokio::spawn(async move {
        http::run_http_server(http_listener, app, http_shutdown).await;
    });

    Ok(RunningServer {
        http_addr,
        sessions,
        http_handle,
        shutdown_tx,
    })
}
