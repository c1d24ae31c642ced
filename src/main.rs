//! CLI entry point for listmail.

use clap::{Args, Parser, Subcommand};
use lettre::message::Mailbox;
use listmail::{
    start_server, AddressSource, BatchSize, BroadcastConfig, Draft, DryRun, Error, RelayConfig,
    SendReport, ServerOptions, SmtpRelay, TlsMode, Transport,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "listmail")]
#[command(about = "Broadcast an email, blind-copied in batches, to a CSV mailing list")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    broadcast: BroadcastArgs,

    #[command(flatten)]
    relay: RelayArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the compose form over HTTP
    Serve {
        /// Interface to listen on
        #[arg(long, env = "LISTMAIL_HOST", default_value = "127.0.0.1")]
        host: String,

        /// HTTP port to listen on
        #[arg(short = 'p', long, env = "LISTMAIL_PORT", default_value = "8080")]
        port: u16,

        /// Largest accepted request body in bytes, attachments included
        #[arg(long, env = "LISTMAIL_MAX_UPLOAD", default_value_t = listmail::DEFAULT_MAX_UPLOAD)]
        max_upload: usize,
    },
    /// Send one message from the command line and exit
    Send(SendArgs),
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Subject line; a Markdown body's leading heading is used when omitted
    #[arg(short = 's', long)]
    subject: Option<String>,

    /// File holding the message body: plain text, or Markdown when it ends
    /// in `.md` or `--markdown` is given
    #[arg(short = 'b', long)]
    body_file: PathBuf,

    /// Render the body file as Markdown whatever its extension
    #[arg(long)]
    markdown: bool,

    /// File to attach (repeatable)
    #[arg(short = 'a', long = "attach")]
    attachments: Vec<PathBuf>,
}

impl SendArgs {
    fn is_markdown(&self) -> bool {
        self.markdown
            || self
                .body_file
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
    }

    /// Subject and HTML body from the body file.
    async fn content(&self) -> std::io::Result<(String, String)> {
        let raw = tokio::fs::read_to_string(&self.body_file).await?;
        if self.is_markdown() {
            let rendered = listmail::markdown::render(&raw);
            let subject = self.subject.clone().or(rendered.subject).ok_or_else(|| {
                Error::Config(format!(
                    "{} does not start with a heading, pass --subject",
                    self.body_file.display()
                ))
            })?;
            return Ok((subject, rendered.html));
        }
        let subject = self
            .subject
            .clone()
            .ok_or_else(|| Error::Config("--subject is required for a plain-text body".to_string()))?;
        Ok((subject, listmail::body::prepare(&raw)))
    }

    /// Compose a draft from the body file and stage every attachment.
    async fn draft(&self) -> std::io::Result<Draft> {
        let (subject, html) = self.content().await?;
        let mut draft = Draft::open()?;
        draft.compose_html(subject, html)?;
        for path in &self.attachments {
            let name = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            let file = tokio::fs::File::open(path).await?;
            draft.attach(&name, file).await?;
        }
        Ok(draft)
    }

    async fn send(
        &self,
        broadcast: &BroadcastConfig,
        transport: Arc<dyn Transport>,
    ) -> std::io::Result<SendReport> {
        let draft = self.draft().await?;
        let dispatcher = broadcast.dispatcher(transport)?;
        Ok(dispatcher.broadcast(draft, &broadcast.source).await?)
    }
}

#[derive(Args, Debug)]
struct BroadcastArgs {
    /// CSV file with one member per row and a header line
    #[arg(short = 'l', long, env = "LISTMAIL_LIST", default_value = "liste.csv", global = true)]
    list: PathBuf,

    /// Zero-based CSV column holding the email address
    #[arg(long, env = "LISTMAIL_COLUMN", default_value_t = listmail::address::DEFAULT_EMAIL_COLUMN, global = true)]
    column: usize,

    /// Recipients per message
    #[arg(long, env = "LISTMAIL_BATCH_SIZE", default_value_t = BatchSize::DEFAULT, global = true)]
    batch_size: BatchSize,

    /// Send to the debug addresses instead of the CSV list
    #[arg(long, env = "LISTMAIL_DEBUG", global = true)]
    debug: bool,

    /// Recipient used in debug mode (repeatable)
    #[arg(long = "debug-address", env = "LISTMAIL_DEBUG_ADDRESSES", value_delimiter = ',', global = true)]
    debug_addresses: Vec<String>,

    /// Log messages instead of handing them to the relay
    #[arg(long, env = "LISTMAIL_DRY_RUN", global = true)]
    dry_run: bool,

    /// Sender address
    #[arg(long, env = "LISTMAIL_FROM", default_value = "", global = true)]
    from: String,
}

#[derive(Args, Debug)]
struct RelayArgs {
    /// SMTP relay host
    #[arg(long, env = "LISTMAIL_SMTP_HOST", default_value = "", global = true)]
    smtp_host: String,

    /// SMTP relay port
    #[arg(long, env = "LISTMAIL_SMTP_PORT", default_value = "465", global = true)]
    smtp_port: u16,

    /// implicit, starttls or none
    #[arg(long, env = "LISTMAIL_SMTP_TLS", default_value_t = TlsMode::Implicit, global = true)]
    smtp_tls: TlsMode,

    /// SMTP username (defaults to the sender address)
    #[arg(long, env = "LISTMAIL_SMTP_USER", global = true)]
    smtp_user: Option<String>,

    /// SMTP password
    #[arg(long, env = "LISTMAIL_SMTP_PASSWORD", hide_env_values = true, global = true)]
    smtp_password: Option<String>,
}

impl Cli {
    fn broadcast_config(&self) -> std::io::Result<BroadcastConfig> {
        let args = &self.broadcast;
        if args.from.is_empty() {
            return Err(listmail::Error::Config("--from is required".to_string()).into());
        }
        let source = if args.debug {
            if args.debug_addresses.is_empty() {
                return Err(listmail::Error::Config(
                    "--debug needs at least one --debug-address".to_string(),
                )
                .into());
            }
            AddressSource::Static(args.debug_addresses.clone())
        } else {
            AddressSource::Csv {
                path: args.list.clone(),
                column: args.column,
            }
        };
        Ok(BroadcastConfig {
            sender: args.from.clone(),
            batch_size: args.batch_size,
            source,
        })
    }

    fn relay_config(&self) -> std::io::Result<RelayConfig> {
        let username = match &self.relay.smtp_user {
            Some(user) => user.clone(),
            None => sender_login(&self.broadcast.from)?,
        };
        Ok(RelayConfig {
            host: self.relay.smtp_host.clone(),
            port: self.relay.smtp_port,
            tls: self.relay.smtp_tls,
            username: Some(username),
            password: self.relay.smtp_password.clone(),
        })
    }

    fn transport(&self) -> std::io::Result<Arc<dyn Transport>> {
        if self.broadcast.dry_run {
            info!("Dry run: nothing will be sent");
            return Ok(Arc::new(DryRun));
        }
        Ok(Arc::new(SmtpRelay::new(&self.relay_config()?)?))
    }
}

/// Bare address of `--from`, used as the relay login when none is given.
fn sender_login(from: &str) -> listmail::Result<String> {
    let mailbox: Mailbox = from
        .parse()
        .map_err(|e| Error::Config(format!("invalid sender {from:?}: {e}")))?;
    Ok(mailbox.email.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let broadcast = cli.broadcast_config()?;
    let transport = cli.transport()?;

    match cli.command {
        Command::Serve {
            host,
            port,
            max_upload,
        } => {
            let opts = ServerOptions {
                host,
                http_port: Some(port),
                max_upload: Some(max_upload),
                broadcast,
            };
            let server = start_server(opts, transport).await?;

            // Wait for Ctrl+C
            tokio::signal::ctrl_c().await?;
            server.stop().await;
        }
        Command::Send(args) => {
            let report = args.send(&broadcast, transport).await?;
            info!(
                "Sent to {} recipients in {} batches",
                report.recipients, report.batches
            );
        }
    }

    Ok(())
}
