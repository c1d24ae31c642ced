//! Batched blind-copy broadcast with partial-failure aggregation.

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::address::AddressSource;
use crate::batch::{chunk, BatchSize};
use crate::email::Message;
use crate::error::{DeliveryError, Error, Result};
use crate::session::Draft;
use crate::store::AttachmentStore;
use crate::transport::Transport;

/// Attachment bytes loaded from the store, ready to be embedded in every batch.
#[derive(Debug, Clone)]
pub struct ResolvedAttachment {
    pub display_name: String,
    pub content_type: ContentType,
    pub data: Vec<u8>,
}

/// Load every attachment of `message` from `store`, preserving order.
pub async fn resolve_attachments(
    store: &AttachmentStore,
    message: &Message,
) -> Result<Vec<ResolvedAttachment>> {
    let mut resolved = Vec::with_capacity(message.attachments.len());
    for att in &message.attachments {
        let data = store.read(&att.handle).await?;
        let content_type = content_type_for(&att.display_name, &data)?;
        resolved.push(ResolvedAttachment {
            display_name: att.display_name.clone(),
            content_type,
            data,
        });
    }
    Ok(resolved)
}

/// Sniff the type from the bytes, then guess from the file extension, then
/// fall back to `application/octet-stream`.
fn content_type_for(display_name: &str, data: &[u8]) -> Result<ContentType> {
    let mime = match infer::get(data) {
        Some(kind) => kind.mime_type().to_string(),
        None => mime_guess::from_path(display_name)
            .first_or_octet_stream()
            .to_string(),
    };
    ContentType::parse(&mime).map_err(|e| Error::Store(format!("bad content type {mime:?}: {e}")))
}

/// One batch that could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Zero-based position of the batch in send order
    pub index: usize,
    pub error: DeliveryError,
}

/// Result of attempting every batch of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOutcome {
    /// Number of recipients across all batches
    pub recipients: usize,
    /// Number of batches attempted
    pub batches: usize,
    /// Failed batches, in batch order
    pub failures: Vec<BatchFailure>,
}

/// Summary of a fully successful broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub recipients: usize,
    pub batches: usize,
}

impl SendOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse into a report, or an [`Error::AggregateSend`] carrying the
    /// first failure when any batch failed.
    pub fn into_result(self) -> Result<SendReport> {
        let failed = self.failures.len();
        match self.failures.into_iter().next() {
            None => Ok(SendReport {
                recipients: self.recipients,
                batches: self.batches,
            }),
            Some(first) => Err(Error::AggregateSend {
                first: first.error,
                failed,
                total: self.batches,
            }),
        }
    }
}

/// Sends a message to a recipient list, one blind-copy batch at a time.
#[derive(Clone)]
pub struct Dispatcher {
    sender: Mailbox,
    batch_size: BatchSize,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(sender: Mailbox, batch_size: BatchSize, transport: Arc<dyn Transport>) -> Self {
        Self {
            sender,
            batch_size,
            transport,
        }
    }

    #[must_use]
    pub const fn batch_size(&self) -> BatchSize {
        self.batch_size
    }

    /// Attempt delivery of `message` to every batch of `addresses`, in order.
    ///
    /// A failing batch is logged and recorded, never retried, and does not stop
    /// the batches after it.
    pub async fn send(
        &self,
        message: &Message,
        attachments: &[ResolvedAttachment],
        addresses: &[String],
    ) -> SendOutcome {
        let batches = chunk(addresses, self.batch_size);
        let total = batches.len();
        let mut outcome = SendOutcome {
            recipients: addresses.len(),
            batches: total,
            failures: Vec::new(),
        };

        for (index, rcpts) in batches.enumerate() {
            info!("Sending batch {}/{total} ({} recipients)", index + 1, rcpts.len());
            debug!("Batch {} recipients: {rcpts:?}", index + 1);

            let result = match self.build(message, attachments, rcpts) {
                Ok(mail) => self.transport.deliver(mail).await.map_err(|e| e.to_string()),
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                error!("Could not send batch {}/{total}: {e}", index + 1);
                outcome.failures.push(BatchFailure {
                    index,
                    error: DeliveryError::new(rcpts, e),
                });
            }
        }

        if outcome.is_success() {
            info!(
                "Emails sent successfully to {} recipients in {total} batches",
                outcome.recipients
            );
        } else {
            warn!("{}/{total} batches failed", outcome.failures.len());
        }
        outcome
    }

    /// Full send path for a draft: load recipients, resolve attachments,
    /// dispatch every batch. The draft's attachment store is released whatever
    /// happens.
    pub async fn broadcast(&self, mut draft: Draft, source: &AddressSource) -> Result<SendReport> {
        let result = self.broadcast_draft(&draft, source).await;
        draft.release();
        result
    }

    async fn broadcast_draft(&self, draft: &Draft, source: &AddressSource) -> Result<SendReport> {
        let message = draft.message();
        info!("Broadcasting {:?} to {}", message.subject, source.describe());

        let loader = source.clone();
        let addresses = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| Error::Source(format!("address list loader stopped: {e}")))??;
        let attachments = resolve_attachments(draft.store(), message).await?;
        self.send(message, &attachments, &addresses)
            .await
            .into_result()
    }

    fn build(
        &self,
        message: &Message,
        attachments: &[ResolvedAttachment],
        rcpts: &[String],
    ) -> std::result::Result<lettre::Message, String> {
        let mut builder = lettre::Message::builder()
            .from(self.sender.clone())
            .subject(message.subject.as_str());

        for rcpt in rcpts {
            let mailbox: Mailbox = rcpt
                .parse()
                .map_err(|e| format!("invalid recipient {rcpt:?}: {e}"))?;
            builder = builder.bcc(mailbox);
        }

        let html = SinglePart::html(message.html_body.clone());
        let built = if attachments.is_empty() {
            builder.singlepart(html)
        } else {
            let mut parts = MultiPart::mixed().singlepart(html);
            for att in attachments {
                parts = parts.singlepart(
                    Attachment::new(att.display_name.clone())
                        .body(att.data.clone(), att.content_type.clone()),
                );
            }
            builder.multipart(parts)
        };
        built.map_err(|e| format!("could not build message: {e}"))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sender", &self.sender)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}
