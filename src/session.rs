//! Send sessions: a message being composed plus its staged attachments.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::AsyncRead;
use tracing::{debug, info};
use uuid::Uuid;

use crate::email::{AttachmentRef, ComposeRequest, Message};
use crate::error::{Error, Result};
use crate::store::AttachmentStore;

/// One in-progress message and the store holding its attachments.
#[derive(Debug)]
pub struct Draft {
    message: Message,
    store: AttachmentStore,
    /// Set once the contents were handed to a send; further edits are refused.
    consumed: bool,
}

impl Draft {
    /// Start an empty draft with a fresh attachment store.
    pub fn open() -> Result<Self> {
        Ok(Self {
            message: Message::default(),
            store: AttachmentStore::open()?,
            consumed: false,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.consumed {
            return Err(Error::Store("session already sent".to_string()));
        }
        Ok(())
    }

    /// Set subject and/or body from form input.
    pub fn compose(&mut self, req: &ComposeRequest) -> Result<()> {
        self.ensure_open()?;
        self.message.compose(req);
        Ok(())
    }

    /// Set the subject and an already-rendered HTML body.
    pub fn compose_html(&mut self, subject: String, html: String) -> Result<()> {
        self.ensure_open()?;
        self.message.subject = subject;
        self.message.html_body = html;
        Ok(())
    }

    /// Stage an attachment and append it to the message.
    ///
    /// On error the message and earlier attachments are left as they were.
    pub async fn attach<R>(&mut self, display_name: &str, reader: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        self.ensure_open()?;
        let handle = self.store.put(display_name, reader).await?;
        self.message.attachments.push(AttachmentRef {
            display_name: display_name.to_string(),
            handle,
        });
        Ok(())
    }

    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }

    #[must_use]
    pub const fn store(&self) -> &AttachmentStore {
        &self.store
    }

    /// Whether the contents were already taken for sending.
    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Drop the staged bytes. Idempotent.
    pub fn release(&mut self) {
        self.store.release();
    }
}

/// Shared handle to a draft; the async mutex serializes requests on one session.
pub type SharedDraft = Arc<tokio::sync::Mutex<Draft>>;

/// All open send sessions, keyed by session id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    drafts: Mutex<HashMap<Uuid, SharedDraft>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SharedDraft>> {
        self.drafts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new empty session and return its id.
    pub fn create(&self) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let draft = Arc::new(tokio::sync::Mutex::new(Draft::open()?));
        self.lock().insert(id, draft);
        info!("Opened send session {id}");
        Ok(id)
    }

    /// Return the session `id`, opening it on first use.
    pub fn get_or_open(&self, id: Uuid) -> Result<SharedDraft> {
        let mut drafts = self.lock();
        if let Some(draft) = drafts.get(&id) {
            return Ok(Arc::clone(draft));
        }
        let draft = Arc::new(tokio::sync::Mutex::new(Draft::open()?));
        drafts.insert(id, Arc::clone(&draft));
        drop(drafts);
        info!("Opened send session {id}");
        Ok(draft)
    }

    /// Remove the session so it can be sent. Later requests with the same id
    /// start a new session.
    pub fn take(&self, id: Uuid) -> Option<SharedDraft> {
        let draft = self.lock().remove(&id);
        if draft.is_some() {
            debug!("Took send session {id}");
        }
        draft
    }

    /// Remove the session and release its attachments. Returns false when no
    /// such session exists.
    pub async fn discard(&self, id: Uuid) -> bool {
        let Some(draft) = self.take(id) else {
            return false;
        };
        draft.lock().await.release();
        info!("Discarded send session {id}");
        true
    }

    /// Number of open sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Move a draft out of its shared handle once no other request holds it.
///
/// Waits for in-flight requests on the same session, then either unwraps the
/// `Arc` or, if a clone is still held by a late request, moves the message and
/// store out and marks the shared draft consumed so that request fails
/// instead of editing a draft nobody will send.
pub async fn into_draft(shared: SharedDraft) -> Result<Draft> {
    match Arc::try_unwrap(shared) {
        Ok(mutex) => Ok(mutex.into_inner()),
        Err(shared) => {
            let mut guard = shared.lock().await;
            guard.ensure_open()?;
            guard.consumed = true;
            let draft = Draft {
                message: std::mem::take(&mut guard.message),
                store: std::mem::take(&mut guard.store),
                consumed: false,
            };
            Ok(draft)
        }
    }
}
