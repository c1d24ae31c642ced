//! Composed message types.

use crate::store::StorageHandle;
use serde::Deserialize;

/// A staged attachment as it will appear to recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub display_name: String,
    pub handle: StorageHandle,
}

/// The message being composed in a send session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    /// Already-prepared HTML, see [`crate::body::prepare`].
    pub html_body: String,
    /// In upload order.
    pub attachments: Vec<AttachmentRef>,
}

/// Subject and raw body text as entered in the compose form.
///
/// A field left out of the request keeps its previous value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeRequest {
    pub subject: Option<String>,
    pub body: Option<String>,
}

impl ComposeRequest {
    /// Request setting both subject and body.
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            body: Some(body.into()),
        }
    }
}

impl Message {
    /// Overwrite the fields present in `req`, keeping the rest and the
    /// attachments already staged.
    pub fn compose(&mut self, req: &ComposeRequest) {
        if let Some(subject) = &req.subject {
            self.subject.clone_from(subject);
        }
        if let Some(body) = &req.body {
            self.html_body = crate::body::prepare(body);
        }
    }

    /// Display names of the attachments, in upload order.
    #[must_use]
    pub fn attachment_names(&self) -> Vec<String> {
        self.attachments
            .iter()
            .map(|a| a.display_name.clone())
            .collect()
    }
}
