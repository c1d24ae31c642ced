//! Custom error types for listmail.

use std::fmt;
use std::io;

/// Main error type for listmail operations.
#[derive(Debug)]
pub enum Error {
    /// I/O errors (network, file operations)
    Io(io::Error),
    /// Address list could not be opened or parsed
    Source(String),
    /// Attachment staging failed
    Store(String),
    /// A single batch could not be delivered
    Delivery(DeliveryError),
    /// At least one batch of a broadcast failed
    AggregateSend {
        /// First failure, in batch order
        first: DeliveryError,
        /// Number of failed batches
        failed: usize,
        /// Number of batches attempted
        total: usize,
    },
    /// Configuration errors
    Config(String),
}

/// Failure to hand one batch to the delivery transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    /// Addresses of the batch that failed
    pub recipients: Vec<String>,
    /// Transport or message-building error text
    pub message: String,
}

impl DeliveryError {
    #[must_use]
    pub fn new(recipients: &[String], message: impl Into<String>) -> Self {
        Self {
            recipients: recipients.to_vec(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Source(msg) => write!(f, "address list error: {msg}"),
            Self::Store(msg) => write!(f, "attachment error: {msg}"),
            Self::Delivery(e) => write!(f, "delivery error: {e}"),
            Self::AggregateSend {
                first,
                failed,
                total,
            } => write!(
                f,
                "could not send emails ({failed}/{total} batches failed): {first}"
            ),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not send mail to {} recipient(s): {}",
            self.recipients.len(),
            self.message
        )
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Delivery(e) | Self::AggregateSend { first: e, .. } => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for DeliveryError {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<DeliveryError> for Error {
    fn from(e: DeliveryError) -> Self {
        Self::Delivery(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Self::Source(e.to_string())
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(io_err) => io_err,
            other => Self::other(other.to_string()),
        }
    }
}

/// Result type alias for listmail operations.
pub type Result<T> = std::result::Result<T, Error>;
