//! Helpers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use listmail::transport::{Transport, TransportError};
use std::collections::HashSet;
use std::sync::Mutex;

/// One delivery seen by a [`Recorder`].
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Envelope recipients (the batch's Bcc list)
    pub recipients: Vec<String>,
    /// Message as it would go on the wire
    pub formatted: String,
}

/// Transport that records every message and fails the batches listed in
/// `fail_on` (zero-based call index).
#[derive(Debug, Default)]
pub struct Recorder {
    fail_on: HashSet<usize>,
    deliveries: Mutex<Vec<Delivery>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_on: indices.into_iter().collect(),
            deliveries: Mutex::default(),
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for Recorder {
    async fn deliver(&self, message: lettre::Message) -> Result<(), TransportError> {
        let delivery = Delivery {
            recipients: message
                .envelope()
                .to()
                .iter()
                .map(ToString::to_string)
                .collect(),
            formatted: String::from_utf8_lossy(&message.formatted()).into_owned(),
        };
        let index = {
            let mut deliveries = self.deliveries.lock().unwrap();
            deliveries.push(delivery);
            deliveries.len() - 1
        };
        if self.fail_on.contains(&index) {
            return Err(format!("relay refused batch {index}").into());
        }
        Ok(())
    }
}

pub const SENDER: &str = "Bureau <bureau@example.org>";

pub fn addresses(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("member{i}@example.org")).collect()
}
