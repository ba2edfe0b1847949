//! Transport: the boundary between the submission pipeline and the chat service.
//!
//! The pipeline only ever needs three operations: fetch pending updates after a
//! cursor, send a text reply, and download an attachment. `TelegramClient` is the
//! production backend; tests swap in an in-memory fake.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod telegram;

pub use telegram::TelegramClient;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("File reference {0} has no downloadable content")]
    MissingFile(String),
}

/// One entry of the remote update queue.
///
/// `message` is `None` for update kinds the pipeline does not understand; those
/// still move the cursor forward.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub sequence: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub chat_id: i64,
    pub submitter_id: String,
    pub text: Option<String>,
    pub image_variants: Vec<ImageVariant>,
}

/// A single rendition of an attached image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageVariant {
    pub file_ref: String,
    pub resolution: u64,
}

impl Message {
    /// The highest-resolution variant of the attached image, if any.
    pub fn best_image(&self) -> Option<&ImageVariant> {
        self.image_variants.iter().max_by_key(|v| v.resolution)
    }

    /// Message text with surrounding whitespace removed; `None` when blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Carried by the ingestor as a generic parameter.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Updates with a sequence number strictly greater than `since`.
    /// An empty queue is `Ok(vec![])`, not an error.
    async fn fetch_updates(&self, since: i64) -> Result<Vec<Update>, TransportError>;

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;

    async fn download(&self, file_ref: &str) -> Result<Bytes, TransportError>;
}

#[cfg(test)]
pub mod fake {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory transport. Every fetch returns the whole queue, the way a
    /// remote queue re-delivers anything not yet acknowledged.
    #[derive(Default)]
    pub struct FakeTransport {
        pub queue: Mutex<Vec<Update>>,
        pub files: Mutex<HashMap<String, Bytes>>,
        pub sent: Mutex<Vec<(i64, String)>>,
        pub fail_fetch: Mutex<bool>,
        pub fail_send: Mutex<bool>,
    }

    impl FakeTransport {
        pub fn push(&self, update: Update) {
            self.queue.lock().unwrap().push(update);
        }

        pub fn add_file(&self, file_ref: &str, content: &[u8]) {
            self.files
                .lock()
                .unwrap()
                .insert(file_ref.to_string(), Bytes::copy_from_slice(content));
        }

        pub fn sent_texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn fetch_updates(&self, _since: i64) -> Result<Vec<Update>, TransportError> {
            if *self.fail_fetch.lock().unwrap() {
                return Err(TransportError::Api {
                    status: 502,
                    message: "bad gateway".to_string(),
                });
            }
            Ok(self.queue.lock().unwrap().clone())
        }

        async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
            if *self.fail_send.lock().unwrap() {
                return Err(TransportError::Api {
                    status: 403,
                    message: "bot was blocked".to_string(),
                });
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn download(&self, file_ref: &str) -> Result<Bytes, TransportError> {
            self.files
                .lock()
                .unwrap()
                .get(file_ref)
                .cloned()
                .ok_or_else(|| TransportError::MissingFile(file_ref.to_string()))
        }
    }

    pub fn text(sequence: i64, chat_id: i64, submitter: &str, text: &str) -> Update {
        Update {
            sequence,
            message: Some(Message {
                chat_id,
                submitter_id: submitter.to_string(),
                text: Some(text.to_string()),
                image_variants: vec![],
            }),
        }
    }

    pub fn photo(sequence: i64, chat_id: i64, submitter: &str, refs: &[(&str, u64)]) -> Update {
        Update {
            sequence,
            message: Some(Message {
                chat_id,
                submitter_id: submitter.to_string(),
                text: None,
                image_variants: refs
                    .iter()
                    .map(|(r, res)| ImageVariant {
                        file_ref: r.to_string(),
                        resolution: *res,
                    })
                    .collect(),
            }),
        }
    }
}
