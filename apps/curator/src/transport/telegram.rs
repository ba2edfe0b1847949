//! Bot API client: the production `Transport`.
//!
//! All calls are JSON POSTs against `{api_url}/bot{token}/{method}`; file
//! contents come from `{api_url}/file/bot{token}/{file_path}`.
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ImageVariant, Message, Transport, TransportError, Update};

const MAX_RETRIES: u32 = 3;
const ALLOWED_UPDATES: [&str; 2] = ["message", "channel_post"];

#[derive(Debug, Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GetFileRequest<'a> {
    file_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireUpdate {
    update_id: i64,
    message: Option<WireMessage>,
    channel_post: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    chat: WireChat,
    from: Option<WireUser>,
    sender_chat: Option<WireChat>,
    text: Option<String>,
    caption: Option<String>,
    #[serde(default)]
    photo: Vec<WirePhotoSize>,
}

#[derive(Debug, Deserialize)]
struct WireChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct WirePhotoSize {
    file_id: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct WireFile {
    file_path: Option<String>,
}

impl From<WireUpdate> for Update {
    fn from(wire: WireUpdate) -> Self {
        let message = wire.message.or(wire.channel_post).map(|msg| {
            let submitter = msg
                .from
                .map(|u| u.id)
                .or(msg.sender_chat.map(|c| c.id))
                .unwrap_or(msg.chat.id);
            Message {
                chat_id: msg.chat.id,
                submitter_id: submitter.to_string(),
                text: msg.text.or(msg.caption),
                image_variants: msg
                    .photo
                    .into_iter()
                    .map(|p| ImageVariant {
                        file_ref: p.file_id,
                        resolution: u64::from(p.width) * u64::from(p.height),
                    })
                    .collect(),
            }
        });
        Update {
            sequence: wire.update_id,
            message,
        }
    }
}

/// Outcome of a single HTTP attempt, before the retry policy is applied.
enum Attempt<T> {
    Done(T),
    Retry {
        error: TransportError,
        wait: Option<Duration>,
    },
}

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: String,
    long_poll_secs: u64,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: String, long_poll_secs: u64) -> Result<Self, TransportError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(long_poll_secs + 30))
                .build()?,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            long_poll_secs,
        })
    }

    /// Calls a Bot API method and returns its `result`.
    /// Retries on connection failures, 429 and 5xx with exponential backoff.
    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let url = format!("{}/bot{}/{}", self.api_url, self.token, method);
        let mut last_error: Option<TransportError> = None;
        let mut wait: Option<Duration> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff (1s, then 2s) unless the server asked for more
                let backoff = Duration::from_millis(1000 * (1 << (attempt - 1)));
                let delay = wait.take().map_or(backoff, |w| w.max(backoff));
                warn!(
                    "{} attempt {} failed, retrying after {}ms...",
                    method,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&url, body).await? {
                Attempt::Done(result) => return Ok(result),
                Attempt::Retry { error, wait: w } => {
                    last_error = Some(error);
                    wait = w;
                }
            }
        }

        Err(last_error.unwrap_or(TransportError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    async fn attempt<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<Attempt<T>, TransportError> {
        let response = match self.client.post(url).json(body).send().await {
            Ok(r) => r,
            Err(e) => {
                return Ok(Attempt::Retry {
                    error: TransportError::Http(e),
                    wait: None,
                })
            }
        };

        let status = response.status();
        let text = response.text().await?;

        if status.as_u16() == 429 || status.is_server_error() {
            warn!("Bot API returned {}: {}", status, text);
            let wait = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&text)
                .ok()
                .and_then(|e| e.parameters)
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs);
            return Ok(Attempt::Retry {
                error: TransportError::Api {
                    status: status.as_u16(),
                    message: text,
                },
                wait,
            });
        }

        parse_envelope(status.as_u16(), &text).map(Attempt::Done)
    }

    async fn resolve_file_path(&self, file_ref: &str) -> Result<String, TransportError> {
        let file: WireFile = self
            .call("getFile", &GetFileRequest { file_id: file_ref })
            .await?;
        file.file_path
            .ok_or_else(|| TransportError::MissingFile(file_ref.to_string()))
    }
}

/// Unwraps the `{ ok, result, description }` envelope every method returns.
fn parse_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, TransportError> {
    let envelope: ApiEnvelope<T> = serde_json::from_str(body)?;
    match (envelope.ok, envelope.result) {
        (true, Some(result)) => Ok(result),
        _ => Err(TransportError::Api {
            status: envelope.error_code.unwrap_or(status),
            message: envelope
                .description
                .unwrap_or_else(|| "request failed without description".to_string()),
        }),
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn fetch_updates(&self, since: i64) -> Result<Vec<Update>, TransportError> {
        let request = GetUpdatesRequest {
            offset: since + 1,
            timeout: self.long_poll_secs,
            allowed_updates: &ALLOWED_UPDATES,
        };
        let updates: Vec<WireUpdate> = self.call("getUpdates", &request).await?;
        debug!("getUpdates returned {} updates after {}", updates.len(), since);
        Ok(updates.into_iter().map(Update::from).collect())
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        let _: serde_json::Value = self
            .call("sendMessage", &SendMessageRequest { chat_id, text })
            .await?;
        Ok(())
    }

    async fn download(&self, file_ref: &str) -> Result<Bytes, TransportError> {
        let file_path = self.resolve_file_path(file_ref).await?;
        let url = format!("{}/file/bot{}/{}", self.api_url, self.token, file_path);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: format!("download of {file_path} failed"),
            });
        }
        let content = response.bytes().await?;
        debug!("Downloaded {} ({} bytes)", file_path, content.len());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_updates(body: &str) -> Vec<Update> {
        parse_envelope::<Vec<WireUpdate>>(200, body)
            .unwrap()
            .into_iter()
            .map(Update::from)
            .collect()
    }

    #[test]
    fn test_direct_message_uses_sender_as_submitter() {
        let updates = parse_updates(
            r#"{"ok":true,"result":[{"update_id":41,"message":{
                "message_id":7,"chat":{"id":-100500},"from":{"id":9001},"text":"a cat"}}]}"#,
        );
        assert_eq!(updates.len(), 1);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(updates[0].sequence, 41);
        assert_eq!(message.chat_id, -100500);
        assert_eq!(message.submitter_id, "9001");
        assert_eq!(message.text.as_deref(), Some("a cat"));
    }

    #[test]
    fn test_channel_post_with_photo_and_caption() {
        let updates = parse_updates(
            r#"{"ok":true,"result":[{"update_id":42,"channel_post":{
                "message_id":8,"chat":{"id":-100500},"sender_chat":{"id":-100500},
                "caption":"sunset over the bay",
                "photo":[
                    {"file_id":"AAA","width":90,"height":67},
                    {"file_id":"CCC","width":1280,"height":960},
                    {"file_id":"BBB","width":320,"height":240}
                ]}}]}"#,
        );
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.submitter_id, "-100500");
        assert_eq!(message.text.as_deref(), Some("sunset over the bay"));
        assert_eq!(message.image_variants.len(), 3);
        assert_eq!(message.best_image().unwrap().file_ref, "CCC");
    }

    #[test]
    fn test_unknown_update_kind_keeps_sequence_without_message() {
        let updates = parse_updates(
            r#"{"ok":true,"result":[{"update_id":43,"edited_message":{"chat":{"id":1}}}]}"#,
        );
        assert_eq!(updates[0].sequence, 43);
        assert!(updates[0].message.is_none());
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        assert!(parse_updates(r#"{"ok":true,"result":[]}"#).is_empty());
    }

    #[test]
    fn test_error_envelope_maps_to_api_error() {
        let err = parse_envelope::<Vec<WireUpdate>>(
            401,
            r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#,
        )
        .unwrap_err();
        match err {
            TransportError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_json_maps_to_parse_error() {
        let err = parse_envelope::<Vec<WireUpdate>>(200, "<html>gateway</html>").unwrap_err();
        assert!(matches!(err, TransportError::Parse(_)));
    }

    #[test]
    fn test_new_strips_trailing_slash_from_api_url() {
        let client = TelegramClient::new("https://api.example.org/", "t".to_string(), 0).unwrap();
        assert_eq!(client.api_url, "https://api.example.org");
    }
}
