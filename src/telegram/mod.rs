//! Minimal Telegram Bot API client: delivery (`sendMessage`) plus the handful
//! of calls the long-poll front end needs.

use crate::delivery::{DeliveryError, DeliverySink};
use crate::types::SubscriberId;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub mod front_end;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Upper bound for every call except the long poll, which sets its own.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub message: Option<Message>,
}

pub struct TelegramClient {
    http: reqwest::Client,
    /// `{base}/bot{token}`; never logged.
    endpoint: String,
    request_timeout: Duration,
}

impl TelegramClient {
    pub fn new(http: reqwest::Client, api_base: &str, token: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<T, DeliveryError> {
        let req = self
            .http
            .post(format!("{}/{method}", self.endpoint))
            .json(body)
            .timeout(timeout.unwrap_or(self.request_timeout));
        // Strip the URL from transport errors: it embeds the bot token.
        let resp = req.send().await.map_err(|e| e.without_url())?;
        let parsed: ApiResponse<T> = resp.json().await.map_err(|e| e.without_url())?;
        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(DeliveryError::Rejected(
                parsed.description.unwrap_or_else(|| format!("{method} failed")),
            )),
        }
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<Value>,
    ) -> Result<(), DeliveryError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }
        self.call::<Value>("sendMessage", &body, None).await.map(|_| ())
    }

    pub async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), DeliveryError> {
        let body = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        self.call::<Value>("editMessageText", &body, None).await.map(|_| ())
    }

    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<(), DeliveryError> {
        let body = json!({ "callback_query_id": callback_id });
        self.call::<Value>("answerCallbackQuery", &body, None).await.map(|_| ())
    }

    /// Long-poll for updates after `offset`, waiting up to `poll` server-side.
    pub async fn get_updates(&self, offset: Option<i64>, poll: Duration) -> Result<Vec<Update>, DeliveryError> {
        let mut body = json!({
            "timeout": poll.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", &body, Some(poll + Duration::from_secs(10)))
            .await
    }
}

#[async_trait]
impl DeliverySink for TelegramClient {
    async fn send(&self, recipient: SubscriberId, text: &str) -> Result<(), DeliveryError> {
        self.send_message(recipient.0, text, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_updates() {
        let raw = r#"{"ok":true,"result":[
            {"update_id":10,"message":{"message_id":1,"chat":{"id":42,"type":"private"},"date":0,"text":"/start"}},
            {"update_id":11,"callback_query":{"id":"cb1","from":{"id":42},"data":"Bitcoin",
                "message":{"message_id":2,"chat":{"id":42,"type":"private"},"date":0}}}
        ]}"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        assert!(parsed.ok);
        let updates = parsed.result.unwrap();
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/start"));
        let cb = updates[1].callback_query.as_ref().unwrap();
        assert_eq!(cb.data.as_deref(), Some("Bitcoin"));
        assert_eq!(cb.message.as_ref().unwrap().chat.id, 42);
    }

    #[tokio::test]
    async fn stalled_endpoint_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without ever answering.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let client = TelegramClient::new(reqwest::Client::new(), &format!("http://{addr}"), "123:abc")
            .with_request_timeout(Duration::from_millis(200));
        let res = tokio::time::timeout(Duration::from_secs(5), client.send_message(42, "hi", None))
            .await
            .expect("send must be bounded by the request timeout");
        match res {
            Err(DeliveryError::Http(e)) => {
                assert!(e.is_timeout());
                assert!(!e.to_string().contains("123:abc"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decodes_api_errors() {
        let raw = r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#;
        let parsed: ApiResponse<Value> = serde_json::from_str(raw).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.description.as_deref(), Some("Forbidden: bot was blocked by the user"));
    }
}
