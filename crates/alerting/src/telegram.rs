//! Telegram Bot API transport

use crate::transport::{ChatTransport, Keyboard, OutboundMessage};
use crate::NotificationError;
use async_trait::async_trait;
use monitor_state::MessageRef;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Bot credentials and target chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    /// Chat that receives outage notifications
    pub chat_id: i64,
    /// Bot API endpoint
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Bound on every call except long polling. Sends run under the
    /// monitor lock.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Slack on top of the server-side long-poll timeout
const POLL_GRACE: Duration = Duration::from_secs(10);

impl TelegramConfig {
    pub fn new(token: impl Into<String>, chat_id: i64) -> Self {
        Self {
            token: token.into(),
            chat_id,
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Incoming update from `getUpdates`
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub channel_post: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentRef {
    message_id: i64,
}

/// Telegram Bot API client
pub struct TelegramTransport {
    config: TelegramConfig,
    client: Client,
}

impl TelegramTransport {
    pub fn new(config: TelegramConfig) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;
        info!("Telegram transport ready for chat {}", config.chat_id);
        Ok(Self { config, client })
    }

    pub fn chat_id(&self) -> i64 {
        self.config.chat_id
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.token,
            method
        )
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs.max(1))
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, NotificationError> {
        self.call_within(method, body, self.request_timeout()).await
    }

    async fn call_within<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<T, NotificationError> {
        debug!("Telegram call {}", method);
        let response: ApiResponse<T> = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        unwrap_response(method, response)
    }

    fn message_body(&self, message: &OutboundMessage) -> Value {
        let mut body = json!({
            "chat_id": message.chat.unwrap_or(self.config.chat_id),
            "text": message.text,
            "parse_mode": "HTML",
        });
        if let Some(reply_to) = message.reply_to {
            body["reply_to_message_id"] = json!(reply_to.get());
            body["allow_sending_without_reply"] = json!(true);
        }
        if let Some(keyboard) = message.keyboard {
            body["reply_markup"] = keyboard_markup(keyboard);
        }
        body
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, NotificationError> {
        self.call_within(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "channel_post", "callback_query"],
            }),
            Duration::from_secs(timeout_secs) + POLL_GRACE,
        )
        .await
    }
}

fn unwrap_response<T>(method: &str, response: ApiResponse<T>) -> Result<T, NotificationError> {
    if !response.ok {
        return Err(NotificationError::Api(format!(
            "{}: {}",
            method,
            response.description.unwrap_or_else(|| "unknown error".to_string())
        )));
    }
    response
        .result
        .ok_or_else(|| NotificationError::InvalidResponse(format!("{}: missing result", method)))
}

fn keyboard_markup(keyboard: Keyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .rows()
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(label, action)| json!({ "text": label, "callback_data": action.as_str() }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<MessageRef, NotificationError> {
        let sent: SentRef = self.call("sendMessage", self.message_body(message)).await?;
        Ok(MessageRef::new(sent.message_id))
    }

    async fn edit(&self, target: MessageRef, message: &OutboundMessage) -> Result<(), NotificationError> {
        let mut body = self.message_body(message);
        body["message_id"] = json!(target.get());
        match self.call::<Value>("editMessageText", body).await {
            Ok(_) => Ok(()),
            // Editing with identical content is rejected; nothing to change
            Err(NotificationError::Api(desc)) if desc.contains("message is not modified") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn send_document(
        &self,
        chat: Option<i64>,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<MessageRef, NotificationError> {
        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/html")?;
        let form = Form::new()
            .text("chat_id", chat.unwrap_or(self.config.chat_id).to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", "HTML")
            .part("document", part);

        let response: ApiResponse<SentRef> = self
            .client
            .post(self.method_url("sendDocument"))
            .timeout(self.request_timeout())
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        let sent = unwrap_response("sendDocument", response)?;
        Ok(MessageRef::new(sent.message_id))
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), NotificationError> {
        self.call::<Value>(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_id, "text": text }),
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_markup_shape() {
        let markup = keyboard_markup(Keyboard::Menu);
        let rows = markup["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["callback_data"], "stats");
        assert_eq!(rows[1][0]["callback_data"], "status");
    }

    #[test]
    fn test_message_body_threads_reply() {
        let transport = TelegramTransport::new(TelegramConfig::new("t", -100)).unwrap();
        let message = OutboundMessage::new("hi").reply_to(Some(MessageRef::new(42)));

        let body = transport.message_body(&message);
        assert_eq!(body["chat_id"], -100);
        assert_eq!(body["reply_to_message_id"], 42);
        assert_eq!(body["parse_mode"], "HTML");
        assert!(body.get("reply_markup").is_none());
    }

    #[test]
    fn test_api_error_response() {
        let response: ApiResponse<SentRef> =
            serde_json::from_str(r#"{"ok":false,"description":"Bad Request: chat not found"}"#).unwrap();
        let err = unwrap_response("sendMessage", response).unwrap_err();
        assert!(matches!(err, NotificationError::Api(ref d) if d.contains("chat not found")));
    }

    #[test]
    fn test_update_parsing() {
        let raw = r#"[
            {"update_id": 7, "message": {"message_id": 1, "chat": {"id": 5}, "text": "/status"}},
            {"update_id": 8, "callback_query": {"id": "cb", "data": "history",
                "message": {"message_id": 2, "chat": {"id": 5}}}}
        ]"#;
        let updates: Vec<Update> = serde_json::from_str(raw).unwrap();

        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/status"));
        let callback = updates[1].callback_query.as_ref().unwrap();
        assert_eq!(callback.data.as_deref(), Some("history"));
        assert_eq!(callback.message.as_ref().unwrap().message_id, 2);
    }

    const TOKEN: &str = "123456:SECRET-BOT-TOKEN";

    fn transport_at(api_base: String, timeout_secs: u64) -> TelegramTransport {
        let mut config = TelegramConfig::new(TOKEN, 1);
        config.api_base = api_base;
        config.request_timeout_secs = timeout_secs;
        TelegramTransport::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_token() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let transport = transport_at(format!("http://{}", addr), 5);

        let err = transport.send(&OutboundMessage::new("hi")).await.unwrap_err();

        assert!(matches!(err, NotificationError::Transport(_)));
        assert!(!err.to_string().contains("SECRET-BOT-TOKEN"), "{}", err);
    }

    #[tokio::test]
    async fn test_stalled_send_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and never answer
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let transport = transport_at(format!("http://{}", addr), 1);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            transport.send(&OutboundMessage::new("hi")),
        )
        .await
        .expect("send should give up on its own");

        let err = result.unwrap_err();
        assert!(!err.to_string().contains("SECRET-BOT-TOKEN"), "{}", err);
        server.abort();
    }

    #[test]
    fn test_request_timeout_defaults() {
        let config: TelegramConfig = serde_json::from_str(r#"{"token":"t","chat_id":1}"#).unwrap();
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.api_base, "https://api.telegram.org");
    }

    #[test]
    fn test_method_url() {
        let mut config = TelegramConfig::new("abc", 1);
        config.api_base = "http://localhost:8081/".to_string();
        let transport = TelegramTransport::new(config).unwrap();
        assert_eq!(transport.method_url("getMe"), "http://localhost:8081/botabc/getMe");
    }
}
