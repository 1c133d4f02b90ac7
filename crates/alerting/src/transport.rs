//! Chat transport abstraction

use crate::NotificationError;
use async_trait::async_trait;
use monitor_state::MessageRef;
use std::sync::Mutex;
use tracing::info;

/// Inline button actions understood by the command listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Stats,
    History,
    Status,
}

impl CallbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackAction::Stats => "stats",
            CallbackAction::History => "history",
            CallbackAction::Status => "status",
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "stats" => Some(CallbackAction::Stats),
            "history" => Some(CallbackAction::History),
            "status" => Some(CallbackAction::Status),
            _ => None,
        }
    }
}

/// Inline keyboard attached to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Under outage notifications
    Notification,
    /// Under the pinned control panel
    Menu,
}

impl Keyboard {
    /// Button rows as `(label, action)` pairs
    pub fn rows(&self) -> Vec<Vec<(&'static str, CallbackAction)>> {
        match self {
            Keyboard::Notification => vec![
                vec![("📊 Report", CallbackAction::Stats), ("📜 History", CallbackAction::History)],
                vec![("🔄 Refresh status", CallbackAction::Status)],
            ],
            Keyboard::Menu => vec![
                vec![
                    ("📊 Today's report", CallbackAction::Stats),
                    ("📜 History (10)", CallbackAction::History),
                ],
                vec![("🔄 Status now", CallbackAction::Status)],
            ],
        }
    }
}

/// A message to deliver. Text uses the HTML subset understood by the chat.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Target chat; `None` means the configured notification chat
    pub chat: Option<i64>,
    pub text: String,
    pub reply_to: Option<MessageRef>,
    pub keyboard: Option<Keyboard>,
}

impl OutboundMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            chat: None,
            text: text.into(),
            reply_to: None,
            keyboard: None,
        }
    }

    pub fn to_chat(mut self, chat: i64) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn reply_to(mut self, reply_to: Option<MessageRef>) -> Self {
        self.reply_to = reply_to;
        self
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Send/edit/reply primitives of a chat channel
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<MessageRef, NotificationError>;

    /// Replace the text and keyboard of an earlier message
    async fn edit(&self, target: MessageRef, message: &OutboundMessage) -> Result<(), NotificationError>;

    async fn send_document(
        &self,
        chat: Option<i64>,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<MessageRef, NotificationError>;

    /// Acknowledge a button press with a short toast
    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), NotificationError>;
}

/// A message captured by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub reference: MessageRef,
    pub message: OutboundMessage,
}

/// A document captured by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentDocument {
    pub chat: Option<i64>,
    pub file_name: String,
    pub contents: Vec<u8>,
    pub caption: String,
}

#[derive(Debug, Default)]
struct MemoryLog {
    next_id: i64,
    sent: Vec<SentMessage>,
    edits: Vec<(MessageRef, OutboundMessage)>,
    documents: Vec<SentDocument>,
    answers: Vec<(String, String)>,
    failing: bool,
}

/// Transport that keeps messages in memory and logs them. Used when no chat
/// channel is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    log: Mutex<MemoryLog>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut log) = self.log.lock() {
            log.failing = failing;
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.log.lock().map(|l| l.sent.clone()).unwrap_or_default()
    }

    pub fn edits(&self) -> Vec<(MessageRef, OutboundMessage)> {
        self.log.lock().map(|l| l.edits.clone()).unwrap_or_default()
    }

    pub fn documents(&self) -> Vec<SentDocument> {
        self.log.lock().map(|l| l.documents.clone()).unwrap_or_default()
    }

    pub fn answers(&self) -> Vec<(String, String)> {
        self.log.lock().map(|l| l.answers.clone()).unwrap_or_default()
    }

    fn with_log<T>(
        &self,
        f: impl FnOnce(&mut MemoryLog) -> T,
    ) -> Result<T, NotificationError> {
        let mut log = self
            .log
            .lock()
            .map_err(|e| NotificationError::Transport(format!("Lock error: {}", e)))?;
        if log.failing {
            return Err(NotificationError::Transport("delivery disabled".to_string()));
        }
        Ok(f(&mut log))
    }
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<MessageRef, NotificationError> {
        let reference = self.with_log(|log| {
            log.next_id += 1;
            let reference = MessageRef::new(log.next_id);
            log.sent.push(SentMessage {
                reference,
                message: message.clone(),
            });
            reference
        })?;
        info!("[chat #{}] {}", reference.get(), message.text);
        Ok(reference)
    }

    async fn edit(&self, target: MessageRef, message: &OutboundMessage) -> Result<(), NotificationError> {
        self.with_log(|log| log.edits.push((target, message.clone())))?;
        info!("[chat edit #{}] {}", target.get(), message.text);
        Ok(())
    }

    async fn send_document(
        &self,
        chat: Option<i64>,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<MessageRef, NotificationError> {
        let reference = self.with_log(|log| {
            log.next_id += 1;
            log.documents.push(SentDocument {
                chat,
                file_name: file_name.to_string(),
                contents,
                caption: caption.to_string(),
            });
            MessageRef::new(log.next_id)
        })?;
        info!("[chat document #{}] {}", reference.get(), file_name);
        Ok(reference)
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), NotificationError> {
        self.with_log(|log| log.answers.push((callback_id.to_string(), text.to_string())))
    }
}
