//! Alerting System
//!
//! Turns outage transitions into chat notifications:
//! - Message formatting for each kind of transition
//! - Reply threading of resolutions onto the original "power lost" message
//! - Cooldown-based limiting for self-alerts (rejected heartbeats)
//! - Telegram Bot API transport, plus an in-memory transport for dry runs
//!
//! Delivery is best-effort. Failures are logged and reported as `None`,
//! never propagated to the caller.

mod dispatcher;
mod error;
mod limiter;
mod telegram;
mod transport;

pub use dispatcher::NotificationDispatcher;
pub use error::NotificationError;
pub use limiter::{AlertLimiter, AlertState, LimiterConfig};
pub use telegram::{CallbackQuery, Chat, Message, TelegramConfig, TelegramTransport, Update};
pub use transport::{
    CallbackAction, ChatTransport, Keyboard, MemoryTransport, OutboundMessage, SentDocument,
    SentMessage,
};

pub use monitor_state::MessageRef;
pub use reporting::escape_html;
