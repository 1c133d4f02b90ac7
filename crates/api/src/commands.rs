//! Chat commands
//!
//! Long-polls Telegram for commands and inline button presses and answers
//! them from the current monitor state.

use alerting::{
    escape_html, CallbackAction, CallbackQuery, ChatTransport, Keyboard, Message, OutboundMessage,
    TelegramTransport, Update,
};
use monitor_state::MessageRef;
use outage_engine::describe_reason;
use reporting::{render_history_text, StatusSummary};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::AppState;

const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);
const PANEL_TITLE: &str = "Control panel";
const ADDRESS_HISTORY_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    History,
    DeviceInfo,
    Menu,
}

impl Command {
    /// Parse `/name`, `/name@BotName` and trailing arguments
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "status" | "start" => Some(Command::Status),
            "history" | "last" => Some(Command::History),
            "debug" | "info" => Some(Command::DeviceInfo),
            "menu" => Some(Command::Menu),
            _ => None,
        }
    }
}

/// Answers commands and button presses
pub struct CommandHandler {
    state: Arc<AppState>,
}

impl CommandHandler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    fn transport(&self) -> &Arc<dyn ChatTransport> {
        self.state.notifier.transport()
    }

    pub async fn handle_update(&self, update: &Update) {
        if let Some(callback) = &update.callback_query {
            self.handle_callback(callback).await;
        } else if let Some(message) = update.message.as_ref().or(update.channel_post.as_ref()) {
            self.handle_message(message).await;
        }
    }

    async fn handle_message(&self, message: &Message) {
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return;
        };
        debug!("Command {:?} from chat {}", command, message.chat.id);
        metrics::counter!("powerwatch_chat_commands_total").increment(1);

        let reply = match command {
            Command::Status => OutboundMessage::new(format!(
                "{}{}",
                self.state.notifier.header(),
                self.status_text().await
            )),
            Command::History => OutboundMessage::new(self.history_text().await),
            Command::DeviceInfo => OutboundMessage::new(self.device_info_text().await),
            Command::Menu => OutboundMessage::new(self.panel_text().await).with_keyboard(Keyboard::Menu),
        };
        self.reply(reply.to_chat(message.chat.id)).await;
    }

    async fn handle_callback(&self, callback: &CallbackQuery) {
        let Some(action) = callback.data.as_deref().and_then(CallbackAction::parse) else {
            self.answer(callback, "Unknown action").await;
            return;
        };
        let chat = callback.message.as_ref().map(|m| m.chat.id);

        match action {
            CallbackAction::Status => {
                let on_panel = callback
                    .message
                    .as_ref()
                    .and_then(|m| m.text.as_deref())
                    .is_some_and(|text| text.contains(PANEL_TITLE));
                match (&callback.message, on_panel) {
                    (Some(message), true) => {
                        let panel = OutboundMessage::new(self.panel_text().await)
                            .to_chat(message.chat.id)
                            .with_keyboard(Keyboard::Menu);
                        if let Err(e) = self
                            .transport()
                            .edit(MessageRef::new(message.message_id), &panel)
                            .await
                        {
                            warn!("Failed to refresh panel: {}", e);
                        }
                        self.answer(callback, "✅ Data refreshed").await;
                    }
                    // Under a notification, show the status as a toast
                    _ => {
                        let status = self.status_text().await;
                        self.answer(callback, &status).await;
                    }
                }
            }
            CallbackAction::History => {
                self.answer(callback, "📜 Looking up records...").await;
                let mut reply = OutboundMessage::new(self.history_text().await);
                if let Some(chat) = chat {
                    reply = reply.to_chat(chat);
                }
                self.reply(reply).await;
            }
            CallbackAction::Stats => {
                self.answer(callback, "📊 Generating report...").await;
                self.send_daily_report(chat).await;
            }
        }
    }

    async fn status_text(&self) -> String {
        let (monitor, now) = self.state.current_state().await;
        StatusSummary::from_state(&monitor, now).render(self.state.site.zone)
    }

    async fn panel_text(&self) -> String {
        format!(
            "{}🎛 <b>{}</b>\n\n{}\n\n👇 Choose an action:",
            self.state.notifier.header(),
            PANEL_TITLE,
            self.status_text().await
        )
    }

    async fn history_text(&self) -> String {
        match self.state.history().await {
            Ok(entries) => format!(
                "{}📜 <b>Last 10 outages:</b>\n<pre>{}</pre>",
                self.state.notifier.header(),
                escape_html(&render_history_text(&entries, self.state.site.zone))
            ),
            Err(e) => {
                warn!("History lookup failed: {}", e);
                format!("❌ Error: {}", escape_html(&e.to_string()))
            }
        }
    }

    async fn device_info_text(&self) -> String {
        let (monitor, now) = self.state.current_state().await;
        let reason = monitor
            .last_restart_reason
            .as_deref()
            .map(describe_reason)
            .unwrap_or_else(|| "Unknown".to_string());
        let mut text = format!(
            "{}🛠 <b>Device info:</b>\n🌐 IP: <code>{}</code>\n🆔 Boot ID: <code>{}</code>\nℹ️ Last reboot: {}",
            self.state.notifier.header(),
            escape_html(monitor.last_device_ip.as_deref().unwrap_or("Unknown")),
            escape_html(monitor.last_boot_id.as_deref().unwrap_or("Unknown")),
            escape_html(&reason)
        );

        let zone = self.state.site.zone;
        let day_start = zone.start_of_day(zone.date_of(now));
        match self.state.events.system_events_between(day_start, now).await {
            Ok(faults) => text.push_str(&format!("\n⚠️ Faults today: {}", faults.len())),
            Err(e) => warn!("System event lookup failed: {}", e),
        }
        match self.state.events.device_history(ADDRESS_HISTORY_LIMIT).await {
            Ok(addresses) if !addresses.is_empty() => {
                text.push_str("\n📡 Recent addresses:");
                for entry in addresses {
                    text.push_str(&format!(
                        "\n• <code>{}</code> since {}",
                        escape_html(&entry.address),
                        zone.clock_and_date(entry.observed_at)
                    ));
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Address history lookup failed: {}", e),
        }
        text
    }

    async fn send_daily_report(&self, chat: Option<i64>) {
        let report = match self.state.daily_report().await {
            Ok(report) => report,
            Err(e) => {
                warn!("Daily report failed: {}", e);
                self.reply(OutboundMessage::new(format!("❌ Report error: {}", escape_html(&e.to_string()))))
                    .await;
                return;
            }
        };
        let html = report.render_html(self.state.site.location_name.as_deref());
        if let Err(e) = self
            .transport()
            .send_document(chat, &report.file_name(), html.into_bytes(), "📊 <b>Today's report</b>")
            .await
        {
            warn!("Failed to send report: {}", e);
        }
    }

    async fn reply(&self, message: OutboundMessage) {
        if let Err(e) = self.transport().send(&message).await {
            warn!("Failed to answer command: {}", e);
        }
    }

    async fn answer(&self, callback: &CallbackQuery, text: &str) {
        if let Err(e) = self.transport().answer_callback(&callback.id, text).await {
            debug!("Failed to answer callback {}: {}", callback.id, e);
        }
    }
}

/// Poll for updates forever, backing off after errors.
pub async fn run_listener(bot: Arc<TelegramTransport>, handler: CommandHandler) {
    info!("Chat command listener started");
    let mut offset = 0;
    loop {
        match bot.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => {
                for update in &updates {
                    offset = offset.max(update.update_id + 1);
                    handler.handle_update(update).await;
                }
            }
            Err(e) => {
                warn!("Polling for chat updates failed: {}", e);
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}
