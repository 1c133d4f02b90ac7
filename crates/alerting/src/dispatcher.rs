//! Notification Dispatcher
//!
//! Formats one message per outage transition and hands it to the chat
//! transport. Every send returns the delivered message reference, or `None`
//! when delivery failed; failures are logged and counted, never returned.

use crate::limiter::{AlertLimiter, LimiterConfig};
use crate::transport::{ChatTransport, Keyboard, OutboundMessage};
use crate::escape_html;
use chrono::{DateTime, Duration, Utc};
use monitor_state::MessageRef;
use reporting::{format_duration, DisplayZone};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

const AUTH_ALERT: &str = "auth";

/// Turns state machine transitions into chat messages
pub struct NotificationDispatcher {
    transport: Arc<dyn ChatTransport>,
    location: Option<String>,
    zone: DisplayZone,
    limiter: Mutex<AlertLimiter>,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn ChatTransport>, location: Option<String>, zone: DisplayZone) -> Self {
        Self {
            transport,
            location: location.filter(|l| !l.trim().is_empty()),
            zone,
            limiter: Mutex::new(AlertLimiter::new(LimiterConfig {
                cooldown_seconds: 300,
                max_alerts_per_hour: 12,
            })),
        }
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    pub fn zone(&self) -> DisplayZone {
        self.zone
    }

    /// Location line prefixed to every message, empty when unnamed
    pub fn header(&self) -> String {
        match &self.location {
            Some(name) => format!("🏠 {}\n", escape_html(name)),
            None => String::new(),
        }
    }

    /// "Power lost". `was_on_for` is shown when given.
    pub async fn send_outage_started(
        &self,
        started_at: DateTime<Utc>,
        was_on_for: Option<Duration>,
    ) -> Option<MessageRef> {
        let mut text = format!(
            "{}🔴 <b>Power went off</b>\n⏰ Went off at about {}",
            self.header(),
            self.zone.clock_and_date(started_at)
        );
        if let Some(on) = was_on_for {
            text.push_str(&format!("\n🔋 Power was on for: {}", format_duration(on)));
        }

        let message = OutboundMessage::new(text).with_keyboard(Keyboard::Notification);
        self.deliver("outage_started", &message).await
    }

    /// "Power restored", threaded under the matching "power lost" message.
    pub async fn send_outage_resolved(
        &self,
        restored_at: DateTime<Utc>,
        off_for: Duration,
        raw_reason: &str,
        human_reason: &str,
        reply_to: Option<MessageRef>,
    ) -> Option<MessageRef> {
        let mut text = format!(
            "{}🟢 <b>Power restored</b>\n⏰ Came back at about {}\n🪫 Power was off for: {}",
            self.header(),
            self.zone.clock_and_date(restored_at),
            format_duration(off_for)
        );
        if raw_reason != "N/A" {
            text.push_str(&format!("\nℹ️ Info: {}", escape_html(human_reason)));
        }

        let message = OutboundMessage::new(text)
            .reply_to(reply_to)
            .with_keyboard(Keyboard::Notification);
        self.deliver("outage_resolved", &message).await
    }

    /// Short gap that never became a confirmed outage.
    pub async fn send_technical_fault_glitch(&self, off_for: Duration, human_reason: &str) -> Option<MessageRef> {
        let text = format!(
            "{}⚠️ <b>Technical fault detected</b>\n⏱ Connection lost for: {}\nℹ️ Reason: {}\n✅ The power timer keeps running (statistics unaffected).",
            self.header(),
            format_duration(off_for),
            escape_html(human_reason)
        );

        let message = OutboundMessage::new(text).with_keyboard(Keyboard::Menu);
        self.deliver("technical_glitch", &message).await
    }

    /// Confirmed outage that ended with a device fault rather than a power return.
    pub async fn send_technical_fault_after_outage(
        &self,
        off_for: Duration,
        human_reason: &str,
        reply_to: Option<MessageRef>,
    ) -> Option<MessageRef> {
        let text = format!(
            "{}⚠️ <b>Connection restored (after a fault)</b>\n⏱ No connection for: {}\nℹ️ Reason: {}\n✅ Not counted as an outage.",
            self.header(),
            format_duration(off_for),
            escape_html(human_reason)
        );

        let message = OutboundMessage::new(text)
            .reply_to(reply_to)
            .with_keyboard(Keyboard::Notification);
        self.deliver("technical_after_outage", &message).await
    }

    /// Rejected heartbeat. At most one alert per cooldown window.
    pub async fn send_auth_alert(&self, ip: &str) -> Option<MessageRef> {
        self.send_auth_alert_at(ip, Instant::now()).await
    }

    pub async fn send_auth_alert_at(&self, ip: &str, now: Instant) -> Option<MessageRef> {
        let allowed = match self.limiter.lock() {
            Ok(mut limiter) => limiter.try_fire(AUTH_ALERT, now),
            Err(e) => {
                warn!("Alert limiter unavailable: {}", e);
                false
            }
        };
        if !allowed {
            debug!("Auth alert for {} suppressed", ip);
            return None;
        }

        let text = format!("⚠️ <b>AUTH ERROR</b>\nIP: <code>{}</code>", escape_html(ip));
        self.deliver("auth_error", &OutboundMessage::new(text)).await
    }

    async fn deliver(&self, kind: &'static str, message: &OutboundMessage) -> Option<MessageRef> {
        match self.transport.send(message).await {
            Ok(reference) => {
                metrics::counter!("powerwatch_notifications_sent_total", "kind" => kind).increment(1);
                info!(kind, message_id = reference.get(), "Notification sent");
                Some(reference)
            }
            Err(e) => {
                metrics::counter!("powerwatch_notifications_failed_total", "kind" => kind).increment(1);
                warn!(kind, "Notification delivery failed: {}", e);
                None
            }
        }
    }
}
