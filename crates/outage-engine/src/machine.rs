//! Outage State Machine
//!
//! Phases:
//! - `Online`: heartbeats arrive within the silence timeout
//! - `Suspect`: heartbeat overdue, not yet announced
//! - `OfflineConfirmed`: overdue past the confirmation threshold, "power lost" sent
//!
//! A heartbeat after a gap ends the offline period. Gaps that never reached
//! confirmation are recorded as technical glitches. Confirmed gaps end as a
//! real outage, unless the device reports a fault as its restart reason.
//!
//! Event store, notification and snapshot failures are logged and never
//! change the outcome of a transition.

use crate::classifier::{describe_reason, KeywordClassifier, RestartClassifier, RestartKind};
use crate::config::MonitorConfig;
use crate::heartbeat::Heartbeat;
use alerting::NotificationDispatcher;
use chrono::{DateTime, Duration, Utc};
use monitor_state::{MessageRef, MonitorState, Phase, SnapshotStore};
use std::sync::Arc;
use storage::{DeviceIdentityRecord, EventStore, OutageRecord, StorageError, SystemEventRecord};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The single monitor instance shared by heartbeat ingestion and the watchdog.
pub type SharedMonitor = Arc<Mutex<OutageStateMachine>>;

/// A phase change performed by the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Online -> Suspect
    Silenced { outage_started_at: DateTime<Utc> },
    /// Suspect -> OfflineConfirmed
    Confirmed {
        outage_started_at: DateTime<Utc>,
        notification: Option<MessageRef>,
    },
    /// Suspect -> Online. Not an outage.
    Glitch {
        restored_at: DateTime<Utc>,
        duration_minutes: f64,
        raw_reason: String,
    },
    /// OfflineConfirmed -> Online through a device fault. Not an outage.
    FaultRecovered {
        outage_started_at: DateTime<Utc>,
        restored_at: DateTime<Utc>,
        duration_minutes: f64,
        raw_reason: String,
    },
    /// OfflineConfirmed -> Online
    PowerRestored { record: OutageRecord },
}

impl Transition {
    pub fn kind(&self) -> &'static str {
        match self {
            Transition::Silenced { .. } => "silenced",
            Transition::Confirmed { .. } => "confirmed",
            Transition::Glitch { .. } => "glitch",
            Transition::FaultRecovered { .. } => "fault_recovered",
            Transition::PowerRestored { .. } => "power_restored",
        }
    }
}

/// Owns the monitor state and every collaborator a transition touches.
pub struct OutageStateMachine {
    state: MonitorState,
    config: MonitorConfig,
    classifier: Box<dyn RestartClassifier>,
    events: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore>,
    notifier: Arc<NotificationDispatcher>,
}

impl OutageStateMachine {
    /// Load the last snapshot (or the default) and build the machine around it.
    pub fn new(
        config: MonitorConfig,
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        notifier: Arc<NotificationDispatcher>,
        now: DateTime<Utc>,
    ) -> Self {
        let state = snapshots.load(now);
        info!(
            phase = ?state.phase(),
            last_heartbeat = %state.last_heartbeat_at,
            "Monitor state loaded"
        );

        Self {
            classifier: Box::new(KeywordClassifier::new(&config.technical_keywords)),
            state,
            config,
            events,
            snapshots,
            notifier,
        }
    }

    /// Replace the restart reason classifier
    pub fn with_classifier(mut self, classifier: Box<dyn RestartClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn into_shared(self) -> SharedMonitor {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Handle an authenticated heartbeat.
    ///
    /// Returns the recovery transition when the heartbeat ended an offline
    /// period, `None` on the steady-state path.
    pub async fn on_heartbeat(&mut self, heartbeat: &Heartbeat) -> Option<Transition> {
        let now = heartbeat.received_at;
        self.state.last_heartbeat_at = now;

        if let Some(ip) = non_empty(&heartbeat.device_ip) {
            if self.state.last_device_ip.as_deref() != Some(ip) {
                info!("Device address changed to {}", ip);
                self.state.last_device_ip = Some(ip.to_string());
                let record = DeviceIdentityRecord {
                    observed_at: now,
                    address: ip.to_string(),
                };
                if let Err(e) = self.events.append_device_identity(&record).await {
                    storage_failed("device identity", e);
                }
            }
        }

        let transition = if self.state.is_online {
            None
        } else {
            Some(self.recover(heartbeat).await)
        };

        if let Some(boot_id) = non_empty(&heartbeat.boot_id) {
            self.state.last_boot_id = Some(boot_id.to_string());
        }
        self.state.last_restart_reason = Some(heartbeat.raw_reason.clone());

        self.persist();
        if let Some(t) = &transition {
            record_transition(t);
        }
        transition
    }

    /// Periodic check for overdue heartbeats. Can silence and confirm in the
    /// same call when the gap is already long.
    pub async fn on_tick(&mut self, now: DateTime<Utc>) -> Vec<Transition> {
        let mut transitions = Vec::new();

        if self.state.is_online && now - self.state.last_heartbeat_at > self.config.silence_timeout() {
            let started = self.state.last_heartbeat_at;
            warn!("No heartbeat since {}, connection lost", started);

            self.state.is_online = false;
            self.state.outage_started_at = Some(started);
            self.state.outage_notified = false;
            self.state.open_notification_ref = None;
            self.persist();

            transitions.push(Transition::Silenced {
                outage_started_at: started,
            });
        }

        if let (false, false, Some(started)) = (
            self.state.is_online,
            self.state.outage_notified,
            self.state.outage_started_at,
        ) {
            if now - started > self.config.confirmation_threshold() {
                warn!("Outage confirmed, power off since {}", started);
                self.state.outage_notified = true;

                let was_on = started - self.state.online_since;
                let was_on_for = (was_on > self.config.min_reported_on()).then_some(was_on);
                let notification = self.notifier.send_outage_started(started, was_on_for).await;
                self.state.open_notification_ref = notification;
                self.persist();

                transitions.push(Transition::Confirmed {
                    outage_started_at: started,
                    notification,
                });
            }
        }

        for t in &transitions {
            record_transition(t);
        }
        transitions
    }

    async fn recover(&mut self, heartbeat: &Heartbeat) -> Transition {
        let now = heartbeat.received_at;
        let outage_start = self
            .state
            .outage_started_at
            .unwrap_or(now - self.config.unobserved_outage_lead());
        let restored_at = self.restored_at(heartbeat, outage_start);
        let off_for = (restored_at - outage_start).max(Duration::zero());
        let duration_minutes = off_for.num_milliseconds() as f64 / 60_000.0;

        let raw_reason = heartbeat.raw_reason.as_str();
        let human_reason = describe_reason(raw_reason);
        let reply_to = self.state.open_notification_ref;

        let transition = if !self.state.outage_notified {
            info!("Connection back after {:.1} min, below confirmation threshold", duration_minutes);
            self.append_system_event(restored_at, duration_minutes, &human_reason, raw_reason)
                .await;
            self.notifier
                .send_technical_fault_glitch(off_for, &human_reason)
                .await;
            Transition::Glitch {
                restored_at,
                duration_minutes,
                raw_reason: raw_reason.to_string(),
            }
        } else if self.classifier.classify(raw_reason) == RestartKind::Technical {
            info!("Connection back after device fault ({}), not counted as outage", raw_reason);
            self.append_system_event(restored_at, duration_minutes, &human_reason, raw_reason)
                .await;
            self.notifier
                .send_technical_fault_after_outage(off_for, &human_reason, reply_to)
                .await;
            Transition::FaultRecovered {
                outage_started_at: outage_start,
                restored_at,
                duration_minutes,
                raw_reason: raw_reason.to_string(),
            }
        } else {
            info!("Power restored at {} after {:.1} min", restored_at, duration_minutes);
            let record = OutageRecord::new(outage_start, restored_at);
            if let Err(e) = self.events.append_outage(&record).await {
                storage_failed("outage", e);
            }
            self.state.online_since = restored_at;
            self.notifier
                .send_outage_resolved(restored_at, off_for, raw_reason, &human_reason, reply_to)
                .await;
            Transition::PowerRestored { record }
        };

        self.state.is_online = true;
        self.state.outage_started_at = None;
        self.state.outage_notified = false;
        self.state.open_notification_ref = None;
        transition
    }

    /// Recovery instant. After a hard reboot the device was powered before it
    /// could report, so back-date by its uptime (or the floor when the
    /// reported uptime is too small to trust).
    fn restored_at(&self, heartbeat: &Heartbeat, outage_start: DateTime<Utc>) -> DateTime<Utc> {
        let now = heartbeat.received_at;
        let new_session = non_empty(&heartbeat.boot_id)
            .is_some_and(|id| self.state.last_boot_id.as_deref() != Some(id));
        if !(heartbeat.first_boot || new_session) {
            return now;
        }

        let backdate = if heartbeat.uptime_secs > self.config.reboot_uptime_floor_secs {
            Duration::seconds(heartbeat.uptime_secs.min(u32::MAX as u64) as i64)
        } else {
            self.config.reboot_backdate_floor()
        };
        debug!("Hard reboot detected, back-dating recovery by {}s", backdate.num_seconds());

        now.checked_sub_signed(backdate)
            .unwrap_or(outage_start)
            .max(outage_start)
            .min(now)
    }

    async fn append_system_event(
        &self,
        occurred_at: DateTime<Utc>,
        duration_minutes: f64,
        reason: &str,
        raw_reason: &str,
    ) {
        let record = SystemEventRecord {
            occurred_at,
            duration_minutes,
            reason: reason.to_string(),
            raw_reason: raw_reason.to_string(),
        };
        if let Err(e) = self.events.append_system_event(&record).await {
            storage_failed("system event", e);
        }
    }

    fn persist(&self) {
        if let Err(e) = self.snapshots.save(&self.state) {
            metrics::counter!("powerwatch_persistence_failures_total").increment(1);
            warn!("Failed to persist monitor state: {}", e);
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn storage_failed(what: &'static str, err: StorageError) {
    metrics::counter!("powerwatch_storage_failures_total", "record" => what).increment(1);
    warn!("Failed to append {} record: {}", what, err);
}

fn record_transition(transition: &Transition) {
    metrics::counter!("powerwatch_transitions_total", "kind" => transition.kind()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{Keyboard, MemoryTransport};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use monitor_state::MemorySnapshots;
    use proptest::prelude::*;
    use reporting::DisplayZone;
    use storage::MemoryRepository;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap() + Duration::seconds(secs)
    }

    struct Harness {
        repo: Arc<MemoryRepository>,
        snapshots: Arc<MemorySnapshots>,
        transport: Arc<MemoryTransport>,
        machine: OutageStateMachine,
    }

    fn harness_with(events: Option<Arc<dyn EventStore>>) -> Harness {
        let repo = Arc::new(MemoryRepository::new());
        let snapshots = Arc::new(MemorySnapshots::new());
        let transport = Arc::new(MemoryTransport::new());
        let zone = DisplayZone::parse("+00:00").unwrap();
        let notifier = Arc::new(NotificationDispatcher::new(transport.clone(), None, zone));
        let events = events.unwrap_or_else(|| repo.clone() as Arc<dyn EventStore>);
        let machine = OutageStateMachine::new(
            MonitorConfig::default(),
            events,
            snapshots.clone(),
            notifier,
            t(0),
        );
        Harness {
            repo,
            snapshots,
            transport,
            machine,
        }
    }

    fn harness() -> Harness {
        harness_with(None)
    }

    fn beat(secs: i64) -> Heartbeat {
        Heartbeat::new(t(secs)).with_boot_id("boot-a").with_device_ip("10.0.0.5")
    }

    /// Watchdog ticks every 10s over `(from, to]`
    async fn tick_until(machine: &mut OutageStateMachine, from: i64, to: i64) -> Vec<Transition> {
        let mut all = Vec::new();
        let mut now = from + 10;
        while now <= to {
            all.extend(machine.on_tick(t(now)).await);
            now += 10;
        }
        all
    }

    /// Heartbeat at 0, then silence confirmed by ticks up to 400s.
    async fn confirmed_outage(h: &mut Harness) {
        h.machine.on_heartbeat(&beat(0)).await;
        tick_until(&mut h.machine, 0, 400).await;
        assert_eq!(h.machine.phase(), Phase::OfflineConfirmed);
    }

    struct FailingStore;

    #[async_trait]
    impl EventStore for FailingStore {
        async fn append_outage(&self, _record: &OutageRecord) -> Result<(), StorageError> {
            Err(StorageError::DatabaseError("disk full".to_string()))
        }
        async fn append_system_event(&self, _record: &SystemEventRecord) -> Result<(), StorageError> {
            Err(StorageError::DatabaseError("disk full".to_string()))
        }
        async fn append_device_identity(&self, _record: &DeviceIdentityRecord) -> Result<(), StorageError> {
            Err(StorageError::DatabaseError("disk full".to_string()))
        }
        async fn outages_overlapping(
            &self,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<OutageRecord>, StorageError> {
            Ok(Vec::new())
        }
        async fn recent_outages(&self, _limit: usize) -> Result<Vec<OutageRecord>, StorageError> {
            Ok(Vec::new())
        }
        async fn system_events_between(
            &self,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<SystemEventRecord>, StorageError> {
            Ok(Vec::new())
        }
        async fn device_history(&self, _limit: usize) -> Result<Vec<DeviceIdentityRecord>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_steady_heartbeats_stay_online() {
        let mut h = harness();
        for n in 0..60 {
            let now = n * 60;
            assert!(h.machine.on_heartbeat(&beat(now)).await.is_none());
            assert!(tick_until(&mut h.machine, now, now + 50).await.is_empty());
        }

        assert_eq!(h.machine.phase(), Phase::Online);
        assert_eq!(h.repo.outage_count(), 0);
        assert_eq!(h.repo.system_event_count(), 0);
        assert!(h.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_silence_becomes_suspect_after_timeout() {
        let mut h = harness();
        h.machine.on_heartbeat(&beat(0)).await;

        assert!(h.machine.on_tick(t(180)).await.is_empty());
        let transitions = h.machine.on_tick(t(181)).await;

        assert_eq!(transitions, vec![Transition::Silenced { outage_started_at: t(0) }]);
        assert_eq!(h.machine.phase(), Phase::Suspect);
        assert_eq!(h.machine.state().outage_started_at, Some(t(0)));
        assert!(h.transport.sent().is_empty());
        assert_eq!(h.snapshots.latest().unwrap().phase(), Phase::Suspect);
    }

    #[tokio::test]
    async fn test_short_gap_is_a_glitch() {
        let mut h = harness();
        h.machine.on_heartbeat(&beat(0)).await;
        tick_until(&mut h.machine, 0, 240).await;
        assert_eq!(h.machine.phase(), Phase::Suspect);

        let transition = h.machine.on_heartbeat(&beat(250)).await;

        assert!(matches!(transition, Some(Transition::Glitch { restored_at, .. }) if restored_at == t(250)));
        assert_eq!(h.repo.system_event_count(), 1);
        assert_eq!(h.repo.outage_count(), 0);
        assert_eq!(h.machine.state().online_since, t(0));
        assert_eq!(h.machine.phase(), Phase::Online);

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message.keyboard, Some(Keyboard::Menu));
        assert!(h.machine.state().is_consistent());
    }

    #[tokio::test]
    async fn test_confirmed_outage_and_restoration() {
        let mut h = harness();
        confirmed_outage(&mut h).await;

        let lost = h.transport.sent();
        assert_eq!(lost.len(), 1);
        let thread = lost[0].reference;
        assert_eq!(h.machine.state().open_notification_ref, Some(thread));

        let transition = h.machine.on_heartbeat(&beat(1200)).await;

        let record = match transition {
            Some(Transition::PowerRestored { record }) => record,
            other => panic!("unexpected transition: {:?}", other),
        };
        assert_eq!(record.started_at, t(0));
        assert_eq!(record.ended_at, t(1200));
        assert!((record.duration_minutes - 20.0).abs() < 1.0);
        assert_eq!(h.repo.outages(), vec![record]);

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].message.reply_to, Some(thread));

        let state = h.machine.state();
        assert_eq!(state.online_since, t(1200));
        assert!(state.outage_started_at.is_none());
        assert!(state.open_notification_ref.is_none());
        assert!(state.is_consistent());
    }

    #[tokio::test]
    async fn test_confirmation_sends_exactly_one_notification() {
        let mut h = harness();
        confirmed_outage(&mut h).await;
        tick_until(&mut h.machine, 400, 3000).await;

        assert_eq!(h.transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_fault_after_confirmed_outage_is_not_an_outage() {
        let mut h = harness();
        confirmed_outage(&mut h).await;
        let thread = h.machine.state().open_notification_ref;

        let heartbeat = Heartbeat::new(t(1200))
            .with_boot_id("boot-b")
            .first_boot(true)
            .with_uptime(500)
            .with_reason("Brownout (Voltage Dip)");
        let transition = h.machine.on_heartbeat(&heartbeat).await;

        assert!(matches!(
            transition,
            Some(Transition::FaultRecovered { restored_at, .. }) if restored_at == t(700)
        ));
        assert_eq!(h.repo.outage_count(), 0);
        assert_eq!(h.repo.system_events()[0].raw_reason, "Brownout (Voltage Dip)");
        assert_eq!(h.machine.state().online_since, t(0));
        assert_eq!(h.transport.sent()[1].message.reply_to, thread);
    }

    struct NothingIsAFault;

    impl RestartClassifier for NothingIsAFault {
        fn classify(&self, _raw_reason: &str) -> RestartKind {
            RestartKind::Normal
        }
    }

    #[tokio::test]
    async fn test_custom_classifier() {
        let mut h = harness();
        h.machine = h.machine.with_classifier(Box::new(NothingIsAFault));
        confirmed_outage(&mut h).await;

        h.machine
            .on_heartbeat(&beat(1200).with_reason("Watchdog (Task)"))
            .await;

        assert_eq!(h.repo.outage_count(), 1);
        assert!(h.transport.sent()[1].message.text.contains("Info: ⚠️ System fault (Task WDT)"));
    }

    #[tokio::test]
    async fn test_hard_reboot_with_short_uptime_uses_floor() {
        let mut h = harness();
        confirmed_outage(&mut h).await;

        let heartbeat = Heartbeat::new(t(3000)).with_boot_id("boot-b").first_boot(true).with_uptime(45);
        h.machine.on_heartbeat(&heartbeat).await;

        assert_eq!(h.repo.outages()[0].ended_at, t(2880));
    }

    #[tokio::test]
    async fn test_hard_reboot_uses_reported_uptime() {
        let mut h = harness();
        confirmed_outage(&mut h).await;

        // New session id alone marks a reboot
        let heartbeat = Heartbeat::new(t(3000)).with_boot_id("boot-b").with_uptime(500);
        h.machine.on_heartbeat(&heartbeat).await;

        assert_eq!(h.repo.outages()[0].ended_at, t(2500));
        assert_eq!(h.machine.state().last_boot_id.as_deref(), Some("boot-b"));
    }

    #[tokio::test]
    async fn test_back_dating_never_precedes_outage_start() {
        let mut h = harness();
        confirmed_outage(&mut h).await;

        let heartbeat = Heartbeat::new(t(600)).first_boot(true).with_uptime(5000);
        h.machine.on_heartbeat(&heartbeat).await;

        let record = &h.repo.outages()[0];
        assert_eq!(record.ended_at, t(0));
        assert_eq!(record.duration_minutes, 0.0);
    }

    #[tokio::test]
    async fn test_replayed_heartbeat_changes_nothing() {
        let mut h = harness();
        h.machine.on_heartbeat(&beat(30)).await;
        let before = h.machine.state().clone();
        let identities = h.repo.device_history_count();

        assert!(h.machine.on_heartbeat(&beat(30)).await.is_none());

        assert_eq!(h.machine.state(), &before);
        assert_eq!(h.repo.device_history_count(), identities);
        assert_eq!(h.repo.outage_count() + h.repo.system_event_count(), 0);
    }

    #[tokio::test]
    async fn test_device_address_history() {
        let mut h = harness();
        h.machine.on_heartbeat(&beat(0)).await;
        h.machine.on_heartbeat(&beat(60)).await;
        h.machine
            .on_heartbeat(&Heartbeat::new(t(120)).with_device_ip("10.0.0.6"))
            .await;
        h.machine.on_heartbeat(&Heartbeat::new(t(180))).await;

        assert_eq!(h.repo.device_history_count(), 2);
        assert_eq!(h.machine.state().last_device_ip.as_deref(), Some("10.0.0.6"));
    }

    #[tokio::test]
    async fn test_long_downtime_silences_and_confirms_in_one_tick() {
        let mut h = harness();
        h.machine.on_heartbeat(&beat(0)).await;

        let transitions = h.machine.on_tick(t(1000)).await;

        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].kind(), "silenced");
        assert_eq!(transitions[1].kind(), "confirmed");
    }

    #[tokio::test]
    async fn test_was_on_duration_reported_only_after_long_uptime() {
        let mut h = harness();
        confirmed_outage(&mut h).await;
        assert!(!h.transport.sent()[0].message.text.contains("Power was on"));

        // Restored at 1200, then on for 20 minutes
        h.machine.on_heartbeat(&beat(1200)).await;
        h.machine.on_heartbeat(&beat(2400)).await;
        tick_until(&mut h.machine, 2400, 3000).await;

        let sent = h.transport.sent();
        assert!(sent[2].message.text.contains("Power was on for: 20m"));
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_block_transition() {
        let mut h = harness_with(Some(Arc::new(FailingStore)));
        confirmed_outage(&mut h).await;

        let transition = h.machine.on_heartbeat(&beat(1200)).await;

        assert_eq!(transition.map(|t| t.kind()), Some("power_restored"));
        assert_eq!(h.machine.phase(), Phase::Online);
        assert_eq!(h.snapshots.latest().unwrap().phase(), Phase::Online);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_block_transition() {
        let mut h = harness();
        h.transport.set_failing(true);
        confirmed_outage(&mut h).await;

        assert!(h.machine.state().outage_notified);
        assert!(h.machine.state().open_notification_ref.is_none());

        h.machine.on_heartbeat(&beat(1200)).await;
        assert_eq!(h.repo.outage_count(), 1);
        assert_eq!(h.machine.phase(), Phase::Online);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_in_memory_state() {
        let mut h = harness();
        h.machine.on_heartbeat(&beat(0)).await;
        let saves = h.snapshots.save_count();
        h.snapshots.set_failing(true);

        tick_until(&mut h.machine, 0, 400).await;

        assert_eq!(h.machine.phase(), Phase::OfflineConfirmed);
        assert_eq!(h.snapshots.save_count(), saves);

        h.snapshots.set_failing(false);
        h.machine.on_heartbeat(&beat(1200)).await;
        assert_eq!(h.snapshots.latest().unwrap().phase(), Phase::Online);
    }

    #[tokio::test]
    async fn test_restart_resumes_from_snapshot() {
        let mut h = harness();
        confirmed_outage(&mut h).await;

        let zone = DisplayZone::parse("+00:00").unwrap();
        let notifier = Arc::new(NotificationDispatcher::new(h.transport.clone(), None, zone));
        let restarted = OutageStateMachine::new(
            MonitorConfig::default(),
            h.repo.clone(),
            h.snapshots.clone(),
            notifier,
            t(500),
        );

        assert_eq!(restarted.phase(), Phase::OfflineConfirmed);
        assert_eq!(restarted.state().open_notification_ref, h.machine.state().open_notification_ref);
    }

    #[tokio::test]
    async fn test_worked_example() {
        let mut h = harness();
        h.machine.on_heartbeat(&beat(0)).await;
        tick_until(&mut h.machine, 0, 50).await;
        h.machine.on_heartbeat(&beat(60)).await;
        assert_eq!(h.repo.outage_count(), 0);

        tick_until(&mut h.machine, 60, 8990).await;
        h.machine.on_heartbeat(&beat(9000)).await;

        let outages = h.repo.outages();
        assert_eq!(outages.len(), 1);
        // Outage starts at the last heartbeat before the silence
        assert_eq!(outages[0].started_at, t(60));
        assert_eq!(outages[0].ended_at, t(9000));
        assert!((outages[0].duration_minutes - 149.0).abs() < 1.0);

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].message.text.contains("Power restored"));
    }

    #[derive(Debug, Clone)]
    enum Step {
        Beat { gap: i64, first: bool, uptime: u64, reason: usize },
        Tick { gap: i64 },
    }

    const REASONS: [&str; 4] = ["N/A", "Power On", "Software Reset", "Watchdog (Task)"];

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (1i64..1200, any::<bool>(), 0u64..2000, 0usize..REASONS.len()).prop_map(
                |(gap, first, uptime, reason)| Step::Beat { gap, first, uptime, reason }
            ),
            (1i64..1200).prop_map(|gap| Step::Tick { gap }),
        ]
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #[test]
        fn test_heartbeats_below_timeout_never_leave_online(gaps in prop::collection::vec(1i64..=180, 1..40)) {
            let (phase, records) = block_on(async {
                let mut h = harness();
                let mut now = 0;
                for gap in gaps {
                    now += gap;
                    h.machine.on_tick(t(now)).await;
                    h.machine.on_heartbeat(&beat(now)).await;
                }
                (h.machine.phase(), h.repo.outage_count() + h.repo.system_event_count())
            });
            prop_assert_eq!(phase, Phase::Online);
            prop_assert_eq!(records, 0);
        }

        #[test]
        fn test_invariants_hold_for_any_interleaving(steps in prop::collection::vec(step(), 1..60)) {
            let violations = block_on(async {
                let mut h = harness();
                let mut now = 0;
                let mut violations = Vec::new();
                for (i, step) in steps.into_iter().enumerate() {
                    match step {
                        Step::Beat { gap, first, uptime, reason } => {
                            now += gap;
                            let heartbeat = Heartbeat::new(t(now))
                                .with_boot_id(if first { format!("boot-{}", i) } else { "boot-a".to_string() })
                                .first_boot(first)
                                .with_uptime(uptime)
                                .with_reason(REASONS[reason]);
                            h.machine.on_heartbeat(&heartbeat).await;
                        }
                        Step::Tick { gap } => {
                            now += gap;
                            h.machine.on_tick(t(now)).await;
                        }
                    }
                    if !h.machine.state().is_consistent() {
                        violations.push((i, h.machine.state().clone()));
                    }
                }
                for record in h.repo.outages() {
                    if record.ended_at < record.started_at {
                        violations.push((usize::MAX, h.machine.state().clone()));
                    }
                }
                violations
            });
            prop_assert!(violations.is_empty(), "{:?}", violations);
        }
    }
}
