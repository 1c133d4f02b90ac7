//! Watchdog loop

use outage_engine::{Clock, SharedMonitor, Transition};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Configuration for the watchdog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Seconds between checks (default: 10)
    pub interval_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

impl WatchdogConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Periodic driver of `OutageStateMachine::on_tick`
pub struct Watchdog {
    monitor: SharedMonitor,
    clock: Arc<dyn Clock>,
    config: WatchdogConfig,
    running: AtomicBool,
}

impl Watchdog {
    pub fn new(monitor: SharedMonitor, clock: Arc<dyn Clock>, config: WatchdogConfig) -> Self {
        info!("Watchdog created with interval {}s", config.interval().as_secs());
        Self {
            monitor,
            clock,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// One check. Takes the monitor lock, so it is serialized with heartbeats.
    pub async fn tick(&self) -> Vec<Transition> {
        let mut monitor = self.monitor.lock().await;
        let now = self.clock.now();
        let transitions = monitor.on_tick(now).await;
        for transition in &transitions {
            debug!("Watchdog transition: {}", transition.kind());
        }
        transitions
    }

    /// Run until [`stop`](Self::stop) is called
    pub async fn run(&self) {
        info!("Starting watchdog");
        self.running.store(true, Ordering::SeqCst);

        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately
        interval.tick().await;

        while self.running.load(Ordering::SeqCst) {
            interval.tick().await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.tick().await;
        }

        info!("Watchdog stopped");
    }

    /// Run on a background task
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        tokio::spawn(async move { self.run().await })
    }

    pub fn stop(&self) {
        info!("Stopping watchdog");
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{MemoryTransport, NotificationDispatcher};
    use chrono::{DateTime, TimeZone, Utc};
    use monitor_state::{MemorySnapshots, Phase};
    use outage_engine::{Heartbeat, ManualClock, MonitorConfig, OutageStateMachine};
    use reporting::DisplayZone;
    use storage::MemoryRepository;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn monitor() -> SharedMonitor {
        let transport = Arc::new(MemoryTransport::new());
        let notifier = Arc::new(NotificationDispatcher::new(
            transport,
            None,
            DisplayZone::parse("+00:00").unwrap(),
        ));
        OutageStateMachine::new(
            MonitorConfig::default(),
            Arc::new(MemoryRepository::new()),
            Arc::new(MemorySnapshots::new()),
            notifier,
            t(0),
        )
        .into_shared()
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(WatchdogConfig::default().interval(), Duration::from_secs(10));
        assert_eq!(WatchdogConfig { interval_secs: 0 }.interval(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_tick_uses_clock() {
        let monitor = monitor();
        let clock = Arc::new(ManualClock::new(t(100)));
        let watchdog = Watchdog::new(monitor.clone(), clock.clone(), WatchdogConfig::default());

        assert!(watchdog.tick().await.is_empty());

        clock.set(t(200));
        let transitions = watchdog.tick().await;
        assert_eq!(transitions.len(), 1);
        assert_eq!(monitor.lock().await.phase(), Phase::Suspect);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_loop_confirms_outage() {
        let monitor = monitor();
        let clock = Arc::new(ManualClock::new(t(400)));
        let watchdog = Arc::new(Watchdog::new(monitor.clone(), clock, WatchdogConfig::default()));

        let handle = watchdog.clone().spawn();
        assert!(watchdog.is_running());
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(monitor.lock().await.phase(), Phase::OfflineConfirmed);

        watchdog.stop();
        handle.await.unwrap();
        assert!(!watchdog.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_keep_loop_quiet() {
        let monitor = monitor();
        let clock = Arc::new(ManualClock::new(t(0)));
        let watchdog = Arc::new(Watchdog::new(monitor.clone(), clock.clone(), WatchdogConfig::default()));
        let handle = watchdog.clone().spawn();

        for n in 1..=10 {
            clock.set(t(n * 60));
            monitor
                .lock()
                .await
                .on_heartbeat(&Heartbeat::new(t(n * 60)))
                .await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        assert_eq!(monitor.lock().await.phase(), Phase::Online);
        watchdog.stop();
        handle.await.unwrap();
    }
}
