/// Periodic activity sampling and observer dispatch
use super::clock::Clock;
use super::font_monitor::FontActivitySource;
use super::idle::IdleTimeSource;
use super::observer::{ActivityCallback, ActivityObserverEntry, ActivityObserverOptions};
use super::sample::PollSample;
use crate::error::{EventError, IdleTimeError};
use crate::fonts::HostEnvironment;
use crate::types::{ActivityObserverId, ObjectRef};
use crate::utils::lock;
use std::any::{type_name, Any};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Default time between poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct PollerState {
    observers: Vec<ActivityObserverEntry>,
    interval: Duration,
    polling: bool,
    timer: Option<JoinHandle<()>>,
    last_poll: Option<f64>,
    became_active_at: Option<f64>,
    resigned_active_at: Option<f64>,
    ticks: u64,
}

/// Samples user and font inactivity on a timer and notifies observers whose
/// thresholds are met.
///
/// Polling starts when the first observer is added and stops when the last
/// one is removed. Each tick is one call to [`ActivityPoller::poll_once`];
/// ticks can also be driven by hand, which is how tests replay a timeline.
///
/// The timer is a tokio task that sleeps for the interval and then runs the
/// tick on the blocking pool, so ticks never overlap and a slow tick only
/// delays the next one. Precision
/// is best-effort: each tick may shell out to the idle-time query.
pub struct ActivityPoller {
    host: Arc<dyn HostEnvironment>,
    idle_source: Arc<dyn IdleTimeSource>,
    font_activity: Arc<dyn FontActivitySource>,
    clock: Arc<dyn Clock>,
    state: Mutex<PollerState>,
    self_ref: Weak<Self>,
}

impl std::fmt::Debug for ActivityPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ActivityPoller")
            .field("idle_source", &self.idle_source.name())
            .field("observers", &state.observers.len())
            .field("interval", &state.interval)
            .field("polling", &state.polling)
            .field("ticks", &state.ticks)
            .finish()
    }
}

impl ActivityPoller {
    pub fn new(
        host: Arc<dyn HostEnvironment>,
        idle_source: Arc<dyn IdleTimeSource>,
        font_activity: Arc<dyn FontActivitySource>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            host,
            idle_source,
            font_activity,
            clock,
            state: Mutex::new(PollerState {
                interval: interval.max(MIN_POLL_INTERVAL),
                ..PollerState::default()
            }),
            self_ref: self_ref.clone(),
        })
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Adds an observer and starts polling if needed.
    ///
    /// `method` is called on a tick when every threshold in `options` is
    /// met. Unless `options.repeat` is set it is called once per inactivity
    /// period.
    pub fn add_observer<O, F>(
        &self,
        observer: &Arc<O>,
        options: ActivityObserverOptions,
        method: F,
    ) -> ActivityObserverId
    where
        O: Any + Send + Sync,
        F: Fn(&O, &PollSample) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let callback: ActivityCallback = Arc::new(
            move |target: &(dyn Any + Send + Sync), sample: &PollSample| match target
                .downcast_ref::<O>()
            {
                Some(observer) => method(observer, sample),
                None => Err(EventError::HandlerExecution(format!(
                    "observer is not a {}",
                    type_name::<O>()
                ))),
            },
        );
        let id = ActivityObserverId::new();
        lock(&self.state).observers.push(ActivityObserverEntry {
            id,
            observer: ObjectRef::new(observer),
            options,
            callback,
            notified: None,
        });

        debug!("📝 Added activity observer {} ({:?})", type_name::<O>(), options);
        self.start_polling();
        id
    }

    /// Removes one observer. Stops polling when none remain.
    pub fn remove_observer(&self, id: ActivityObserverId) -> Result<(), EventError> {
        let remaining = {
            let mut state = lock(&self.state);
            let before = state.observers.len();
            state.observers.retain(|entry| entry.id != id);
            if state.observers.len() == before {
                return Err(EventError::ActivityObserverNotFound(id.to_string()));
            }
            state.observers.len()
        };

        debug!("🗑️ Removed activity observer {}", id);
        if remaining == 0 {
            self.stop_polling();
        }
        Ok(())
    }

    /// Removes every entry registered by `observer`. Returns how many.
    pub fn remove_observers_for<O: ?Sized>(&self, observer: &Arc<O>) -> usize {
        let (removed, remaining) = {
            let mut state = lock(&self.state);
            let before = state.observers.len();
            state.observers.retain(|entry| !entry.observer.refers_to(observer));
            (before - state.observers.len(), state.observers.len())
        };
        if removed > 0 && remaining == 0 {
            self.stop_polling();
        }
        removed
    }

    /// Removes every observer and stops polling.
    pub fn remove_all_observers(&self) -> usize {
        let removed = {
            let mut state = lock(&self.state);
            let removed = state.observers.len();
            state.observers.clear();
            removed
        };
        self.stop_polling();
        removed
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.state).observers.len()
    }

    // ========================================================================
    // Host edges
    // ========================================================================

    /// Records the moment the application stopped being frontmost.
    ///
    /// While inactive, user idle time is measured from this moment.
    pub fn app_did_resign_active(&self) {
        let now = self.clock.now();
        lock(&self.state).resigned_active_at = Some(now);
        debug!("💤 Application resigned active at {:.2}", now);
    }

    /// Records the moment the application became frontmost.
    pub fn app_did_become_active(&self) {
        let now = self.clock.now();
        lock(&self.state).became_active_at = Some(now);
        debug!("☀️ Application became active at {:.2}", now);
    }

    // ========================================================================
    // Ticks
    // ========================================================================

    /// Runs one poll tick and returns the sample it delivered.
    ///
    /// Never fails: an unknown user idle time only prevents user-activity
    /// thresholds from matching on this tick.
    pub fn poll_once(&self) -> PollSample {
        let app_is_active = self.host.app_is_active();
        let font_idle = self.font_activity.font_idle_time();
        let user_idle = if app_is_active {
            match self.idle_source.user_idle_time() {
                Ok(sample) => Some(sample),
                Err(IdleTimeError::Unavailable) => None,
                Err(e) => {
                    warn!("⚠️ User idle time unknown ({}): {}", e.as_label(), e);
                    None
                }
            }
        } else {
            None
        };
        let now = self.clock.now();

        let (sample, due, dead) = {
            let mut state = lock(&self.state);
            let (since_user_activity, ended_user_activity) = match (app_is_active, user_idle) {
                (true, Some(idle)) => (Some(idle.seconds), Some(idle.ended_at)),
                (true, None) => (None, None),
                (false, _) => match state.resigned_active_at {
                    Some(resigned) => (Some(now - resigned), Some(resigned)),
                    None => (None, None),
                },
            };

            let previous = state.last_poll.replace(now);
            let (user_activity, font_activity) = match previous {
                Some(previous) => {
                    let since_last_poll = now - previous;
                    (
                        since_user_activity.is_some_and(|since| since < since_last_poll),
                        font_idle.seconds < since_last_poll,
                    )
                }
                None => (false, false),
            };
            state.ticks += 1;

            let sample = PollSample {
                app_is_active,
                user_activity,
                since_user_activity,
                ended_user_activity,
                font_activity,
                since_font_activity: font_idle.seconds,
                ended_font_activity: font_idle.ended_at,
                became_active_at: state.became_active_at,
                resigned_active_at: state.resigned_active_at,
                polled_at: now,
            };

            let mut due = Vec::new();
            let mut dead = Vec::new();
            for entry in state.observers.iter_mut() {
                if !entry.observer.is_alive() {
                    dead.push(entry.id);
                    continue;
                }
                if entry.matches(&sample) {
                    entry.notified = Some(sample.period());
                    due.push((entry.observer.clone(), entry.callback.clone()));
                }
            }
            (sample, due, dead)
        };

        trace!(
            "🕒 Poll tick: active={} user={:?} font={:.2} -> {} observer(s)",
            sample.app_is_active,
            sample.since_user_activity,
            sample.since_font_activity,
            due.len()
        );

        for (observer, callback) in due {
            let Some(target) = observer.upgrade() else {
                continue;
            };
            if let Err(e) = callback(target.as_ref(), &sample) {
                error!(
                    "❌ Activity observer {} failed: {}",
                    observer.type_name(),
                    e
                );
            }
        }

        if !dead.is_empty() {
            self.prune(&dead);
        }
        sample
    }

    /// Number of ticks run so far.
    pub fn tick_count(&self) -> u64 {
        lock(&self.state).ticks
    }

    fn prune(&self, dead: &[ActivityObserverId]) {
        let remaining = {
            let mut state = lock(&self.state);
            state.observers.retain(|entry| !dead.contains(&entry.id));
            state.observers.len()
        };
        debug!("🗑️ Pruned {} dead activity observer(s)", dead.len());
        if remaining == 0 {
            self.stop_polling();
        }
    }

    // ========================================================================
    // Polling
    // ========================================================================

    pub fn is_polling(&self) -> bool {
        lock(&self.state).polling
    }

    pub fn interval(&self) -> Duration {
        lock(&self.state).interval
    }

    /// Changes the tick interval. A running timer is restarted so the new
    /// interval applies to the next tick.
    pub fn set_interval(&self, interval: Duration) {
        let restart = {
            let mut state = lock(&self.state);
            state.interval = interval.max(MIN_POLL_INTERVAL);
            state.polling
        };
        if restart {
            self.stop_polling();
            self.start_polling();
        }
    }

    /// Starts the timer and the font activity source. No-op if polling.
    ///
    /// Outside a tokio runtime polling is flagged on but no timer runs;
    /// ticks must then be driven with [`ActivityPoller::poll_once`].
    pub fn start_polling(&self) {
        {
            let mut state = lock(&self.state);
            if state.polling {
                return;
            }
            state.polling = true;
        }
        self.font_activity.start_observing();

        match Handle::try_current() {
            Ok(handle) => {
                let timer = handle.spawn(run_timer(self.self_ref.clone()));
                lock(&self.state).timer = Some(timer);
                info!("⏱️ Activity polling started ({:?})", self.interval());
            }
            Err(_) => {
                warn!("⚠️ No async runtime; activity ticks must be driven manually");
            }
        }
    }

    /// Stops the timer and the font activity source. No-op if stopped.
    pub fn stop_polling(&self) {
        let timer = {
            let mut state = lock(&self.state);
            if !state.polling {
                return;
            }
            state.polling = false;
            state.timer.take()
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        self.font_activity.stop_observing();
        info!("⏱️ Activity polling stopped");
    }
}

impl Drop for ActivityPoller {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }
}

/// Sleeps for the interval, ticks, and repeats while polling.
async fn run_timer(poller: Weak<ActivityPoller>) {
    loop {
        let interval = match poller.upgrade() {
            Some(poller) if poller.is_polling() => poller.interval(),
            _ => break,
        };
        tokio::time::sleep(interval).await;

        let Some(poller) = poller.upgrade() else {
            break;
        };
        if !poller.is_polling() {
            break;
        }
        // The idle-time query may shell out; keep it off the runtime workers.
        let tick = tokio::task::spawn_blocking(move || {
            poller.poll_once();
        });
        if let Err(e) = tick.await {
            error!("❌ Activity poll tick failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{
        AppStateRequirement, IdleSample, ManualClock, ManualIdleTimeSource,
    };
    use crate::fonts::InMemoryHost;

    #[derive(Debug, Default)]
    struct ScriptedFontActivity {
        sample: Mutex<Option<IdleSample>>,
        observing: Mutex<bool>,
    }

    impl ScriptedFontActivity {
        fn set(&self, seconds: f64, ended_at: f64) {
            *self.sample.lock().unwrap() = Some(IdleSample { seconds, ended_at });
        }
    }

    impl FontActivitySource for ScriptedFontActivity {
        fn font_idle_time(&self) -> IdleSample {
            self.sample.lock().unwrap().unwrap_or(IdleSample {
                seconds: 0.0,
                ended_at: 0.0,
            })
        }

        fn start_observing(&self) {
            *self.observing.lock().unwrap() = true;
        }

        fn stop_observing(&self) {
            *self.observing.lock().unwrap() = false;
        }
    }

    #[derive(Default)]
    struct Counter {
        samples: Mutex<Vec<PollSample>>,
    }

    impl Counter {
        fn hit(&self, sample: &PollSample) -> Result<(), EventError> {
            self.samples.lock().unwrap().push(*sample);
            Ok(())
        }

        fn count(&self) -> usize {
            self.samples.lock().unwrap().len()
        }
    }

    struct Rig {
        clock: Arc<ManualClock>,
        host: Arc<InMemoryHost>,
        idle: Arc<ManualIdleTimeSource>,
        fonts: Arc<ScriptedFontActivity>,
        poller: Arc<ActivityPoller>,
    }

    impl Rig {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new(1_000.0));
            let host = Arc::new(InMemoryHost::new());
            let idle = Arc::new(ManualIdleTimeSource::new());
            let fonts = Arc::new(ScriptedFontActivity::default());
            let poller = ActivityPoller::new(
                host.clone(),
                idle.clone(),
                fonts.clone(),
                clock.clone(),
                DEFAULT_POLL_INTERVAL,
            );
            Self {
                clock,
                host,
                idle,
                fonts,
                poller,
            }
        }

        /// Advances two seconds and sets both idle signals as if activity
        /// ended at the given times.
        fn tick(&self, user_ended_at: f64, font_ended_at: f64) -> PollSample {
            self.clock.advance(2.0);
            let now = self.clock.now();
            self.idle.set(IdleSample {
                seconds: now - user_ended_at,
                ended_at: user_ended_at,
            });
            self.fonts.set(now - font_ended_at, font_ended_at);
            self.poller.poll_once()
        }
    }

    #[test]
    fn test_polling_follows_observer_count() {
        let rig = Rig::new();
        let counter = Arc::new(Counter::default());
        assert!(!rig.poller.is_polling());

        let id = rig
            .poller
            .add_observer(&counter, ActivityObserverOptions::default(), Counter::hit);
        assert!(rig.poller.is_polling());
        assert!(*rig.fonts.observing.lock().unwrap());

        rig.poller.remove_observer(id).unwrap();
        assert!(!rig.poller.is_polling());
        assert!(!*rig.fonts.observing.lock().unwrap());

        let err = rig.poller.remove_observer(id).unwrap_err();
        assert!(matches!(err, EventError::ActivityObserverNotFound(_)));
    }

    #[test]
    fn test_fires_once_per_inactivity_period() {
        let rig = Rig::new();
        let counter = Arc::new(Counter::default());
        rig.poller
            .add_observer(&counter, ActivityObserverOptions::default(), Counter::hit);

        // Activity ended at 1000; thresholds of 2s are met from the first tick.
        rig.tick(1_000.0, 1_000.0);
        rig.tick(1_000.0, 1_000.0);
        rig.tick(1_000.0, 1_000.0);
        assert_eq!(counter.count(), 1);

        // New activity at 1007 starts a new period.
        let sample = rig.tick(1_007.0, 1_000.0);
        assert!(sample.user_activity);
        assert_eq!(counter.count(), 1);
        rig.tick(1_007.0, 1_000.0);
        rig.tick(1_007.0, 1_000.0);
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn test_repeat_fires_every_qualifying_tick() {
        let rig = Rig::new();
        let counter = Arc::new(Counter::default());
        rig.poller.add_observer(
            &counter,
            ActivityObserverOptions::default().repeating(true),
            Counter::hit,
        );

        rig.tick(1_000.0, 1_000.0);
        rig.tick(1_000.0, 1_000.0);
        rig.tick(1_000.0, 1_000.0);
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn test_first_tick_reports_no_activity() {
        let rig = Rig::new();
        let sample = rig.tick(1_001.9, 1_001.9);
        assert!(!sample.user_activity);
        assert!(!sample.font_activity);

        let sample = rig.tick(1_003.9, 1_003.9);
        assert!(sample.user_activity);
        assert!(sample.font_activity);
        assert_eq!(rig.poller.tick_count(), 2);
    }

    #[test]
    fn test_app_state_requirement() {
        let rig = Rig::new();
        let active_only = Arc::new(Counter::default());
        let inactive_only = Arc::new(Counter::default());
        rig.poller.add_observer(
            &active_only,
            ActivityObserverOptions::default()
                .with_app_state(AppStateRequirement::Active)
                .repeating(true),
            Counter::hit,
        );
        rig.poller.add_observer(
            &inactive_only,
            ActivityObserverOptions::default()
                .with_app_state(AppStateRequirement::Inactive)
                .repeating(true),
            Counter::hit,
        );

        rig.tick(1_000.0, 1_000.0);
        rig.tick(1_000.0, 1_000.0);
        assert_eq!(active_only.count(), 2);
        assert_eq!(inactive_only.count(), 0);

        rig.poller.app_did_resign_active();
        rig.host.set_active(false);
        rig.tick(1_000.0, 1_000.0);
        rig.tick(1_000.0, 1_000.0);
        assert_eq!(active_only.count(), 2);
        assert_eq!(inactive_only.count(), 2);
        assert!(inactive_only
            .samples
            .lock()
            .unwrap()
            .iter()
            .all(|sample| !sample.app_is_active));
    }

    #[test]
    fn test_inactive_app_measures_from_resignation() {
        let rig = Rig::new();
        rig.poller.app_did_resign_active();
        rig.host.set_active(false);

        let sample = rig.tick(0.0, 1_000.0);
        assert_eq!(sample.resigned_active_at, Some(1_000.0));
        assert_eq!(sample.ended_user_activity, Some(1_000.0));
        assert_eq!(sample.since_user_activity, Some(2.0));
    }

    #[test]
    fn test_unknown_idle_time_blocks_user_thresholds() {
        let rig = Rig::new();
        let user = Arc::new(Counter::default());
        let font_only = Arc::new(Counter::default());
        rig.poller
            .add_observer(&user, ActivityObserverOptions::default(), Counter::hit);
        rig.poller.add_observer(
            &font_only,
            ActivityObserverOptions::default().with_user_inactivity(None),
            Counter::hit,
        );

        rig.clock.advance(5.0);
        rig.idle.set_unknown();
        rig.fonts.set(5.0, 1_000.0);
        let sample = rig.poller.poll_once();

        assert_eq!(sample.since_user_activity, None);
        assert_eq!(user.count(), 0);
        assert_eq!(font_only.count(), 1);
    }

    #[test]
    fn test_dead_observer_is_pruned_and_polling_stops() {
        let rig = Rig::new();
        let counter = Arc::new(Counter::default());
        rig.poller
            .add_observer(&counter, ActivityObserverOptions::default(), Counter::hit);
        drop(counter);

        rig.tick(1_000.0, 1_000.0);
        assert_eq!(rig.poller.observer_count(), 0);
        assert!(!rig.poller.is_polling());
    }

    #[test]
    fn test_failing_observer_does_not_stop_ticks() {
        let rig = Rig::new();
        let failing = Arc::new(Counter::default());
        let healthy = Arc::new(Counter::default());
        rig.poller.add_observer(
            &failing,
            ActivityObserverOptions::default().repeating(true),
            |_: &Counter, _| Err(EventError::HandlerExecution("boom".to_string())),
        );
        rig.poller.add_observer(
            &healthy,
            ActivityObserverOptions::default().repeating(true),
            Counter::hit,
        );

        rig.tick(1_000.0, 1_000.0);
        rig.tick(1_000.0, 1_000.0);
        assert_eq!(healthy.count(), 2);
        assert_eq!(rig.poller.observer_count(), 2);
    }

    #[test]
    fn test_remove_observers_for() {
        let rig = Rig::new();
        let counter = Arc::new(Counter::default());
        rig.poller
            .add_observer(&counter, ActivityObserverOptions::default(), Counter::hit);
        rig.poller.add_observer(
            &counter,
            ActivityObserverOptions::default().repeating(true),
            Counter::hit,
        );

        assert_eq!(rig.poller.remove_observers_for(&counter), 2);
        assert!(!rig.poller.is_polling());
        assert_eq!(rig.poller.remove_all_observers(), 0);
    }

    #[test]
    fn test_observer_may_remove_itself_during_tick() {
        struct OneShot {
            poller: Weak<ActivityPoller>,
            id: Mutex<Option<ActivityObserverId>>,
        }

        let rig = Rig::new();
        let one_shot = Arc::new(OneShot {
            poller: Arc::downgrade(&rig.poller),
            id: Mutex::new(None),
        });
        let id = rig.poller.add_observer(
            &one_shot,
            ActivityObserverOptions::default(),
            |observer: &OneShot, _| {
                let id = observer.id.lock().unwrap().take();
                if let (Some(poller), Some(id)) = (observer.poller.upgrade(), id) {
                    poller.remove_observer(id)?;
                }
                Ok(())
            },
        );
        *one_shot.id.lock().unwrap() = Some(id);

        rig.tick(1_000.0, 1_000.0);
        assert_eq!(rig.poller.observer_count(), 0);
        assert!(!rig.poller.is_polling());
    }

    #[test]
    fn test_interval_is_clamped() {
        let rig = Rig::new();
        assert_eq!(rig.poller.interval(), DEFAULT_POLL_INTERVAL);
        rig.poller.set_interval(Duration::ZERO);
        assert_eq!(rig.poller.interval(), MIN_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_drives_ticks() {
        let rig = Rig::new();
        let counter = Arc::new(Counter::default());
        rig.poller.set_interval(Duration::from_millis(100));
        rig.poller.add_observer(
            &counter,
            ActivityObserverOptions::default()
                .with_user_inactivity(None)
                .with_font_inactivity(None)
                .repeating(true),
            Counter::hit,
        );

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(rig.poller.tick_count(), 3);
        assert_eq!(counter.count(), 3);

        rig.poller.stop_polling();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(rig.poller.tick_count(), 3);
    }

    #[derive(Default)]
    struct ThreadRecorder {
        threads: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl ThreadRecorder {
        fn record(&self, _: &PollSample) -> Result<(), EventError> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ticks_run_off_the_runtime_thread() {
        let rig = Rig::new();
        let recorder = Arc::new(ThreadRecorder::default());
        rig.poller.set_interval(Duration::from_millis(100));
        rig.poller.add_observer(
            &recorder,
            ActivityObserverOptions::default()
                .with_user_inactivity(None)
                .with_font_inactivity(None)
                .repeating(true),
            ThreadRecorder::record,
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        rig.poller.stop_polling();

        let runtime_thread = std::thread::current().id();
        let threads = recorder.threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|thread| *thread != runtime_thread));
    }
}
