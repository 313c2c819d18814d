//! Notification scheduler: the per-subject alert state machine.
//!
//! Each report runs the rules below against the subject's [`TrackingState`],
//! in order, while the caller holds the subject's lock:
//!
//! 1. **Zone disabled**: keep one recurring "zone disabled" reminder running,
//!    tear down the exit notifier, and skip the remaining alerting rules.
//! 2. **Outside zone**: on the first report outside, send a "left zone" alert
//!    immediately and start a recurring "still outside" follow-up. Later
//!    reports outside leave that timer alone.
//! 3. **Inside zone**: cancel the exit notifier.
//! 4. **Inactivity**: when the subject reports the exact same point and has
//!    not moved for the inactivity interval, arm a one-shot "calm" alert.
//!    Any movement cancels it and restarts the clock.
//!
//! Rules 2 and 3 also cancel a running "zone disabled" reminder, so the two
//! zone notifiers are never active at the same time.
//!
//! Alerts sent from timers carry the subject, zone, and position captured when
//! the timer was scheduled.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::alerts::{Alert, AlertKind};
use crate::config::EngineSettings;
use crate::dispatch::AlertDispatcher;
use crate::geo::Position;
use crate::tracking::{lock_state, SharedTracking, TimerHandle, TrackingState, TrackingStore};
use crate::types::Subject;
use crate::zone::{ZoneConfig, ZoneEvaluation};

/// Inputs of one report, after lookup and evaluation.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Subject the report belongs to.
    pub subject: Subject,
    /// Zone configuration read for this report.
    pub zone: ZoneConfig,
    /// Reported position.
    pub position: Position,
    /// Containment of `position` in `zone`.
    pub evaluation: ZoneEvaluation,
}

/// Which timer slot of a [`TrackingState`] a timer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerSlot {
    Exit,
    Disabled,
    Inactivity,
}

impl TimerSlot {
    fn get(self, state: &mut TrackingState) -> &mut Option<TimerHandle> {
        match self {
            Self::Exit => &mut state.exit_notifier,
            Self::Disabled => &mut state.disabled_notifier,
            Self::Inactivity => &mut state.inactivity_timer,
        }
    }

    fn holds(self, state: &mut TrackingState, generation: u64) -> bool {
        self.get(state)
            .as_ref()
            .is_some_and(|timer| timer.generation() == generation)
    }
}

/// Owns the debounce and repeat timers of every subject.
#[derive(Clone)]
pub struct NotificationScheduler {
    store: Arc<TrackingStore>,
    dispatcher: AlertDispatcher,
    settings: EngineSettings,
}

impl NotificationScheduler {
    /// Create a scheduler whose timers are numbered by `store`.
    pub fn new(
        store: Arc<TrackingStore>,
        dispatcher: AlertDispatcher,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            dispatcher,
            settings,
        }
    }

    /// Run the rules for one report.
    ///
    /// `state` must be the locked contents of `shared`. Returns the kinds of
    /// alerts sent immediately (timer-driven alerts are not included).
    pub fn apply(
        &self,
        shared: &SharedTracking,
        state: &mut TrackingState,
        ctx: &ReportContext,
        now: Instant,
    ) -> Vec<AlertKind> {
        let mut immediate = Vec::new();
        let subject_id = &ctx.subject.id;

        if !ctx.zone.enabled {
            if let Some(timer) = state.exit_notifier.take() {
                timer.cancel();
                debug!(subject_id = %subject_id, "Exit notifier cancelled, zone disabled");
            }
            if state.disabled_notifier.is_none() {
                let alert = Alert::zone_disabled(&ctx.subject);
                if self.settings.notify_disabled_immediately {
                    self.dispatcher.dispatch(alert.reissue());
                    immediate.push(AlertKind::ZoneDisabled);
                }
                let timer = self.start_recurring(
                    shared,
                    TimerSlot::Disabled,
                    ctx.zone.notification_interval(),
                    alert,
                );
                info!(
                    subject_id = %subject_id,
                    generation = timer.generation(),
                    "Safe zone disabled, reminder scheduled"
                );
                state.disabled_notifier = Some(timer);
            }
            Self::observe_movement(state, ctx.position, now);
            return immediate;
        }

        if let Some(timer) = state.disabled_notifier.take() {
            timer.cancel();
            info!(subject_id = %subject_id, "Safe zone re-enabled, reminder cancelled");
        }

        if ctx.evaluation.inside_zone {
            if let Some(timer) = state.exit_notifier.take() {
                timer.cancel();
                info!(subject_id = %subject_id, "Subject re-entered safe zone");
            }
        } else if state.exit_notifier.is_none() {
            self.dispatcher.dispatch(Alert::left_zone(
                &ctx.subject,
                ctx.position,
                ctx.zone.radius_meters,
            ));
            immediate.push(AlertKind::LeftZone);

            let timer = self.start_recurring(
                shared,
                TimerSlot::Exit,
                ctx.zone.notification_interval(),
                Alert::still_outside(&ctx.subject, ctx.position),
            );
            info!(
                subject_id = %subject_id,
                distance_meters = ctx.evaluation.distance_meters,
                generation = timer.generation(),
                "Subject left safe zone"
            );
            state.exit_notifier = Some(timer);
        }

        if !Self::observe_movement(state, ctx.position, now) {
            let threshold = ctx.zone.inactivity_interval();
            let still_since = *state.last_movement_at.get_or_insert(now);
            if now.duration_since(still_since) >= threshold && state.inactivity_timer.is_none() {
                let timer = self.start_one_shot(
                    shared,
                    TimerSlot::Inactivity,
                    threshold,
                    Alert::inactivity(&ctx.subject, ctx.position, threshold),
                );
                debug!(
                    subject_id = %subject_id,
                    generation = timer.generation(),
                    "Inactivity timer armed"
                );
                state.inactivity_timer = Some(timer);
            }
        }

        immediate
    }

    /// Track movement against the last persisted position.
    ///
    /// Returns `true` if the subject moved (or reports for the first time), in
    /// which case the inactivity clock restarts and a pending calm alert is dropped.
    fn observe_movement(state: &mut TrackingState, position: Position, now: Instant) -> bool {
        if state.last_position == Some(position) {
            return false;
        }
        if let Some(timer) = state.inactivity_timer.take() {
            timer.cancel();
        }
        state.last_movement_at = Some(now);
        true
    }

    /// Start a timer that dispatches `alert` every `period`, first after one period.
    ///
    /// A zero period yields a dormant handle: the slot is held so the state
    /// debounces, but no follow-ups are sent.
    fn start_recurring(
        &self,
        shared: &SharedTracking,
        slot: TimerSlot,
        period: Duration,
        alert: Alert,
    ) -> TimerHandle {
        let generation = self.store.next_generation();
        if period.is_zero() {
            return TimerHandle::dormant(generation);
        }

        let weak = Arc::downgrade(shared);
        let dispatcher = self.dispatcher.clone();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let task = tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else { break };
                let mut state = lock_state(&shared);
                if !slot.holds(&mut state, generation) {
                    break;
                }
                debug!(
                    subject_id = %alert.subject_id,
                    kind = alert.kind.as_str(),
                    generation,
                    "Recurring alert tick"
                );
                dispatcher.dispatch(alert.reissue());
            }
        });
        TimerHandle::new(generation, task)
    }

    /// Start a timer that dispatches `alert` once after `delay` and clears its slot.
    fn start_one_shot(
        &self,
        shared: &SharedTracking,
        slot: TimerSlot,
        delay: Duration,
        alert: Alert,
    ) -> TimerHandle {
        let generation = self.store.next_generation();
        let weak = Arc::downgrade(shared);
        let dispatcher = self.dispatcher.clone();
        let deadline = Instant::now() + delay;

        let task = tokio::spawn(async move {
            sleep_until(deadline).await;
            let Some(shared) = weak.upgrade() else { return };
            let mut state = lock_state(&shared);
            if !slot.holds(&mut state, generation) {
                return;
            }
            *slot.get(&mut state) = None;
            debug!(
                subject_id = %alert.subject_id,
                kind = alert.kind.as_str(),
                generation,
                "One-shot alert fired"
            );
            dispatcher.dispatch(alert);
        });
        TimerHandle::new(generation, task)
    }
}
