//! Location event processor.
//!
//! Consumes one [`LocationReport`] at a time:
//!
//! 1. decode and validate the coordinates
//! 2. resolve the subject and read its safe zone
//! 3. evaluate containment and broadcast a status update
//! 4. run the notification scheduler and persist the last position
//!
//! Every failure is recovered here. A bad report is logged and dropped, and
//! the tracking state is only touched once all lookups have succeeded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use crate::alerts::{Alert, AlertKind};
use crate::config::EngineSettings;
use crate::dispatch::AlertDispatcher;
use crate::error::{Result, SafezoneError};
use crate::geo::Position;
use crate::ports::{AlertAudit, Broadcaster, Messenger, SubjectDirectory};
use crate::scheduler::{NotificationScheduler, ReportContext};
use crate::tracking::{lock_state, TrackingStore};
use crate::types::{LocationReport, StatusUpdate, Subject, SubjectId};
use crate::zone::evaluate;

/// What processing a report led to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// The report was dropped; `error_code` says why.
    Ignored {
        /// Machine-readable reason.
        error_code: String,
    },

    /// The subject has no safe zone configured.
    Unconfigured {
        /// Subject the report belonged to.
        subject_id: SubjectId,
        /// Whether this report triggered the one-time informational notice.
        notice_sent: bool,
    },

    /// The report was evaluated against the subject's zone.
    Evaluated {
        /// Subject the report belonged to.
        subject_id: SubjectId,
        /// Containment result.
        inside_zone: bool,
        /// Distance to the zone center in meters.
        distance_meters: f64,
        /// Alerts sent immediately because of this report.
        immediate_alerts: Vec<AlertKind>,
    },
}

/// Orchestrates lookups, evaluation, broadcast, and the scheduler.
#[derive(Clone)]
pub struct LocationProcessor {
    directory: Arc<dyn SubjectDirectory>,
    broadcaster: Arc<dyn Broadcaster>,
    dispatcher: AlertDispatcher,
    scheduler: NotificationScheduler,
    store: Arc<TrackingStore>,
}

impl LocationProcessor {
    /// Create a processor with a fresh tracking store.
    pub fn new(
        directory: Arc<dyn SubjectDirectory>,
        broadcaster: Arc<dyn Broadcaster>,
        messenger: Arc<dyn Messenger>,
        audit: Arc<dyn AlertAudit>,
        settings: EngineSettings,
    ) -> Self {
        let store = Arc::new(TrackingStore::new());
        let dispatcher = AlertDispatcher::new(messenger, audit);
        let scheduler =
            NotificationScheduler::new(Arc::clone(&store), dispatcher.clone(), settings);
        Self {
            directory,
            broadcaster,
            dispatcher,
            scheduler,
            store,
        }
    }

    /// The tracking store backing this processor.
    #[must_use]
    pub fn store(&self) -> &Arc<TrackingStore> {
        &self.store
    }

    /// Process one report, recovering from any error.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn process(&self, report: &LocationReport) -> ProcessOutcome {
        match self.process_checked(report).await {
            Ok(outcome) => outcome,
            Err(err) => {
                Self::log_rejection(&report.id, &err);
                ProcessOutcome::Ignored {
                    error_code: err.error_code().to_string(),
                }
            }
        }
    }

    /// Process one report, returning the error that stopped it, if any.
    ///
    /// # Errors
    ///
    /// Returns the lookup, validation, or persistence error that aborted the
    /// report. Tracking state is unchanged in that case.
    #[instrument(skip(self, report), fields(external_id = %report.id))]
    pub async fn process_checked(&self, report: &LocationReport) -> Result<ProcessOutcome> {
        let position = report.position()?.validate()?;

        let subject = self
            .directory
            .subject_by_external_id(&report.id)
            .await?
            .ok_or_else(|| SafezoneError::SubjectNotFound(report.id.clone()))?;

        let Some(zone) = self.directory.zone_config(&subject.id).await? else {
            return Ok(self.handle_unconfigured(&subject, position));
        };
        zone.validate()?;

        let evaluation = evaluate(position, &zone)?;
        info!(
            subject_id = %subject.id,
            distance_meters = evaluation.distance_meters,
            radius_meters = zone.radius_meters,
            inside_zone = evaluation.inside_zone,
            enabled = zone.enabled,
            "Location evaluated"
        );

        self.broadcaster.publish(StatusUpdate::evaluated(
            subject.id.clone(),
            position,
            evaluation,
            zone.radius_meters,
        ));

        let ctx = ReportContext {
            subject,
            zone,
            position,
            evaluation,
        };
        let shared = self.store.entry(&ctx.subject.id);
        let immediate_alerts = {
            let mut state = lock_state(&shared);
            state.unconfigured_notice_sent = false;
            let immediate = self
                .scheduler
                .apply(&shared, &mut state, &ctx, Instant::now());
            state.last_position = Some(position);
            immediate
        };

        Ok(ProcessOutcome::Evaluated {
            subject_id: ctx.subject.id,
            inside_zone: evaluation.inside_zone,
            distance_meters: evaluation.distance_meters,
            immediate_alerts,
        })
    }

    /// Log a rejected report at the level its error class calls for.
    pub fn log_rejection(external_id: &str, err: &SafezoneError) {
        if err.is_expected_state() {
            warn!(
                external_id,
                error_code = err.error_code(),
                error = %err,
                "Location report dropped"
            );
        } else {
            error!(
                external_id,
                error_code = err.error_code(),
                error = %err,
                "Location report failed"
            );
        }
    }

    /// Cancel every running timer. Used on shutdown.
    pub fn shutdown(&self) {
        let subjects = self.store.cancel_all();
        info!(subjects, "All alert timers cancelled");
    }

    fn handle_unconfigured(&self, subject: &Subject, position: Position) -> ProcessOutcome {
        warn!(subject_id = %subject.id, "No safe zone configured for subject");

        self.broadcaster
            .publish(StatusUpdate::unconfigured(subject.id.clone(), position));

        let shared = self.store.entry(&subject.id);
        let mut state = lock_state(&shared);
        state.cancel_all();
        let notice_sent = !state.unconfigured_notice_sent;
        if notice_sent {
            state.unconfigured_notice_sent = true;
            self.dispatcher.dispatch(Alert::unconfigured(subject));
        } else {
            debug!(subject_id = %subject.id, "Unconfigured notice already sent");
        }

        ProcessOutcome::Unconfigured {
            subject_id: subject.id.clone(),
            notice_sent,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{settle, zone, Harness};
    use crate::zone::ZoneConfig;

    fn outside() -> LocationReport {
        LocationReport::new("user-1", 0.0, 0.002)
    }

    fn inside() -> LocationReport {
        LocationReport::new("user-1", 0.0, 0.0001)
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_zone_alerts_once_and_starts_timer() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));

        let outcome = h.processor.process(&outside()).await;
        settle().await;

        match outcome {
            ProcessOutcome::Evaluated {
                inside_zone,
                distance_meters,
                immediate_alerts,
                ..
            } => {
                assert!(!inside_zone);
                assert!((distance_meters - 222.39).abs() < 0.01);
                assert_eq!(immediate_alerts, vec![AlertKind::LeftZone]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        assert_eq!(h.messenger.kinds_sent(), vec!["left"]);
        let snapshot = h.snapshot("1");
        assert!(snapshot.exit_notifier.is_some());
        assert!(snapshot.disabled_notifier.is_none());

        let updates = h.broadcaster.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].inside_zone, Some(false));
        assert_eq!(updates[0].zone_radius_meters, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_reports_outside_do_not_duplicate() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));

        h.processor.process(&outside()).await;
        let generation = h.snapshot("1").exit_notifier;
        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(1)).await;
            let outcome = h.processor.process(&outside()).await;
            let ProcessOutcome::Evaluated {
                immediate_alerts, ..
            } = outcome
            else {
                panic!("expected an evaluated report");
            };
            assert!(immediate_alerts.is_empty());
        }
        settle().await;

        assert_eq!(h.messenger.sent().len(), 1);
        assert_eq!(h.snapshot("1").exit_notifier, generation);
        assert_eq!(h.broadcaster.updates().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_still_outside_follow_ups_use_scheduled_snapshot() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));

        h.processor.process(&outside()).await;
        settle().await;

        // Move further out; the follow-up keeps the position it was scheduled with.
        h.processor
            .process(&LocationReport::new("user-1", 0.0, 0.01))
            .await;

        tokio::time::sleep(Duration::from_millis(60_001)).await;
        settle().await;
        tokio::time::sleep(Duration::from_millis(60_000)).await;
        settle().await;

        let sent = h.messenger.sent();
        assert_eq!(h.messenger.kinds_sent(), vec!["left", "still", "still"]);
        assert!(sent[1].1.contains("Lng: 0.0020"));
        assert_eq!(h.audit.records().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentry_clears_exit_notifier() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));

        h.processor.process(&outside()).await;
        h.processor.process(&outside()).await;
        h.processor.process(&inside()).await;
        settle().await;

        assert!(h.snapshot("1").exit_notifier.is_none());

        tokio::time::sleep(Duration::from_secs(300)).await;
        settle().await;
        assert_eq!(h.messenger.kinds_sent(), vec!["left"]);

        // Leaving again is a new transition with a fresh immediate alert.
        h.processor.process(&outside()).await;
        settle().await;
        assert_eq!(h.messenger.kinds_sent(), vec!["left", "left"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactivity_arms_exactly_at_threshold() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));

        h.processor.process(&inside()).await;
        tokio::time::advance(Duration::from_millis(299_999)).await;
        h.processor.process(&inside()).await;
        assert!(h.snapshot("1").inactivity_timer.is_none());

        tokio::time::advance(Duration::from_millis(1)).await;
        h.processor.process(&inside()).await;
        assert!(h.snapshot("1").inactivity_timer.is_some());

        tokio::time::sleep(Duration::from_millis(300_001)).await;
        settle().await;

        assert_eq!(h.messenger.kinds_sent(), vec!["calm"]);
        assert!(h.snapshot("1").inactivity_timer.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_movement_cancels_inactivity_timer() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));

        h.processor.process(&inside()).await;
        tokio::time::advance(Duration::from_secs(300)).await;
        h.processor.process(&inside()).await;
        assert!(h.snapshot("1").inactivity_timer.is_some());

        h.processor
            .process(&LocationReport::new("user-1", 0.0, 0.0002))
            .await;
        assert!(h.snapshot("1").inactivity_timer.is_none());

        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;
        assert!(h.messenger.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_zone_creates_single_reminder() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(false, 100.0)));

        h.processor.process(&outside()).await;
        let generation = h.snapshot("1").disabled_notifier;
        assert!(generation.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        let outcome = h.processor.process(&outside()).await;
        settle().await;

        assert_eq!(h.snapshot("1").disabled_notifier, generation);
        assert!(h.snapshot("1").exit_notifier.is_none());
        let ProcessOutcome::Evaluated {
            immediate_alerts, ..
        } = outcome
        else {
            panic!("expected an evaluated report");
        };
        assert!(immediate_alerts.is_empty());
        assert!(h.messenger.sent().is_empty());

        tokio::time::sleep(Duration::from_millis(59_001)).await;
        settle().await;
        assert_eq!(h.messenger.kinds_sent(), vec!["disabled"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_zone_immediate_policy() {
        let h = Harness::new(EngineSettings {
            notify_disabled_immediately: true,
        });
        h.directory.add("1", "user-1", Some(zone(false, 100.0)));

        h.processor.process(&inside()).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        h.processor.process(&inside()).await;
        settle().await;

        assert_eq!(h.messenger.kinds_sent(), vec!["disabled"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_and_exit_notifiers_are_exclusive() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));

        h.processor.process(&outside()).await;
        let s = h.snapshot("1");
        assert!(s.exit_notifier.is_some() && s.disabled_notifier.is_none());

        h.directory.set_zone("1", Some(zone(false, 100.0)));
        h.processor.process(&outside()).await;
        let s = h.snapshot("1");
        assert!(s.exit_notifier.is_none() && s.disabled_notifier.is_some());

        h.directory.set_zone("1", Some(zone(true, 100.0)));
        h.processor.process(&outside()).await;
        let s = h.snapshot("1");
        assert!(s.exit_notifier.is_some() && s.disabled_notifier.is_none());

        settle().await;
        assert_eq!(h.messenger.kinds_sent(), vec!["left", "left"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_subject() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("2", "user-2", None);

        let first = h
            .processor
            .process(&LocationReport::new("user-2", 1.0, 1.0))
            .await;
        let second = h
            .processor
            .process(&LocationReport::new("user-2", 1.0, 1.0))
            .await;
        settle().await;

        assert!(matches!(first, ProcessOutcome::Unconfigured { notice_sent: true, .. }));
        assert!(matches!(second, ProcessOutcome::Unconfigured { notice_sent: false, .. }));

        let updates = h.broadcaster.updates();
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|u| u.inside_zone.is_none()));

        assert_eq!(h.messenger.kinds_sent(), vec!["unconfigured"]);
        let s = h.snapshot("2");
        assert!(s.exit_notifier.is_none());
        assert!(s.disabled_notifier.is_none());
        assert!(s.inactivity_timer.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_zone_silences_pending_inactivity() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));

        h.processor.process(&inside()).await;
        tokio::time::advance(Duration::from_secs(300)).await;
        h.processor.process(&inside()).await;
        assert!(h.snapshot("1").inactivity_timer.is_some());

        h.directory.set_zone("1", None);
        let outcome = h.processor.process(&inside()).await;
        assert!(matches!(outcome, ProcessOutcome::Unconfigured { notice_sent: true, .. }));
        assert!(h.snapshot("1").inactivity_timer.is_none());

        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(h.messenger.kinds_sent(), vec!["unconfigured"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_exit_alerts_once() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add(
            "1",
            "user-1",
            Some(ZoneConfig {
                notification_interval_ms: 0,
                ..zone(true, 100.0)
            }),
        );

        h.processor.process(&outside()).await;
        let generation = h.snapshot("1").exit_notifier;
        assert!(generation.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        h.processor.process(&outside()).await;
        assert_eq!(h.snapshot("1").exit_notifier, generation);

        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(h.messenger.kinds_sent(), vec!["left"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_disabled_zone_stays_silent() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add(
            "1",
            "user-1",
            Some(ZoneConfig {
                notification_interval_ms: 0,
                ..zone(false, 100.0)
            }),
        );

        h.processor.process(&outside()).await;
        let generation = h.snapshot("1").disabled_notifier;
        assert!(generation.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        h.processor.process(&outside()).await;
        assert_eq!(h.snapshot("1").disabled_notifier, generation);

        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;
        assert!(h.messenger.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_subject_is_ignored() {
        let h = Harness::new(EngineSettings::default());

        let outcome = h.processor.process(&outside()).await;

        assert_eq!(
            outcome,
            ProcessOutcome::Ignored {
                error_code: "SUBJECT_NOT_FOUND".into()
            }
        );
        assert!(h.broadcaster.updates().is_empty());
        assert!(h.processor.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_coordinates_are_dropped() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));

        let report: LocationReport =
            serde_json::from_str(r#"{"id": "user-1", "lat": "abc", "lng": 0}"#).unwrap();
        let err = h.processor.process_checked(&report).await.unwrap_err();
        assert!(err.is_invalid_input());

        assert!(h.broadcaster.updates().is_empty());
        assert!(h.processor.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_leaves_state_untouched() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));
        h.processor.process(&inside()).await;
        let before = h.snapshot("1");

        h.directory.fail(true);
        let outcome = h.processor.process(&outside()).await;

        assert_eq!(
            outcome,
            ProcessOutcome::Ignored {
                error_code: "PERSISTENCE_ERROR".into()
            }
        );
        assert_eq!(h.snapshot("1").last_position, before.last_position);
        assert!(h.snapshot("1").exit_notifier.is_none());
        assert_eq!(h.broadcaster.updates().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_failure_keeps_timer_cadence() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));
        h.messenger.set_succeed(false);

        h.processor.process(&outside()).await;
        settle().await;
        let generation = h.snapshot("1").exit_notifier;

        tokio::time::sleep(Duration::from_millis(60_001)).await;
        settle().await;

        assert_eq!(h.messenger.kinds_sent(), vec!["left", "still"]);
        assert_eq!(h.snapshot("1").exit_notifier, generation);
        assert!(h.audit.records().iter().all(|r| !r.delivered));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_timers() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));

        h.processor.process(&outside()).await;
        settle().await;
        h.processor.shutdown();

        assert!(h.snapshot("1").exit_notifier.is_none());
        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(h.messenger.kinds_sent(), vec!["left"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subjects_are_tracked_independently() {
        let h = Harness::new(EngineSettings::default());
        h.directory.add("1", "user-1", Some(zone(true, 100.0)));
        h.directory.add("3", "user-3", Some(zone(true, 100.0)));

        let (first, second) = (outside(), LocationReport::new("user-3", 0.0, 0.0));
        let (a, b) = tokio::join!(
            h.processor.process(&first),
            h.processor.process(&second)
        );
        settle().await;

        assert!(matches!(a, ProcessOutcome::Evaluated { inside_zone: false, .. }));
        assert!(matches!(b, ProcessOutcome::Evaluated { inside_zone: true, .. }));
        assert!(h.snapshot("1").exit_notifier.is_some());
        assert!(h.snapshot("3").exit_notifier.is_none());
        assert_eq!(h.processor.store().len(), 2);
    }
}
