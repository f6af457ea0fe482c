//! Owns the engine's three background activities:
//!
//! - the ingestion timer (fetch, commit, cascade)
//! - the reaper timer (stale shared stories)
//! - the RefreshStories listener
//!
//! They run as independent tasks and may interleave freely on the store.
//! Only the scheduler starts and stops them, and only it may switch off
//! ingestion after repeated feed failures.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use newswatch_common::Config;

use crate::ingestion::IngestionPipeline;
use crate::reaper::Reaper;
use crate::refresh::{ProfileRefresher, RefreshMessage, RefreshReceiver};

/// Shortest timer period the scheduler will run with. A zero period from
/// configuration is raised to this.
pub const MIN_TIMER_PERIOD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub ingest_interval: Duration,
    pub ingest_on_start: bool,
    pub reaper_interval: Duration,
    pub max_consecutive_feed_failures: u32,
}

impl ScheduleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ingest_interval: config.ingest_interval.max(MIN_TIMER_PERIOD),
            ingest_on_start: config.ingest_on_start,
            reaper_interval: config.reaper_interval.max(MIN_TIMER_PERIOD),
            max_consecutive_feed_failures: config.max_consecutive_feed_failures.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineHealth {
    Running,
    /// Ingestion timer switched off. Needs an operator to restart the engine.
    IngestionDisabled {
        consecutive_failures: u32,
        last_error: String,
    },
    /// The ingestion task itself died. Same operator action as above.
    IngestionCrashed { reason: String },
}

impl EngineHealth {
    pub fn is_running(&self) -> bool {
        matches!(self, EngineHealth::Running)
    }
}

pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    health: watch::Receiver<EngineHealth>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn start(
        settings: ScheduleSettings,
        pipeline: Arc<IngestionPipeline>,
        reaper: Arc<Reaper>,
        refresher: Arc<ProfileRefresher>,
        refresh_rx: RefreshReceiver,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (health_tx, health) = watch::channel(EngineHealth::Running);

        info!(
            ingest_interval_secs = settings.ingest_interval.as_secs(),
            reaper_interval_secs = settings.reaper_interval.as_secs(),
            "Scheduler starting"
        );

        let tasks = vec![
            (
                "ingestion",
                tokio::spawn(supervise_ingestion(settings, pipeline, shutdown_rx.clone(), health_tx)),
            ),
            (
                "reaper",
                tokio::spawn(reaper_loop(settings.reaper_interval, reaper, shutdown_rx.clone())),
            ),
            (
                "refresh",
                tokio::spawn(refresh_loop(refresher, refresh_rx, shutdown_rx)),
            ),
        ];

        Self {
            shutdown,
            health,
            tasks,
        }
    }

    /// Watch for the fatal ingestion condition.
    pub fn health(&self) -> watch::Receiver<EngineHealth> {
        self.health.clone()
    }

    /// Signal every activity to stop and wait for them. An in-flight cycle
    /// is abandoned at its next await point.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                warn!(activity = name, error = %e, "Scheduler activity ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }
}

/// Runs the ingestion loop in its own task. Whatever ends it abnormally,
/// a panic included, is published on the health watch.
async fn supervise_ingestion(
    settings: ScheduleSettings,
    pipeline: Arc<IngestionPipeline>,
    shutdown: watch::Receiver<bool>,
    health: watch::Sender<EngineHealth>,
) {
    let outcome = tokio::spawn(ingestion_loop(settings, pipeline, shutdown)).await;
    match outcome {
        Ok(None) => {}
        Ok(Some(disabled)) => {
            let _ = health.send(disabled);
        }
        Err(e) => {
            error!(error = %e, "Ingestion task ended abnormally, operator intervention required");
            let _ = health.send(EngineHealth::IngestionCrashed { reason: e.to_string() });
        }
    }
}

/// Returns the fatal health state if ingestion had to be switched off,
/// `None` on shutdown.
async fn ingestion_loop(
    settings: ScheduleSettings,
    pipeline: Arc<IngestionPipeline>,
    mut shutdown: watch::Receiver<bool>,
) -> Option<EngineHealth> {
    let period = settings.ingest_interval;
    let first = if settings.ingest_on_start {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut timer = tokio::time::interval_at(first, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut consecutive_failures = 0u32;
    let mut disabled = None;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = timer.tick() => {}
        }

        let result = tokio::select! {
            _ = shutdown.changed() => break,
            result = pipeline.run_cycle() => result,
        };

        match result {
            Ok(report) => {
                consecutive_failures = 0;
                info!(
                    stories = report.stories,
                    duplicates_dropped = report.duplicates_dropped,
                    cascade = %report.cascade,
                    "Ingestion cycle complete"
                );
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(
                    error = %e,
                    transient = e.is_transient(),
                    consecutive_failures,
                    "Ingestion cycle aborted; story set unchanged"
                );
                if consecutive_failures >= settings.max_consecutive_feed_failures {
                    error!(
                        consecutive_failures,
                        error = %e,
                        "Disabling feed ingestion: too many consecutive failures, operator intervention required"
                    );
                    disabled = Some(EngineHealth::IngestionDisabled {
                        consecutive_failures,
                        last_error: e.to_string(),
                    });
                    break;
                }
            }
        }
    }

    info!("Ingestion timer stopped");
    disabled
}

async fn reaper_loop(period: Duration, reaper: Arc<Reaper>, mut shutdown: watch::Receiver<bool>) {
    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = timer.tick() => {}
        }
        if let Err(e) = reaper.sweep(Utc::now()).await {
            warn!(error = %e, "Reaper: could not list shared stories, skipping sweep");
        }
    }

    info!("Reaper timer stopped");
}

async fn refresh_loop(
    refresher: Arc<ProfileRefresher>,
    mut inbox: RefreshReceiver,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let message = tokio::select! {
            _ = shutdown.changed() => break,
            message = inbox.recv() => message,
        };
        let Some(RefreshMessage::RefreshStories(profile)) = message else {
            break;
        };

        let profile_id = profile.doc.id.clone();
        match refresher.refresh(profile).await {
            Ok(_) => info!(profile_id = profile_id.as_str(), "Refreshed stories for profile"),
            Err(e) => warn!(profile_id = profile_id.as_str(), error = %e, "Refresh write failed, not retried"),
        }
    }

    info!("Refresh listener stopped");
}
