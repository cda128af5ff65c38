//! Decision loop
//!
//! Composes the sensor mailbox, state mapping, debounce gate, playback
//! controller and transition logger. The loop is the only place where the
//! confirmed state lives; every other component reacts to it.
//!
//! On a confirmed transition the loop first interrupts playback (when the
//! outgoing state could have been playing), then drains pending playback
//! events so tracks started for the outgoing interval are attributed to it,
//! and only then closes the interval in the log.

use crate::debounce::DebounceGate;
use crate::logger::{TransitionLogger, TransitionRecord};
use crate::playback::{PlaybackController, PlaybackEvent};
use crate::sensor::{RawCode, SensorHandle, SensorLink};
use crate::state::{self, CategoryAssignment, SemanticState};
use perchbox_common::time;
use std::future::Future;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Decision loop timing
#[derive(Debug, Clone, Copy)]
pub struct ApparatusSettings {
    /// Dwell before playback is authorized
    pub threshold: Duration,
    /// Re-evaluation period without new sensor data
    pub loop_tick: Duration,
    /// Keep every closed record in [`RunSummary::records`]
    pub keep_records: bool,
}

impl Default for ApparatusSettings {
    fn default() -> Self {
        Self {
            threshold: Duration::from_millis(300),
            loop_tick: Duration::from_millis(10),
            keep_records: false,
        }
    }
}

/// What happened during a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Confirmed state changes, including the first observation
    pub transitions: usize,
    /// Playback authorizations issued
    pub authorizations: usize,
    /// Tracks that started playing
    pub tracks_started: usize,
    /// Records written to the log
    pub records_written: usize,
    /// Written records in order, only with [`ApparatusSettings::keep_records`]
    pub records: Vec<TransitionRecord>,
}

/// The running apparatus
pub struct Apparatus<S: SensorLink, W: Write> {
    sensor: SensorHandle<S>,
    readings: watch::Receiver<Option<RawCode>>,
    assignment: CategoryAssignment,
    gate: DebounceGate,
    playback: PlaybackController,
    events: mpsc::UnboundedReceiver<PlaybackEvent>,
    logger: TransitionLogger<W>,
    settings: ApparatusSettings,
    summary: RunSummary,
}

impl<S: SensorLink, W: Write> Apparatus<S, W> {
    pub fn new(
        sensor: SensorHandle<S>,
        readings: watch::Receiver<Option<RawCode>>,
        assignment: CategoryAssignment,
        playback: PlaybackController,
        events: mpsc::UnboundedReceiver<PlaybackEvent>,
        logger: TransitionLogger<W>,
        settings: ApparatusSettings,
    ) -> Self {
        Self {
            sensor,
            readings,
            assignment,
            gate: DebounceGate::new(settings.threshold),
            playback,
            events,
            logger,
            settings,
            summary: RunSummary::default(),
        }
    }

    /// Run until `shutdown` completes, then shut down in order
    ///
    /// Shutdown: stop the sensor, stop playback, close the final interval,
    /// release the sensor, flush the log. Every step runs; failures are
    /// logged.
    pub async fn run<F>(mut self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut tick = tokio::time::interval(self.settings.loop_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sensor_alive = true;
        let mut playback_alive = true;

        info!(
            "Apparatus running (threshold {} ms)",
            self.settings.threshold.as_millis()
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }

                changed = self.readings.changed(), if sensor_alive => {
                    if changed.is_err() {
                        warn!("Sensor thread ended; holding last known state");
                        sensor_alive = false;
                    } else {
                        self.evaluate().await;
                    }
                }

                event = self.events.recv(), if playback_alive => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            warn!("Playback worker ended");
                            playback_alive = false;
                        }
                    }
                }

                _ = tick.tick() => {
                    self.evaluate().await;
                }
            }
        }

        self.shutdown().await
    }

    /// Feed the latest sensor code through mapping and the gate
    async fn evaluate(&mut self) {
        let Some(code) = self.readings.borrow_and_update().clone() else {
            return;
        };
        let state = state::map(&code, &self.assignment);
        self.step(state, Instant::now()).await;
    }

    async fn step(&mut self, state: SemanticState, now: Instant) {
        let output = self.gate.observe(state, now);

        if let Some(transition) = output.transition {
            let at = time::now();
            self.summary.transitions += 1;
            match transition.from {
                Some(from) => info!("Perch state {} -> {}", from, transition.to),
                None => info!("Initial perch state {}", transition.to),
            }

            if transition.from.is_some_and(SemanticState::is_playable) {
                if let Err(e) = self.playback.interrupt().await {
                    warn!("Interrupt failed: {}", e);
                }
                self.drain_events();
            }

            match self.logger.transition(transition.to, at) {
                Ok(Some(record)) => self.record_written(record),
                Ok(None) => {}
                Err(e) => error!("Failed to write transition record: {}", e),
            }
        }

        if let Some(category) = output.authorize {
            let Some(interval) = self.logger.current_interval() else {
                return;
            };
            info!(
                "Dwell of {} ms reached, authorizing category {:?}",
                self.settings.threshold.as_millis(),
                category
            );
            self.summary.authorizations += 1;
            if let Err(e) = self.playback.authorize(category, interval) {
                error!("Failed to authorize playback: {}", e);
            }
        }
    }

    fn handle_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::TrackStarted {
                interval, track, ..
            } => {
                if self.logger.append_track(interval, &track) {
                    self.summary.tracks_started += 1;
                }
            }
            PlaybackEvent::TrackSkipped { track, .. } => debug!("Track {} skipped", track),
            PlaybackEvent::TrackFinished { track, .. } => debug!("Track {} finished", track),
            PlaybackEvent::PhaseChanged(phase) => debug!("Playback phase {}", phase),
        }
    }

    fn record_written(&mut self, record: TransitionRecord) {
        self.summary.records_written += 1;
        if self.settings.keep_records {
            self.summary.records.push(record);
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
    }

    async fn shutdown(mut self) -> RunSummary {
        self.sensor.request_stop();

        if let Err(e) = self.playback.shutdown().await {
            error!("Playback shutdown: {}", e);
        }
        self.drain_events();

        match self.logger.close(time::now()) {
            Ok(Some(record)) => self.record_written(record),
            Ok(None) => {}
            Err(e) => error!("Failed to write final record: {}", e),
        }

        let sensor = self.sensor;
        match tokio::task::spawn_blocking(move || sensor.join()).await {
            Ok(Ok(link)) => {
                drop(link);
                debug!("Sensor released");
            }
            Ok(Err(e)) => error!("Sensor shutdown: {}", e),
            Err(e) => error!("Failed to join sensor thread: {}", e),
        }

        if let Err(e) = self.logger.flush() {
            error!("Failed to flush transition log: {}", e);
        }

        info!(
            "Run finished: {} transitions, {} records, {} authorizations, {} tracks",
            self.summary.transitions,
            self.summary.records_written,
            self.summary.authorizations,
            self.summary.tracks_started
        );
        self.summary
    }
}
