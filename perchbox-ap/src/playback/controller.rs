//! Stimulus playback controller
//!
//! A dedicated worker thread owns the audio sink and both stimulus
//! libraries. The decision loop talks to it only through commands; the
//! worker answers with [`PlaybackEvent`]s. At most one track is ever
//! producing audio: a new track is only started after the previous one
//! finished naturally or was faded out.
//!
//! Phase changes:
//! - Idle -> Loading on authorization
//! - Loading -> Playing once a track is started
//! - Playing -> Idle on natural completion, then straight to Loading for the
//!   next track while the authorization stands
//! - Loading/Playing -> Interrupting -> Idle on interrupt

use super::events::{IntervalId, PlaybackCommand, PlaybackEvent, PlaybackPhase, PlaybackSettings};
use crate::audio::AudioSink;
use crate::error::{Error, Result};
use crate::library::{StimulusLibraries, TrackId};
use crate::state::Category;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc as async_mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

/// Handle to the playback worker
pub struct PlaybackController {
    commands: mpsc::Sender<PlaybackCommand>,
    phase: watch::Receiver<PlaybackPhase>,
    thread: Option<JoinHandle<()>>,
    settings: PlaybackSettings,
}

impl PlaybackController {
    /// Start the worker thread
    ///
    /// `make_sink` runs on the worker thread, so the sink itself need not be
    /// `Send`. Returns once the sink is ready; a sink that fails to open is
    /// returned as the error.
    pub fn spawn<S, F>(
        make_sink: F,
        libraries: StimulusLibraries,
        settings: PlaybackSettings,
    ) -> Result<(Self, async_mpsc::UnboundedReceiver<PlaybackEvent>)>
    where
        S: AudioSink + 'static,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = async_mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(PlaybackPhase::Idle);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);

        let thread = thread::Builder::new()
            .name("stimulus-playback".to_string())
            .spawn(move || {
                let sink = match make_sink() {
                    Ok(sink) => {
                        let _ = ready_tx.send(Ok(()));
                        sink
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let worker = Worker {
                    sink,
                    libraries,
                    settings,
                    events: event_tx,
                    phase_tx,
                    phase: PlaybackPhase::Idle,
                    session: None,
                };
                worker.run(command_rx);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                return Err(Error::Playback(
                    "playback worker exited during startup".to_string(),
                ))
            }
        }

        debug!("Playback worker ready");
        Ok((
            Self {
                commands: command_tx,
                phase: phase_rx,
                thread: Some(thread),
                settings,
            },
            event_rx,
        ))
    }

    /// Current worker phase
    pub fn phase(&self) -> PlaybackPhase {
        *self.phase.borrow()
    }

    /// Let `category` play; tracks started are attributed to `interval`
    pub fn authorize(&self, category: Category, interval: IntervalId) -> Result<()> {
        self.send(PlaybackCommand::Authorize { category, interval })
    }

    /// Fade out whatever is playing and wait until the sink is silent
    ///
    /// Waits at most `interrupt_timeout`.
    pub async fn interrupt(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(PlaybackCommand::Interrupt { ack })?;
        self.await_ack(done, "interrupt").await
    }

    /// Stop playback and end the worker thread
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        let (ack, done) = oneshot::channel();
        self.send(PlaybackCommand::Shutdown { ack })?;
        let acked = self.await_ack(done, "shutdown").await;

        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => debug!("Playback worker joined"),
            Ok(Err(_)) => error!("Playback worker panicked"),
            Err(e) => error!("Failed to join playback worker: {}", e),
        }
        acked
    }

    fn send(&self, command: PlaybackCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::Playback("playback worker is not running".to_string()))
    }

    async fn await_ack(&self, done: oneshot::Receiver<()>, what: &str) -> Result<()> {
        match tokio::time::timeout(self.settings.interrupt_timeout, done).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::Playback(format!(
                "playback worker dropped {} acknowledgement",
                what
            ))),
            Err(_) => Err(Error::Playback(format!(
                "{} not acknowledged within {:?}",
                what, self.settings.interrupt_timeout
            ))),
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if self.thread.is_some() {
            // Worker exits on its own once the command channel disconnects
            debug!("Playback controller dropped without shutdown");
        }
    }
}

/// Standing authorization
struct Session {
    category: Category,
    interval: IntervalId,
    current: Option<TrackId>,
}

struct Worker<S: AudioSink> {
    sink: S,
    libraries: StimulusLibraries,
    settings: PlaybackSettings,
    events: async_mpsc::UnboundedSender<PlaybackEvent>,
    phase_tx: watch::Sender<PlaybackPhase>,
    phase: PlaybackPhase,
    session: Option<Session>,
}

impl<S: AudioSink> Worker<S> {
    fn run(mut self, commands: mpsc::Receiver<PlaybackCommand>) {
        debug!("Playback worker started");
        loop {
            match commands.recv_timeout(self.settings.poll_interval) {
                Ok(PlaybackCommand::Authorize { category, interval }) => {
                    self.authorize(category, interval);
                }
                Ok(PlaybackCommand::Interrupt { ack }) => {
                    self.interrupt();
                    let _ = ack.send(());
                }
                Ok(PlaybackCommand::Shutdown { ack }) => {
                    self.interrupt();
                    let _ = ack.send(());
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.interrupt();
                    break;
                }
            }
            self.check_completion();
        }
        debug!("Playback worker stopped");
    }

    fn set_phase(&mut self, phase: PlaybackPhase) {
        if self.phase == phase {
            return;
        }
        debug!("Playback phase {} -> {}", self.phase, phase);
        self.phase = phase;
        self.phase_tx.send_replace(phase);
        self.emit(PlaybackEvent::PhaseChanged(phase));
    }

    fn emit(&self, event: PlaybackEvent) {
        if self.events.send(event).is_err() {
            debug!("Playback event receiver closed");
        }
    }

    fn authorize(&mut self, category: Category, interval: IntervalId) {
        if let Some(session) = &self.session {
            if session.category == category && session.interval == interval {
                debug!("Category {:?} already authorized for interval {}", category, interval);
                return;
            }
            self.interrupt();
        }

        info!("Playback authorized for category {:?} (interval {})", category, interval);
        self.session = Some(Session {
            category,
            interval,
            current: None,
        });
        self.start_next();
    }

    /// Start the next track of the standing session, skipping failures
    fn start_next(&mut self) {
        let Some((category, interval)) = self.session.as_ref().map(|s| (s.category, s.interval))
        else {
            return;
        };

        let attempts = self.libraries.get(category).len();
        if attempts == 0 {
            warn!("No tracks available for category {:?}", category);
            self.session = None;
            self.set_phase(PlaybackPhase::Idle);
            return;
        }

        for _ in 0..attempts {
            let library = self.libraries.get_mut(category);
            let Some(track) = library.next() else {
                break;
            };
            library.mark_played(&track);
            let path = library.path_of(&track);

            self.set_phase(PlaybackPhase::Loading);
            match self.load_and_play(&path) {
                Ok(()) => {
                    info!("Playing {} ({:?})", track, category);
                    if let Some(session) = self.session.as_mut() {
                        session.current = Some(track.clone());
                    }
                    self.set_phase(PlaybackPhase::Playing);
                    self.emit(PlaybackEvent::TrackStarted {
                        interval,
                        category,
                        track,
                    });
                    return;
                }
                Err(e) => {
                    warn!("Skipping track {}: {}", path.display(), e);
                    self.sink.stop();
                    self.emit(PlaybackEvent::TrackSkipped {
                        category,
                        track,
                        reason: e.to_string(),
                    });
                }
            }
        }

        error!(
            "Every track of category {:?} failed to play; waiting for the next authorization",
            category
        );
        self.session = None;
        self.set_phase(PlaybackPhase::Idle);
    }

    fn load_and_play(&mut self, path: &Path) -> Result<()> {
        self.sink.load(path)?;
        self.sink.play()
    }

    fn check_completion(&mut self) {
        if self.phase != PlaybackPhase::Playing || self.sink.is_playing() {
            return;
        }

        if let Some(session) = self.session.as_mut() {
            if let Some(track) = session.current.take() {
                debug!("Finished {}", track);
                let event = PlaybackEvent::TrackFinished {
                    interval: session.interval,
                    category: session.category,
                    track,
                };
                self.emit(event);
            }
        }
        self.set_phase(PlaybackPhase::Idle);
        self.start_next();
    }

    fn interrupt(&mut self) {
        let was_active = matches!(self.phase, PlaybackPhase::Loading | PlaybackPhase::Playing);
        self.session = None;
        if !was_active {
            return;
        }

        self.set_phase(PlaybackPhase::Interrupting);
        if let Err(e) = self.sink.fade_out(self.settings.fade_out) {
            warn!("Fade-out failed, stopping immediately: {}", e);
        }
        self.sink.stop();
        self.set_phase(PlaybackPhase::Idle);
    }
}
