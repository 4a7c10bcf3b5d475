//! Training session state machine
//!
//! A session moves `NotStarted -> Running -> Stopped`. While running it
//! shows a prompt, waits for a shift press through the bridge, and scores
//! the answer. The wait is the only suspension point and the only place a
//! stop request is observed; stopping never loses what was already scored.

mod display;
mod stats;

pub use display::{ConsoleDisplay, TrialDisplay};
pub use stats::{SessionStats, SessionSummary};

use crate::bridge::{BridgeError, KeyEventBridge, ListenerShutdown};
use crate::keyboard::{KeySource, ListenerError};
use crate::trial::TrialGenerator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Error type for session operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// `train` was called on a session that already ran
    #[error("training session already started")]
    AlreadyStarted,
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A stop was requested
    Cancelled,
    /// The key source went away
    Exhausted,
}

/// Lifecycle of a training session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Running,
    Stopped(StopReason),
}

/// Cloneable, thread-safe trigger for ending a session.
///
/// Intended for signal handlers. Only the first call has any effect.
#[derive(Debug, Clone)]
pub struct StopHandle {
    cancel: Arc<watch::Sender<bool>>,
    listener: ListenerShutdown,
    fired: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request cancellation and listener shutdown.
    ///
    /// Returns true if this call was the one that stopped the session.
    pub fn stop(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Cancel first so the session sees a cancellation, not a lost listener
        self.cancel.send_replace(true);
        self.listener.request();
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Repeated prompt/response/score cycles until stopped
pub struct TrainingSession<D: TrialDisplay> {
    bridge: KeyEventBridge,
    generator: TrialGenerator,
    display: D,
    state: SessionState,
    stop: StopHandle,
    cancel_rx: watch::Receiver<bool>,
}

impl<D: TrialDisplay> TrainingSession<D> {
    pub fn new(bridge: KeyEventBridge, generator: TrialGenerator, display: D) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let stop = StopHandle {
            cancel: Arc::new(cancel_tx),
            listener: bridge.shutdown_handle(),
            fired: Arc::new(AtomicBool::new(false)),
        };
        Self {
            bridge,
            generator,
            display,
            state: SessionState::NotStarted,
            stop,
            cancel_rx,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Same as calling `stop` on a [`StopHandle`]
    pub fn stop(&self) -> bool {
        self.stop.stop()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Run trials until stopped and return the final summary.
    ///
    /// `open` builds the key source on the listener thread. A source that
    /// fails to open is a startup error; a stop request is the normal way
    /// out and yields `Ok`. Starting and stopping the listener block the
    /// executor thread briefly, see [`KeyEventBridge::start`].
    pub async fn train<F, S>(&mut self, open: F) -> Result<SessionSummary, SessionError>
    where
        F: FnOnce() -> Result<S, ListenerError> + Send + 'static,
        S: KeySource + 'static,
    {
        if self.state != SessionState::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }

        self.bridge.start(open)?;
        self.state = SessionState::Running;
        let mut stats = SessionStats::new();
        let mut cancel_rx = self.cancel_rx.clone();

        let reason = loop {
            let trial = self.generator.next_trial();
            self.display.show_prompt(trial.character);

            let observed = tokio::select! {
                biased;
                _ = cancel_rx.wait_for(|cancelled| *cancelled) => None,
                side = self.bridge.next_side() => Some(side),
            };

            match observed {
                None => break StopReason::Cancelled,
                Some(Ok(side)) => {
                    let correct = stats.record(trial.expected, side);
                    self.display.show_outcome(correct);
                }
                Some(Err(BridgeError::Disconnected)) if *cancel_rx.borrow() => {
                    break StopReason::Cancelled;
                }
                Some(Err(BridgeError::Disconnected)) => break StopReason::Exhausted,
                Some(Err(e)) => {
                    self.bridge.stop();
                    self.state = SessionState::Stopped(StopReason::Exhausted);
                    return Err(e.into());
                }
            }
        };

        self.bridge.stop();
        self.state = SessionState::Stopped(reason);
        let summary = stats.summary();
        log::info!(
            "session stopped ({:?}) after {} trial(s), {} correct",
            reason,
            stats.total_trials(),
            stats.correct_trials()
        );
        Ok(summary)
    }
}
