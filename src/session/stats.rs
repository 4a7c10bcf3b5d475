//! Running statistics and the final summary

use crate::trial::Side;
use std::fmt;
use std::time::{Duration, Instant};

/// Counters accumulated over one training session
#[derive(Debug, Clone)]
pub struct SessionStats {
    start_time: Instant,
    total_trials: u64,
    correct_trials: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_trials: 0,
            correct_trials: 0,
        }
    }

    /// Score one trial, returning whether the observed side was expected
    pub fn record(&mut self, expected: Side, observed: Side) -> bool {
        self.total_trials += 1;
        let correct = expected == observed;
        if correct {
            self.correct_trials += 1;
        }
        correct
    }

    pub fn total_trials(&self) -> u64 {
        self.total_trials
    }

    pub fn correct_trials(&self) -> u64 {
        self.correct_trials
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Summarise the session as if `elapsed` had passed since the start
    pub fn summary_at(&self, elapsed: Duration) -> SessionSummary {
        if self.total_trials == 0 {
            return SessionSummary::NoData;
        }
        let trials = self.total_trials as f64;
        SessionSummary::Completed {
            trials: self.total_trials,
            correct: self.correct_trials,
            mean_reaction_secs: elapsed.as_secs_f64() / trials,
            accuracy_percent: self.correct_trials as f64 / trials * 100.0,
        }
    }

    /// Summarise the session up to now
    pub fn summary(&self) -> SessionSummary {
        self.summary_at(self.elapsed())
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Final report of a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSummary {
    /// Stopped before any trial was answered
    NoData,
    Completed {
        trials: u64,
        correct: u64,
        /// Wall time divided by trial count; includes prompt display time
        mean_reaction_secs: f64,
        accuracy_percent: f64,
    },
}

impl SessionSummary {
    pub fn has_data(&self) -> bool {
        matches!(self, SessionSummary::Completed { .. })
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionSummary::NoData => write!(f, "No trials recorded."),
            SessionSummary::Completed {
                mean_reaction_secs,
                accuracy_percent,
                ..
            } => write!(
                f,
                "Reaction time: {:?}\nValid percentage: {:?}",
                mean_reaction_secs, accuracy_percent
            ),
        }
    }
}
