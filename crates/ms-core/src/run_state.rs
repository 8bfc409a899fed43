//! Run status reported to external supervisors.
//!
//! The scheduler itself never reads this state. A driver updates it while a
//! run progresses and any other thread may poll a [`RunStateHandle`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Lifecycle status of a model run or sub-run.
///
/// Variants are ordered: every status from [`ModelStatus::Done`] on is
/// final, every status from [`ModelStatus::Error`] on is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// Not started.
    Undefined = 0,
    /// Initialising.
    Init = 1,
    /// Running.
    Progress = 2,
    /// Waiting for more work from a supervisor.
    WaitProgress = 3,
    /// Shutting down.
    Shutdown = 4,
    /// Finished successfully.
    Done = 64,
    /// Exited before completion.
    Exit = 65,
    /// Failed.
    Error = 128,
}

impl ModelStatus {
    /// Returns `true` once the run can no longer change status.
    pub fn is_final(self) -> bool {
        self >= Self::Done
    }

    /// Returns `true` for a failed run.
    pub fn is_error(self) -> bool {
        self >= Self::Error
    }

    /// Returns `true` when shutting down or already final.
    pub fn is_shutdown_or_final(self) -> bool {
        self >= Self::Shutdown
    }

    /// Single-character code used when persisting status.
    ///
    /// A run that is shutting down still reports `p`; it only becomes `s`
    /// once it is done.
    pub fn code(self) -> Option<char> {
        match self {
            Self::Undefined => None,
            Self::Init => Some('i'),
            Self::Progress | Self::Shutdown => Some('p'),
            Self::WaitProgress => Some('w'),
            Self::Done => Some('s'),
            Self::Exit => Some('x'),
            Self::Error => Some('e'),
        }
    }

    /// Parse a status code produced by [`ModelStatus::code`].
    pub fn from_code(code: char) -> CoreResult<Self> {
        match code {
            'i' => Ok(Self::Init),
            'p' => Ok(Self::Progress),
            'w' => Ok(Self::WaitProgress),
            's' => Ok(Self::Done),
            'x' => Ok(Self::Exit),
            'e' => Ok(Self::Error),
            other => Err(CoreError::UnknownStatusCode(other)),
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::Init => "init",
            Self::Progress => "progress",
            Self::WaitProgress => "wait",
            Self::Shutdown => "shutdown",
            Self::Done => "done",
            Self::Exit => "exit",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Status, progress and timestamps of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Current status.
    pub status: ModelStatus,
    /// Progress counter, typically completed cases or events.
    pub progress_count: i64,
    /// Progress value, typically the simulation clock.
    pub progress_value: f64,
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// When status or progress last changed.
    pub update_time: DateTime<Utc>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    /// A fresh run in [`ModelStatus::Init`].
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            status: ModelStatus::Init,
            progress_count: 0,
            progress_value: 0.0,
            start_time: now,
            update_time: now,
        }
    }

    /// Change status unless the current status is already final.
    ///
    /// Returns the status in effect afterwards.
    pub fn set_status(&mut self, status: ModelStatus) -> ModelStatus {
        if !self.status.is_final() {
            self.status = status;
            self.update_time = Utc::now();
        }
        self.status
    }

    /// Record progress. A run still in [`ModelStatus::Init`] moves to
    /// [`ModelStatus::Progress`].
    pub fn update_progress(&mut self, count: i64, value: f64) {
        if self.status == ModelStatus::Init {
            self.status = ModelStatus::Progress;
        }
        self.progress_count = count;
        self.progress_value = value;
        self.update_time = Utc::now();
    }

    /// Wall-clock time since the run started.
    pub fn elapsed(&self) -> TimeDelta {
        self.update_time - self.start_time
    }
}

/// Shared, thread-safe access to a [`RunState`].
#[derive(Debug, Clone, Default)]
pub struct RunStateHandle(Arc<Mutex<RunState>>);

impl RunStateHandle {
    /// A handle to a fresh run state.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> RunState {
        self.lock().clone()
    }

    /// Current status.
    pub fn status(&self) -> ModelStatus {
        self.lock().status
    }

    /// See [`RunState::set_status`].
    pub fn set_status(&self, status: ModelStatus) -> ModelStatus {
        self.lock().set_status(status)
    }

    /// See [`RunState::update_progress`].
    pub fn update_progress(&self, count: i64, value: f64) {
        self.lock().update_progress(count, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ordering() {
        assert!(!ModelStatus::Progress.is_final());
        assert!(ModelStatus::Shutdown.is_shutdown_or_final());
        assert!(ModelStatus::Done.is_final());
        assert!(!ModelStatus::Exit.is_error());
        assert!(ModelStatus::Error.is_error());
    }

    #[test]
    fn codes_round_trip_except_shutdown() {
        for status in [
            ModelStatus::Init,
            ModelStatus::Progress,
            ModelStatus::WaitProgress,
            ModelStatus::Done,
            ModelStatus::Exit,
            ModelStatus::Error,
        ] {
            let code = status.code().unwrap();
            assert_eq!(ModelStatus::from_code(code).unwrap(), status);
        }
        assert_eq!(ModelStatus::Shutdown.code(), Some('p'));
        assert_eq!(ModelStatus::Undefined.code(), None);
        assert_eq!(
            ModelStatus::from_code('q'),
            Err(CoreError::UnknownStatusCode('q'))
        );
    }

    #[test]
    fn final_status_is_sticky() {
        let mut state = RunState::new();
        assert_eq!(state.set_status(ModelStatus::Error), ModelStatus::Error);
        assert_eq!(state.set_status(ModelStatus::Progress), ModelStatus::Error);
    }

    #[test]
    fn progress_leaves_init() {
        let mut state = RunState::new();
        state.update_progress(10, 2.5);
        assert_eq!(state.status, ModelStatus::Progress);
        assert_eq!(state.progress_count, 10);
        assert!(state.elapsed() >= TimeDelta::zero());
    }

    #[test]
    fn handle_is_shared_across_threads() {
        let handle = RunStateHandle::new();
        let worker = handle.clone();
        std::thread::spawn(move || {
            worker.update_progress(3, 1.0);
            worker.set_status(ModelStatus::Done);
        })
        .join()
        .unwrap();
        let snap = handle.snapshot();
        assert_eq!(snap.status, ModelStatus::Done);
        assert_eq!(snap.progress_count, 3);
    }
}
