use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::error::{ProvisionError, ProvisionErrorKind, StartError};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobState {
    Idle = 0,
    Validating = 1,
    Downloading = 2,
    Extracting = 3,
    Persisting = 4,
    Succeeded = 5,
    Failed = 6,
}

impl JobState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Validating,
            2 => Self::Downloading,
            3 => Self::Extracting,
            4 => Self::Persisting,
            5 => Self::Succeeded,
            6 => Self::Failed,
            _ => Self::Idle,
        }
    }

    /// States from which a new run may begin.
    pub fn accepts_start(self) -> bool {
        matches!(self, Self::Idle | Self::Succeeded | Self::Failed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn is_active(self) -> bool {
        !self.accepts_start()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a poller sees on each tick.
#[derive(Clone, Debug, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    /// Share of the current stage done, in `[0, 1]`.
    pub progress: f32,
    pub error_message: Option<String>,
    pub error_kind: Option<ProvisionErrorKind>,
}

#[derive(Clone, Debug)]
struct Failure {
    message: String,
    kind: ProvisionErrorKind,
}

/// Lock-free job state shared between the worker and pollers.
///
/// The failure is the only guarded field. It is written under its lock before the state
/// turns `Failed`, so a poller that sees `Failed` also sees the message.
#[derive(Debug)]
pub(crate) struct JobCell {
    state: AtomicU8,
    progress: AtomicU32,
    failure: Mutex<Option<Failure>>,
}

impl Default for JobCell {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(JobState::Idle as u8),
            progress: AtomicU32::new(0f32.to_bits()),
            failure: Mutex::new(None),
        }
    }
}

impl JobCell {
    pub(crate) fn state(&self) -> JobState {
        JobState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `Validating` if no run is active. Clears the previous result.
    pub(crate) fn try_begin(&self) -> Result<(), StartError> {
        let mut failure = self.lock_failure();
        let current = self.state();
        if !current.accepts_start() {
            return Err(StartError::Busy { state: current });
        }
        self.state
            .compare_exchange(
                current as u8,
                JobState::Validating as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|actual| StartError::Busy {
                state: JobState::from_u8(actual),
            })?;
        *failure = None;
        self.set_progress(0.0);
        Ok(())
    }

    /// Enter a working stage with its progress reset.
    pub(crate) fn enter(&self, state: JobState) {
        self.set_progress(0.0);
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn set_progress(&self, fraction: f32) {
        let clamped = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.progress.store(clamped.to_bits(), Ordering::Release);
    }

    pub(crate) fn succeed(&self) {
        self.set_progress(1.0);
        self.state.store(JobState::Succeeded as u8, Ordering::Release);
    }

    pub(crate) fn fail(&self, error: &ProvisionError) {
        *self.lock_failure() = Some(Failure::from(error));
        self.state.store(JobState::Failed as u8, Ordering::Release);
    }

    /// Fail only if the job is still in `expected`. Returns `false`, leaving the job
    /// untouched, when it has moved on since `expected` was observed.
    pub(crate) fn fail_if(&self, expected: JobState, error: &ProvisionError) -> bool {
        let mut failure = self.lock_failure();
        let swapped = self
            .state
            .compare_exchange(
                expected as u8,
                JobState::Failed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if swapped {
            *failure = Some(Failure::from(error));
        }
        swapped
    }

    pub(crate) fn snapshot(&self) -> JobStatus {
        let state = self.state();
        let failure = self.lock_failure().clone();
        JobStatus {
            state,
            progress: f32::from_bits(self.progress.load(Ordering::Acquire)),
            error_message: failure.as_ref().map(|f| f.message.clone()),
            error_kind: failure.map(|f| f.kind),
        }
    }

    fn lock_failure(&self) -> std::sync::MutexGuard<'_, Option<Failure>> {
        self.failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl From<&ProvisionError> for Failure {
    fn from(error: &ProvisionError) -> Self {
        Self {
            message: error.to_string(),
            kind: error.kind(),
        }
    }
}
