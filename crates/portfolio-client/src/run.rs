//! Run tokens and the per-run state machine
//!
//! Every submission takes a fresh [`RunToken`]. Only the latest token may move
//! the shared state or publish a result, so a slow run that finishes after a
//! newer one started is dropped without touching what is displayed.

use crate::adapter::AnalysisResult;
use crate::error::AnalysisError;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Monotonic identifier of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RunToken(u64);

impl RunToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a run ended in [`RunState::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    DateRangeMismatch,
    ServiceError,
}

impl From<&AnalysisError> for FailureKind {
    fn from(err: &AnalysisError) -> Self {
        match err {
            AnalysisError::DateRangeMismatch { .. } => Self::DateRangeMismatch,
            AnalysisError::ServiceError(_) => Self::ServiceError,
        }
    }
}

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Validating,
    Requesting,
    Adapting,
    Ready,
    Failed(FailureKind),
}

impl RunState {
    /// Move to `next` if the transition is legal
    pub fn advance(self, next: RunState) -> Option<RunState> {
        use RunState::{Adapting, Failed, Idle, Ready, Requesting, Validating};

        match (self, next) {
            (Idle, Validating)
            | (Validating, Idle | Requesting)
            | (Requesting, Adapting | Failed(_))
            | (Adapting, Ready) => Some(next),
            _ => None,
        }
    }

    /// `Ready` and `Failed` end a run
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed(_))
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Validating => f.write_str("validating"),
            Self::Requesting => f.write_str("requesting"),
            Self::Adapting => f.write_str("adapting"),
            Self::Ready => f.write_str("ready"),
            Self::Failed(FailureKind::DateRangeMismatch) => f.write_str("failed (date range)"),
            Self::Failed(FailureKind::ServiceError) => f.write_str("failed (service)"),
        }
    }
}

/// A token that lost to a newer run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stale {
    pub token: RunToken,
    pub latest: RunToken,
}

#[derive(Debug, Default)]
struct RunInner {
    latest: u64,
    state: RunState,
    current: Option<Arc<AnalysisResult>>,
}

/// Shared record of the latest run and the displayed result
#[derive(Debug, Default)]
pub struct RunContext {
    inner: RwLock<RunInner>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run; it enters `Validating` and supersedes any older run
    pub fn begin(&self) -> RunToken {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.latest += 1;
        inner.state = RunState::Idle
            .advance(RunState::Validating)
            .unwrap_or(RunState::Validating);
        debug!(run = inner.latest, "run started");
        RunToken(inner.latest)
    }

    /// Advance the state of `token`'s run
    ///
    /// Returns the token that superseded it when `token` is stale. An illegal
    /// transition leaves the state unchanged.
    pub fn transition(&self, token: RunToken, next: RunState) -> Result<RunState, Stale> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        Self::check_latest(&inner, token)?;

        match inner.state.advance(next) {
            Some(state) => {
                debug!(run = token.0, from = %inner.state, to = %state, "run state changed");
                inner.state = state;
            }
            None => debug!(run = token.0, from = %inner.state, to = %next, "illegal run transition ignored"),
        }
        Ok(inner.state)
    }

    /// Publish `result` as the displayed result and mark the run `Ready`
    pub fn commit(&self, token: RunToken, result: AnalysisResult) -> Result<Arc<AnalysisResult>, Stale> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        Self::check_latest(&inner, token)?;

        let result = Arc::new(result);
        inner.current = Some(Arc::clone(&result));
        inner.state = inner.state.advance(RunState::Ready).unwrap_or(RunState::Ready);
        Ok(result)
    }

    /// Mark the run failed; the displayed result is kept
    pub fn fail(&self, token: RunToken, err: &AnalysisError) -> Result<RunState, Stale> {
        self.transition(token, RunState::Failed(FailureKind::from(err)))
    }

    pub fn latest(&self) -> RunToken {
        RunToken(self.read().latest)
    }

    pub fn is_latest(&self, token: RunToken) -> bool {
        self.read().latest == token.0
    }

    /// State of the latest run
    pub fn state(&self) -> RunState {
        self.read().state
    }

    /// Currently displayed result, if any run has completed
    pub fn snapshot(&self) -> Option<Arc<AnalysisResult>> {
        self.read().current.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RunInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_latest(inner: &RunInner, token: RunToken) -> Result<(), Stale> {
        if inner.latest == token.0 {
            Ok(())
        } else {
            debug!(run = token.0, latest = inner.latest, "discarding superseded run");
            Err(Stale {
                token,
                latest: RunToken(inner.latest),
            })
        }
    }
}
