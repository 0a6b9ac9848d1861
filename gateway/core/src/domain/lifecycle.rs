// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lifecycle
//!
//! Per-request detection state machine:
//!
//! ```text
//! Pending → Dispatched → { Completed, TimedOut, Failed }
//! ```
//!
//! `Completed`, `TimedOut` and `Failed` are terminal. Cancellation is a
//! `Failed` transition reported with `DetectionStatus::Canceled`.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements the detection lifecycle

use serde::{Deserialize, Serialize};

use crate::domain::detection::DetectionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionState {
    Pending,
    Dispatched,
    Completed,
    TimedOut,
    Failed,
}

impl DetectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DetectionState::Completed | DetectionState::TimedOut | DetectionState::Failed
        )
    }

    pub fn can_transition_to(&self, next: DetectionState) -> bool {
        matches!(
            (self, next),
            (DetectionState::Pending, DetectionState::Dispatched)
                | (DetectionState::Dispatched, DetectionState::Completed)
                | (DetectionState::Dispatched, DetectionState::TimedOut)
                | (DetectionState::Dispatched, DetectionState::Failed)
        )
    }

    /// Terminal state a result status is reached through.
    pub fn for_status(status: DetectionStatus) -> DetectionState {
        match status {
            DetectionStatus::Ok => DetectionState::Completed,
            DetectionStatus::Timeout => DetectionState::TimedOut,
            DetectionStatus::DetectorError
            | DetectionStatus::InvalidRequest
            | DetectionStatus::Canceled => DetectionState::Failed,
        }
    }
}

impl std::fmt::Display for DetectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DetectionState::Pending => "pending",
            DetectionState::Dispatched => "dispatched",
            DetectionState::Completed => "completed",
            DetectionState::TimedOut => "timed_out",
            DetectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: DetectionState,
        to: DetectionState,
    },
}

/// Tracks one request through the state machine.
#[derive(Debug)]
pub struct DetectionLifecycle {
    state: DetectionState,
}

impl DetectionLifecycle {
    pub fn new() -> Self {
        Self {
            state: DetectionState::Pending,
        }
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn transition(&mut self, next: DetectionState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

impl Default for DetectionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
