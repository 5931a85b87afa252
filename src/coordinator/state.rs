//! Per-target run state published by the coordinator
//!
//! Observers get a `watch` channel over the whole board. Every change
//! replaces one target's entry in a single send, so a snapshot never
//! contains a half-updated target.

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::watch;

use crate::target::{Target, TargetId};

/// Lifecycle of a target's automation job
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Cancelling,
    Finished {
        completed: bool,
    },
    Error {
        message: String,
    },
}

impl RunState {
    /// Whether a job for this state may still change it
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Cancelling)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Cancelling => write!(f, "cancelling"),
            Self::Finished { completed: true } => write!(f, "finished"),
            Self::Finished { completed: false } => write!(f, "cancelled"),
            Self::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// Published status of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStatus {
    pub target_id: TargetId,
    pub target_name: String,
    /// Index of the step being executed, once the first step began
    pub current_index: Option<usize>,
    pub run_state: RunState,
}

pub type StatusMap = BTreeMap<TargetId, TargetStatus>;

/// Single writer of the status map
#[derive(Debug)]
pub struct StatusBoard {
    tx: watch::Sender<StatusMap>,
}

impl StatusBoard {
    /// Board with every target idle
    pub fn new<'a>(targets: impl IntoIterator<Item = &'a Target>) -> Self {
        let map = targets
            .into_iter()
            .map(|t| {
                (
                    t.id,
                    TargetStatus {
                        target_id: t.id,
                        target_name: t.name.clone(),
                        current_index: None,
                        run_state: RunState::Idle,
                    },
                )
            })
            .collect();
        let (tx, _rx) = watch::channel(map);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusMap> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> StatusMap {
        self.tx.borrow().clone()
    }

    pub fn get(&self, id: TargetId) -> Option<TargetStatus> {
        self.tx.borrow().get(&id).cloned()
    }

    /// Replace the target's entry with one derived from the current entry
    fn replace(&self, id: TargetId, f: impl FnOnce(&TargetStatus) -> TargetStatus) {
        self.tx.send_if_modified(|map| match map.get(&id) {
            Some(current) => {
                let next = f(current);
                if &next == current {
                    return false;
                }
                map.insert(id, next);
                true
            }
            None => false,
        });
    }

    /// Enter a new state; starting to run clears the step index
    pub fn set_state(&self, id: TargetId, run_state: RunState) {
        tracing::debug!(target_id = %id, state = %run_state, "Run state changed");
        self.replace(id, |current| TargetStatus {
            current_index: if run_state == RunState::Running {
                None
            } else {
                current.current_index
            },
            run_state,
            ..current.clone()
        });
    }

    pub fn set_index(&self, id: TargetId, index: usize) {
        self.replace(id, |current| TargetStatus {
            current_index: Some(index),
            ..current.clone()
        });
    }
}
