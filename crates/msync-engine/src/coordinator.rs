//! Run coordination.
//!
//! Each direction is `Idle` or `Running`. A trigger that arrives while its
//! direction is running, or within the cooldown after that direction last
//! completed, is dropped rather than queued, so a burst of triggers collapses
//! into at most one run.
//!
//! Forward and reverse runs additionally share one lock, so they never touch
//! the same record's hash and revision state at the same time.
//!
//! ```text
//!  triggers (mpsc) ──► SyncCoordinator::run_until_closed
//!                          │
//!                          ├─ claim direction (Idle, cooled down) else Debounced
//!                          ├─ acquire shared run lock
//!                          └─ ReconciliationEngine::run(direction)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info};

use msync_core::error::SyncError;
use msync_core::traits::{MirrorSystem, SourceSystem};
use msync_core::types::Direction;

use crate::engine::ReconciliationEngine;
use crate::report::PassReport;
use crate::trigger::Trigger;

/// State of one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionState {
    /// No run in flight.
    Idle {
        /// When the last run finished, if any since start.
        last_completed: Option<Instant>,
    },
    /// A run is in flight.
    Running,
}

/// Why a trigger did not start a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceReason {
    /// The direction is already running.
    Running,
    /// The direction completed too recently.
    CoolingDown {
        /// Time left in the cooldown window.
        remaining: Duration,
    },
}

/// What a trigger led to.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// A run happened and produced a report.
    Completed(PassReport),
    /// A run happened but aborted at pass level.
    Aborted(SyncError),
    /// No run happened.
    Debounced(DebounceReason),
}

impl TriggerOutcome {
    /// Check if the trigger was coalesced away.
    #[must_use]
    pub fn is_debounced(&self) -> bool {
        matches!(self, TriggerOutcome::Debounced(_))
    }

    /// The report, if a run completed.
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            TriggerOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Serializes and debounces engine runs.
pub struct SyncCoordinator<S, M> {
    engine: Arc<ReconciliationEngine<S, M>>,
    cooldown: Duration,
    states: Mutex<HashMap<Direction, DirectionState>>,
    run_lock: tokio::sync::Mutex<()>,
}

impl<S, M> SyncCoordinator<S, M>
where
    S: SourceSystem + 'static,
    M: MirrorSystem + 'static,
{
    /// Create a coordinator with every direction idle.
    #[must_use]
    pub fn new(engine: Arc<ReconciliationEngine<S, M>>) -> Self {
        let cooldown = engine.config().cooldown;
        let states = Direction::all()
            .iter()
            .map(|direction| {
                (
                    *direction,
                    DirectionState::Idle {
                        last_completed: None,
                    },
                )
            })
            .collect();

        Self {
            engine,
            cooldown,
            states: Mutex::new(states),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The engine being coordinated.
    pub fn engine(&self) -> &Arc<ReconciliationEngine<S, M>> {
        &self.engine
    }

    /// Current state of a direction.
    pub fn state(&self, direction: Direction) -> DirectionState {
        self.lock_states()
            .get(&direction)
            .copied()
            .unwrap_or(DirectionState::Idle {
                last_completed: None,
            })
    }

    /// Run `direction` unless it is running or cooling down.
    pub async fn trigger(&self, direction: Direction) -> TriggerOutcome {
        let _slot = match self.claim(direction) {
            Ok(slot) => slot,
            Err(reason) => {
                debug!(direction = %direction, reason = ?reason, "Trigger debounced");
                return TriggerOutcome::Debounced(reason);
            }
        };

        let _running = self.run_lock.lock().await;
        match self.engine.run(direction).await {
            Ok(report) => TriggerOutcome::Completed(report),
            Err(e) => TriggerOutcome::Aborted(e),
        }
    }

    /// Handle triggers until the channel closes, then wait for in-flight runs.
    pub async fn run_until_closed(self: Arc<Self>, mut triggers: mpsc::Receiver<Trigger>) {
        let mut runs = JoinSet::new();
        info!("Sync coordinator started");

        while let Some(trigger) = triggers.recv().await {
            debug!(trigger = %trigger, "Trigger received");
            let coordinator = Arc::clone(&self);
            runs.spawn(async move {
                match coordinator.trigger(trigger.direction).await {
                    TriggerOutcome::Completed(report) => {
                        debug!(run_id = %report.run_id, origin = %trigger.origin, "Triggered run completed");
                    }
                    TriggerOutcome::Aborted(e) => {
                        error!(
                            direction = %trigger.direction,
                            origin = %trigger.origin,
                            error = %e,
                            "Triggered run aborted"
                        );
                    }
                    TriggerOutcome::Debounced(_) => {}
                }
            });

            while let Some(joined) = runs.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "Sync run task panicked");
                }
            }
        }

        while let Some(joined) = runs.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Sync run task panicked");
            }
        }
        info!("Sync coordinator stopped");
    }

    fn claim(&self, direction: Direction) -> Result<RunSlot<'_>, DebounceReason> {
        let mut states = self.lock_states();
        let state = states.entry(direction).or_insert(DirectionState::Idle {
            last_completed: None,
        });

        match *state {
            DirectionState::Running => return Err(DebounceReason::Running),
            DirectionState::Idle {
                last_completed: Some(completed),
            } => {
                let elapsed = completed.elapsed();
                if elapsed < self.cooldown {
                    return Err(DebounceReason::CoolingDown {
                        remaining: self.cooldown - elapsed,
                    });
                }
            }
            DirectionState::Idle {
                last_completed: None,
            } => {}
        }

        *state = DirectionState::Running;
        Ok(RunSlot {
            states: &self.states,
            direction,
        })
    }

    fn lock_states(&self) -> MutexGuard<'_, HashMap<Direction, DirectionState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a direction idle again when its run ends, however it ends.
struct RunSlot<'a> {
    states: &'a Mutex<HashMap<Direction, DirectionState>>,
    direction: Direction,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.insert(
            self.direction,
            DirectionState::Idle {
                last_completed: Some(Instant::now()),
            },
        );
    }
}
