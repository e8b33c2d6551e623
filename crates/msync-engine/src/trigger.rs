//! Triggers feeding the coordinator.
//!
//! Webhook receivers verify their requests and then turn them into
//! [`Trigger`]s on an `mpsc` channel. Timers produce the same triggers so a
//! missed notification is caught on the next tick.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use msync_core::types::{CategoryFilter, Direction};

/// Resource state the mirror system's push channel sends when a watch starts.
const HANDSHAKE_RESOURCE_STATE: &str = "sync";

/// Where a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOrigin {
    /// Change notification from the source system.
    SourceWebhook,
    /// Change notification from the mirror system.
    MirrorNotification,
    /// Periodic timer.
    Timer,
    /// Operator request.
    Manual,
}

impl TriggerOrigin {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerOrigin::SourceWebhook => "source_webhook",
            TriggerOrigin::MirrorNotification => "mirror_notification",
            TriggerOrigin::Timer => "timer",
            TriggerOrigin::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request to run one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Direction to run.
    pub direction: Direction,
    /// Where the request came from.
    pub origin: TriggerOrigin,
}

impl Trigger {
    /// Create a trigger.
    #[must_use]
    pub fn new(direction: Direction, origin: TriggerOrigin) -> Self {
        Self { direction, origin }
    }

    /// Classify a mirror push notification by its resource state.
    ///
    /// The handshake sent when a watch channel opens carries no change.
    #[must_use]
    pub fn from_mirror_notification(resource_state: &str) -> Option<Self> {
        if resource_state.eq_ignore_ascii_case(HANDSHAKE_RESOURCE_STATE) {
            debug!("Ignoring mirror watch handshake");
            return None;
        }
        Some(Self::new(Direction::Reverse, TriggerOrigin::MirrorNotification))
    }

    /// Classify a source webhook by the category of the changed record.
    ///
    /// Events for other categories are ignored. An event without a category
    /// still triggers, since its record may be eligible.
    #[must_use]
    pub fn from_source_event(category: Option<&str>, filter: &CategoryFilter) -> Option<Self> {
        match category {
            Some(category) if !filter.matches(category) => {
                debug!(category = category, "Ignoring source event for other category");
                None
            }
            _ => Some(Self::new(Direction::Forward, TriggerOrigin::SourceWebhook)),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.direction, self.origin)
    }
}

/// Send a timer trigger for `direction` every `period`, starting immediately.
///
/// The task ends when the receiving side is dropped.
pub fn spawn_interval_trigger(
    triggers: mpsc::Sender<Trigger>,
    direction: Direction,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if triggers
                .send(Trigger::new(direction, TriggerOrigin::Timer))
                .await
                .is_err()
            {
                debug!(direction = %direction, "Trigger channel closed, stopping timer");
                break;
            }
        }
    })
}
