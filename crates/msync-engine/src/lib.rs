//! # Milestone Sync Engine
//!
//! Bidirectional reconciliation between source records (project milestones)
//! and their mirror records (calendar events).
//!
//! This crate provides:
//! - The forward pass, pushing source dates and titles to mirrors
//! - The reverse pass, pushing mirror-side date edits back to the source
//! - Garbage collection of mirrors whose source record is gone or closed
//! - A coordinator that debounces triggers and serializes runs
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   ┌────────────────┐
//! │ Source webhook │   │  Mirror push   │   ┌───────┐
//! └───────┬────────┘   └───────┬────────┘   │ Timer │
//!         │ Trigger            │ Trigger    └───┬───┘
//!         └──────────┬─────────┴────────────────┘
//!                    ▼
//!           ┌─────────────────┐
//!           │ SyncCoordinator │  debounce per direction, one shared run lock
//!           └────────┬────────┘
//!                    ▼
//!      ┌───────────────────────────┐
//!      │   ReconciliationEngine    │
//!      │ forward ─► gc │ reverse   │
//!      └──────┬─────────────┬──────┘
//!             ▼             ▼
//!      ┌────────────┐ ┌────────────┐
//!      │SourceSystem│ │MirrorSystem│
//!      └────────────┘ └────────────┘
//! ```
//!
//! Sync state lives on the mirror records as metadata (content hash, origin
//! tag, source id). The engine keeps nothing between passes.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use msync_engine::{EngineConfig, ReconciliationEngine, SyncCoordinator, Trigger};
//!
//! let engine = Arc::new(ReconciliationEngine::new(source, mirror, EngineConfig::from_env()?));
//! let coordinator = Arc::new(SyncCoordinator::new(engine));
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(32);
//! tokio::spawn(coordinator.run_until_closed(rx));
//!
//! if let Some(trigger) = Trigger::from_mirror_notification(resource_state) {
//!     tx.send(trigger).await?;
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod forward;
pub mod gc;
pub mod managed;
pub mod render;
pub mod report;
pub mod resilience;
pub mod reverse;
pub mod statistics;
pub mod trigger;

// Re-exports for convenience
pub use config::{ConfigError, EngineConfig};
pub use coordinator::{DebounceReason, DirectionState, SyncCoordinator, TriggerOutcome};
pub use engine::ReconciliationEngine;
pub use forward::ForwardDecision;
pub use gc::GarbageCollector;
pub use managed::{ManagedMirror, ManagedMirrorSet};
pub use render::MirrorRenderer;
pub use report::{PassReport, PassStatus};
pub use resilience::CallTimeout;
pub use reverse::{ConflictResolver, MirrorEdit};
pub use statistics::{PassStatistics, RecordAction, StatisticsTracker};
pub use trigger::{spawn_interval_trigger, Trigger, TriggerOrigin};
