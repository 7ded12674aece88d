//! # dscheduler Core
//!
//! Cache-consistent query and mutation layer over a durable job store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            JobService                            │
//! │   schedule / pause / resume / delete          list_jobs          │
//! │            │                                      │              │
//! │            │                             ┌────────▼─────────┐    │
//! │            │                             │  QueryAssembler  │    │
//! │            │                             │ sort/filter/page │    │
//! │            │                             └────────┬─────────┘    │
//! │            │       ┌──────────────────────────────▼──────────┐   │
//! │            └──────►│        ConsistencyCoordinator           │   │
//! │                    │  KeySetTracker   EntryCache x2 (moka)   │   │
//! │                    └──────────────────┬──────────────────────┘   │
//! └───────────────────────────────────────┼──────────────────────────┘
//!                                         ▼
//!                          JobStore (authoritative, external)
//! ```
//!
//! The executable registry resolves job executables by key, the
//! [`JobRunner`] fires due triggers and publishes lifecycle events on the
//! [`EventBus`].

pub mod cache;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod model;
pub mod query;
pub mod registry;
pub mod runner;
pub mod sample;
pub mod seed;
pub mod service;
pub mod store;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{CacheStats, EntryCache};
pub use coordinator::{ConsistencyCoordinator, JobEntry, ReadPass};
pub use error::{SchedulerError, StoreError};
pub use events::{EventBus, JobEvent};
pub use model::{
    JobDefinition, JobIdentity, JobRecord, JobSpec, TriggerKey, TriggerSnapshot, TriggerSpec,
    TriggerState,
};
pub use query::{
    JobQuery, Page, PageWindow, QueryAssembler, SearchField, SortField, SortOrder, Strategy,
};
pub use registry::{
    Executable, ExecutableFactory, ExecutableHandle, ExecutableRegistry, ExecutionContext,
    ExecutionError,
};
pub use runner::JobRunner;
pub use sample::SampleJob;
pub use seed::{SeedReport, seed_demo_jobs};
pub use service::JobService;
pub use store::{DueTrigger, FileJobStore, FireOutcome, JobStore, MemoryJobStore};
pub use tracker::{KeySetDrift, KeySetTracker};
