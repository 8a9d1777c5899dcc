//! External health store integration for the health log.
//!
//! Provides:
//! - The [`ExternalStore`] contract with HTTP and in-memory implementations
//! - The [`SyncOrchestrator`], which reconciles local days with the store
//! - The [`Coordinator`], which debounces saves and keeps recalculation
//!   and sync single-flight

mod cancel;
mod coordinator;
mod http;
mod memory;
mod orchestrator;
mod store;

pub use cancel::CancelToken;
pub use coordinator::Coordinator;
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use orchestrator::{SyncError, SyncOrchestrator, SyncReport, edit_needs_sync};
pub use store::{
    CharacteristicKind, CharacteristicValue, DailyStatisticSeries, ExternalStore, StatisticKind,
    StoreError,
};
