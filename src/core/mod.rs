//! Sync engine and the abstractions it drives

pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod log;
pub mod normalize;
pub mod planner;
pub mod retry;
pub mod row;
pub mod sync;

// Re-export main types for cleaner imports
pub use history::{HistoryProvider, IndexCatalog};
pub use row::{DateWindow, IndexRow};
pub use sync::{SyncConfig, SyncEngine, SyncSummary};
