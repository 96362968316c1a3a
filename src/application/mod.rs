//! Application layer - use cases and orchestration.
//!
//! This layer contains the mode decision, both backing stores behind one
//! capability trait, and the record service callers talk to.

pub mod formatter;
pub mod local_store;
pub mod mode_selector;
pub mod record_service;
pub mod remote_store;
pub mod store;

pub use formatter::{format_history_json, format_history_table, format_mode, OutputFormat};
pub use local_store::LocalStore;
pub use mode_selector::{ModeSelection, ModeSelector};
pub use record_service::{HistoryFeed, RecordService};
pub use remote_store::RemoteStore;
pub use store::{HistoryCallback, RecordStore, Subscription};
