mod engine;

pub use engine::{sync_accounts, SyncError, SyncSummary};
