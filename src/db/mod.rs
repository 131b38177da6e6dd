pub mod cleanup;
pub mod client;
pub mod syncer;

pub use client::SupabaseClient;
pub use cleanup::EventCleanup;
pub use syncer::{EventSyncer, SyncResults};
