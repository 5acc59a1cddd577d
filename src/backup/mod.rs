pub mod manager;
pub mod snapshot;

pub use manager::{BackupManager, BackupReport, POINTER_FILE};
pub use snapshot::{SNAPSHOT_VERSION, Snapshot};
