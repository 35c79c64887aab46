pub mod directory;
pub mod download_coordinator;
pub mod events;
pub mod fetch_coordinator;
pub mod orchestrator;
pub mod progress;

#[cfg(test)]
pub(crate) mod testing;

pub use directory::DirectoryRequests;
pub use events::{EventReceiver, LogLevel, OrchestratorEvent};
pub use orchestrator::{DownloadSelection, DownloadUpdate, Orchestrator};
