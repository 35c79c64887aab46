use thiserror::Error;

/// Fatal failures of a resolve operation. Each one is reported once and ends the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Could not fetch details: {0}")]
    ConnectionFailed(String),

    #[error("No compatible streams were found for this URL")]
    NoRenditions,

    #[error("This playlist is empty or private")]
    EmptyPlaylist,

    #[error("Replaced by a newer fetch")]
    Superseded,
}

/// Failures that stop a download request as a whole. Per-item problems are
/// reported as failed outcomes instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("Could not find the selected quality '{0}'")]
    RenditionNotFound(String),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Download cancelled: no directory was selected")]
    NoDestinationSelected,

    #[error("Nothing has been resolved yet, enter a URL first")]
    NothingResolved,

    #[error("Another download is already running")]
    AlreadyRunning,
}
