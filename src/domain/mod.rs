pub mod catalog;
pub mod error;
pub mod model;

pub use catalog::RenditionCatalog;
pub use error::{DownloadError, FetchError};
pub use model::{
    DownloadOutcome, DownloadRequest, DownloadTarget, MediaItem, MediaKind, OutcomeStatus,
    PlaylistCatalog, PlaylistItem, PlaylistSelection, Rendition, RenditionKind,
    RenditionSelector, ResolvedTarget, SourceItem, SourcePlaylist, SourceStream,
};
