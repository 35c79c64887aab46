use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::catalog::RenditionCatalog;

/// What the user asked for. Switching mode changes what a fetch resolves and
/// what a download produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
    Playlist,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Video, MediaKind::Audio, MediaKind::Playlist];

    /// Playlists are downloaded as progressive video.
    pub fn rendition_kind(self) -> RenditionKind {
        match self {
            MediaKind::Video | MediaKind::Playlist => RenditionKind::Video,
            MediaKind::Audio => RenditionKind::Audio,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "Single Video"),
            MediaKind::Audio => write!(f, "Audio Only"),
            MediaKind::Playlist => write!(f, "Playlist"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenditionKind {
    Video,
    Audio,
}

impl RenditionKind {
    /// Output extension. Audio is labelled `mp3` but never transcoded.
    pub fn extension(self) -> &'static str {
        match self {
            RenditionKind::Video => "mp4",
            RenditionKind::Audio => "mp3",
        }
    }

    pub fn quality_tag(self, quality: u32) -> String {
        match self {
            RenditionKind::Video => format!("{}p", quality),
            RenditionKind::Audio => format!("{}kbps", quality),
        }
    }
}

/// One concrete encoded variant of a media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    /// Provider key used to select this variant for transfer (itag / format id)
    pub id: String,
    /// Display label, e.g. "720p - 12.34 MB"
    pub label: String,
    pub kind: RenditionKind,
    /// Vertical resolution for video, audio bitrate in kbps for audio
    pub quality: u32,
    pub container: String,
    pub approximate_size_bytes: Option<u64>,
}

impl Rendition {
    pub fn quality_tag(&self) -> String {
        self.kind.quality_tag(self.quality)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenditionSelector {
    Id(String),
    Label(String),
}

impl fmt::Display for RenditionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenditionSelector::Id(id) => write!(f, "{}", id),
            RenditionSelector::Label(label) => write!(f, "{}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub title: String,
    pub source_url: String,
    pub kind: RenditionKind,
    pub renditions: RenditionCatalog,
}

/// Lightweight handle on a playlist member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
    pub title: String,
    pub source_url: String,
    /// False for placeholder entries whose title could not be fetched
    pub title_resolved: bool,
}

impl PlaylistItem {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
            title_resolved: true,
        }
    }

    /// `position` is 1-based.
    pub fn placeholder(position: usize, source_url: impl Into<String>) -> Self {
        Self {
            title: format!("Video {} (title unavailable)", position),
            source_url: source_url.into(),
            title_resolved: false,
        }
    }
}

/// A resolved playlist.
///
/// `renditions` is sampled from the first member only and offered for every
/// member; members lacking the chosen rendition fall back at download time.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistCatalog {
    pub title: String,
    pub source_url: String,
    pub members: Vec<PlaylistItem>,
    pub renditions: RenditionCatalog,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTarget {
    Single(MediaItem),
    Playlist(PlaylistCatalog),
}

impl ResolvedTarget {
    pub fn title(&self) -> &str {
        match self {
            ResolvedTarget::Single(item) => &item.title,
            ResolvedTarget::Playlist(playlist) => &playlist.title,
        }
    }

    pub fn renditions(&self) -> &RenditionCatalog {
        match self {
            ResolvedTarget::Single(item) => &item.renditions,
            ResolvedTarget::Playlist(playlist) => &playlist.renditions,
        }
    }
}

/// Caller-selected playlist members, kept in selection order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistSelection {
    pub title: String,
    pub renditions: RenditionCatalog,
    pub members: Vec<PlaylistItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadTarget {
    Single(MediaItem),
    Playlist(PlaylistSelection),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub target: DownloadTarget,
    pub rendition: RenditionSelector,
    pub destination_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    Failed(String),
    /// Requested rendition was missing; carries the label actually used
    FallbackUsed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub item_title: String,
    pub status: OutcomeStatus,
    /// Name of the file actually written, if any
    pub saved_filename: Option<String>,
}

impl DownloadOutcome {
    pub fn success(item_title: impl Into<String>, saved_filename: String) -> Self {
        Self {
            item_title: item_title.into(),
            status: OutcomeStatus::Success,
            saved_filename: Some(saved_filename),
        }
    }

    pub fn fallback(item_title: impl Into<String>, label: String, saved_filename: String) -> Self {
        Self {
            item_title: item_title.into(),
            status: OutcomeStatus::FallbackUsed(label),
            saved_filename: Some(saved_filename),
        }
    }

    pub fn failed(item_title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item_title: item_title.into(),
            status: OutcomeStatus::Failed(reason.into()),
            saved_filename: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed(_))
    }
}

/// Provider-neutral description of one stream offered for a media item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceStream {
    pub id: String,
    /// File extension reported by the provider (mp4, m4a, webm)
    pub container: String,
    pub has_video: bool,
    pub has_audio: bool,
    pub height: Option<u32>,
    pub audio_bitrate_kbps: Option<f32>,
    pub total_bitrate_kbps: Option<f32>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceItem {
    pub title: String,
    pub duration_secs: Option<f64>,
    pub streams: Vec<SourceStream>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePlaylist {
    pub title: String,
    pub member_urls: Vec<String>,
}
