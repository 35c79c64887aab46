use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::{SourceItem, SourcePlaylist, SourceStream};

/// `yt-dlp --dump-single-json` output for a single video
#[derive(Debug, Clone, Deserialize)]
pub struct YtDlpInfo {
    #[serde(default)]
    pub title: String,
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YtDlpFormat {
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    pub url: Option<String>,
    pub protocol: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub abr: Option<f32>,
    pub tbr: Option<f32>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
}

impl YtDlpFormat {
    fn has_codec(codec: &Option<String>) -> bool {
        codec
            .as_deref()
            .is_some_and(|c| !c.is_empty() && c != "none")
    }

    /// Plain HTTP(S) formats can be streamed straight to disk; manifests cannot.
    pub fn is_direct(&self) -> bool {
        self.url.is_some()
            && self
                .protocol
                .as_deref()
                .map_or(true, |p| p == "https" || p == "http")
    }

    fn to_source_stream(&self) -> SourceStream {
        SourceStream {
            id: self.format_id.clone(),
            container: self.ext.clone(),
            has_video: Self::has_codec(&self.vcodec),
            has_audio: Self::has_codec(&self.acodec),
            height: self.height,
            audio_bitrate_kbps: self.abr,
            total_bitrate_kbps: self.tbr,
            filesize: self.filesize,
            filesize_approx: self.filesize_approx,
        }
    }
}

impl YtDlpInfo {
    pub fn format(&self, format_id: &str) -> Option<&YtDlpFormat> {
        self.formats.iter().find(|f| f.format_id == format_id)
    }

    pub fn to_source_item(&self) -> SourceItem {
        SourceItem {
            title: self.title.clone(),
            duration_secs: self.duration,
            streams: self
                .formats
                .iter()
                .filter(|f| f.is_direct())
                .map(YtDlpFormat::to_source_stream)
                .collect(),
        }
    }
}

/// `yt-dlp --flat-playlist --dump-single-json` output
#[derive(Debug, Clone, Deserialize)]
pub struct YtDlpPlaylist {
    pub title: Option<String>,
    #[serde(default)]
    pub entries: Vec<Option<YtDlpEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YtDlpEntry {
    pub id: Option<String>,
    pub url: Option<String>,
    pub webpage_url: Option<String>,
}

impl YtDlpEntry {
    fn member_url(&self) -> Option<String> {
        self.webpage_url
            .clone()
            .or_else(|| self.url.clone())
            .or_else(|| {
                self.id
                    .as_ref()
                    .map(|id| format!("https://www.youtube.com/watch?v={}", id))
            })
    }
}

impl YtDlpPlaylist {
    pub fn to_source_playlist(&self) -> SourcePlaylist {
        SourcePlaylist {
            title: self.title.clone().unwrap_or_else(|| "playlist".to_string()),
            member_urls: self
                .entries
                .iter()
                .flatten()
                .filter_map(YtDlpEntry::member_url)
                .collect(),
        }
    }
}
