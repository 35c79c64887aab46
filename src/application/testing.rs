//! Scripted `MediaProvider` used by the application tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::api::provider::{MediaProvider, ProgressCallback, ProviderError, Result};
use crate::domain::{Rendition, SourceItem, SourcePlaylist, SourceStream};

pub const PAYLOAD: &[u8] = b"media-bytes!";

pub fn progressive(id: &str, height: u32) -> SourceStream {
    SourceStream {
        id: id.to_string(),
        container: "mp4".to_string(),
        has_video: true,
        has_audio: true,
        height: Some(height),
        filesize: Some(u64::from(height) << 14),
        ..Default::default()
    }
}

pub fn audio(id: &str, kbps: f32) -> SourceStream {
    SourceStream {
        id: id.to_string(),
        container: "m4a".to_string(),
        has_video: false,
        has_audio: true,
        audio_bitrate_kbps: Some(kbps),
        ..Default::default()
    }
}

pub fn item(title: &str, streams: Vec<SourceStream>) -> SourceItem {
    SourceItem {
        title: title.to_string(),
        duration_secs: Some(60.0),
        streams,
    }
}

#[derive(Default)]
pub struct ScriptedProvider {
    items: HashMap<String, SourceItem>,
    playlists: HashMap<String, SourcePlaylist>,
    failing_items: HashSet<String>,
    failing_titles: HashSet<String>,
    failing_transfers: HashSet<String>,
    held: HashMap<String, Arc<Notify>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    downloads: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, url: &str, item: SourceItem) -> Self {
        self.items.insert(url.to_string(), item);
        self
    }

    pub fn with_playlist(mut self, url: &str, title: &str, members: &[&str]) -> Self {
        self.playlists.insert(
            url.to_string(),
            SourcePlaylist {
                title: title.to_string(),
                member_urls: members.iter().map(|m| m.to_string()).collect(),
            },
        );
        self
    }

    pub fn failing_item(mut self, url: &str) -> Self {
        self.failing_items.insert(url.to_string());
        self
    }

    pub fn failing_title(mut self, url: &str) -> Self {
        self.failing_titles.insert(url.to_string());
        self
    }

    pub fn failing_transfer(mut self, url: &str) -> Self {
        self.failing_transfers.insert(url.to_string());
        self
    }

    /// `resolve_item(url)` waits until the returned handle is notified.
    pub fn hold(&mut self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.held.insert(url.to_string(), gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `resolve_item` calls started but neither finished nor dropped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// (source url, rendition id, filename) per completed transfer
    pub fn downloads(&self) -> Vec<(String, String, String)> {
        self.downloads.lock().clone()
    }

    fn lookup(&self, url: &str) -> Result<SourceItem> {
        if self.failing_items.contains(url) {
            return Err(ProviderError::ToolFailed(format!("unavailable: {}", url)));
        }
        self.items
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::ToolFailed(format!("unknown url: {}", url)))
    }
}

#[async_trait]
impl MediaProvider for ScriptedProvider {
    async fn resolve_item(&self, url: &str) -> Result<SourceItem> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _running = InFlight::enter(&self.in_flight);
        if let Some(gate) = self.held.get(url) {
            gate.notified().await;
        }
        self.lookup(url)
    }

    async fn resolve_playlist(&self, url: &str) -> Result<SourcePlaylist> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.playlists
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::ToolFailed(format!("unknown playlist: {}", url)))
    }

    async fn resolve_title(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_titles.contains(url) {
            return Err(ProviderError::InvalidResponse("title missing".to_string()));
        }
        Ok(self.lookup(url)?.title)
    }

    async fn download(
        &self,
        source_url: &str,
        rendition: &Rendition,
        output_dir: &Path,
        filename: &str,
        on_progress: ProgressCallback<'_>,
    ) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let total = PAYLOAD.len() as u64;
        on_progress(total, total);
        on_progress(total, total / 2);

        if self.failing_transfers.contains(source_url) {
            return Err(ProviderError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }

        let target = output_dir.join(filename);
        tokio::fs::write(&target, PAYLOAD).await?;
        on_progress(total, 0);

        self.downloads.lock().push((
            source_url.to_string(),
            rendition.id.clone(),
            filename.to_string(),
        ));
        Ok(target)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
