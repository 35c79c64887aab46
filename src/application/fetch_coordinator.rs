use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::{AbortHandle, JoinHandle};
use url::Url;

use super::events::EventSink;
use crate::api::MediaProvider;
use crate::domain::{
    FetchError, MediaItem, MediaKind, PlaylistCatalog, PlaylistItem, RenditionCatalog,
    RenditionKind, ResolvedTarget,
};

/// Shortest URL worth sending to the provider.
const MIN_URL_CHARS: usize = 11;

#[derive(Debug, Default)]
struct Snapshot {
    generation: u64,
    target: Option<Arc<ResolvedTarget>>,
}

/// Resolves URLs into rendition catalogs and keeps the latest result.
#[derive(Clone)]
pub struct FetchCoordinator {
    provider: Arc<dyn MediaProvider>,
    events: EventSink,
    accepted_hosts: Arc<[String]>,
    snapshot: Arc<RwLock<Snapshot>>,
    in_flight: Arc<Mutex<Option<AbortHandle>>>,
}

impl FetchCoordinator {
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        events: EventSink,
        accepted_hosts: Vec<String>,
    ) -> Self {
        Self {
            provider,
            events,
            accepted_hosts: accepted_hosts.into(),
            snapshot: Arc::new(RwLock::new(Snapshot::default())),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `resolve` on its own task. A fetch spawned earlier that is still
    /// running is aborted, so at most one is in flight.
    pub fn spawn(
        &self,
        url: String,
        kind: MediaKind,
    ) -> JoinHandle<Result<Arc<ResolvedTarget>, FetchError>> {
        let this = self.clone();
        let handle = tokio::spawn(async move { this.resolve(&url, kind).await });

        if let Some(previous) = self.in_flight.lock().replace(handle.abort_handle()) {
            if !previous.is_finished() {
                tracing::debug!("aborting superseded fetch");
                previous.abort();
            }
        }
        handle
    }

    /// Last target published by a fetch that was not superseded.
    pub fn latest(&self) -> Option<Arc<ResolvedTarget>> {
        self.snapshot.read().target.clone()
    }

    pub async fn resolve(
        &self,
        url: &str,
        kind: MediaKind,
    ) -> Result<Arc<ResolvedTarget>, FetchError> {
        let generation = {
            let mut snapshot = self.snapshot.write();
            snapshot.generation += 1;
            snapshot.target = None;
            snapshot.generation
        };

        let url = url.trim();
        let resolved = match check_url(url, kind, &self.accepted_hosts) {
            Ok(()) => self.resolve_target(url, kind).await,
            Err(e) => Err(e),
        };

        let target = match resolved {
            Ok(target) => Arc::new(target),
            Err(e) => {
                self.events
                    .error(format!("FATAL ERROR: Could not fetch details. {}", e))
                    .await;
                return Err(e);
            }
        };

        let published = {
            let mut snapshot = self.snapshot.write();
            if snapshot.generation == generation {
                snapshot.target = Some(target.clone());
                true
            } else {
                false
            }
        };

        if published {
            self.events
                .info(format!(
                    "Found {} quality options.",
                    target.renditions().len()
                ))
                .await;
            self.events
                .info("Ready to download. Please select a quality and click 'Download'.")
                .await;
        } else {
            tracing::debug!(url, "fetch superseded by a newer one, result not published");
        }

        Ok(target)
    }

    async fn resolve_target(&self, url: &str, kind: MediaKind) -> Result<ResolvedTarget, FetchError> {
        self.events.info(format!("Connecting to URL: {}", url)).await;

        if kind == MediaKind::Playlist {
            return self.resolve_playlist(url).await.map(ResolvedTarget::Playlist);
        }

        let source = self
            .provider
            .resolve_item(url)
            .await
            .map_err(|e| FetchError::ConnectionFailed(e.to_string()))?;
        self.events
            .info(format!("Successfully connected. Video Title: {}", source.title))
            .await;

        let rendition_kind = kind.rendition_kind();
        self.events
            .info(match rendition_kind {
                RenditionKind::Video => "Fetching available video streams (progressive MP4)...",
                RenditionKind::Audio => "Fetching available audio streams (MP4)...",
            })
            .await;

        let renditions =
            RenditionCatalog::from_streams(&source.streams, rendition_kind, source.duration_secs);
        if renditions.is_empty() {
            return Err(FetchError::NoRenditions);
        }

        Ok(ResolvedTarget::Single(MediaItem {
            title: source.title,
            source_url: url.to_string(),
            kind: rendition_kind,
            renditions,
        }))
    }

    async fn resolve_playlist(&self, url: &str) -> Result<PlaylistCatalog, FetchError> {
        let playlist = self
            .provider
            .resolve_playlist(url)
            .await
            .map_err(|e| FetchError::ConnectionFailed(e.to_string()))?;
        self.events
            .info(format!(
                "Successfully connected. Playlist Title: '{}'",
                playlist.title
            ))
            .await;
        self.events
            .info(format!(
                "Found {} videos in the playlist.",
                playlist.member_urls.len()
            ))
            .await;

        let Some((first_url, rest)) = playlist.member_urls.split_first() else {
            return Err(FetchError::EmptyPlaylist);
        };

        let first = self
            .provider
            .resolve_item(first_url)
            .await
            .map_err(|e| FetchError::ConnectionFailed(e.to_string()))?;
        self.events
            .info(format!(
                "Fetching sample quality options from first video: '{}'",
                first.title
            ))
            .await;

        let renditions =
            RenditionCatalog::from_streams(&first.streams, RenditionKind::Video, first.duration_secs);
        if renditions.is_empty() {
            return Err(FetchError::NoRenditions);
        }

        let total = playlist.member_urls.len();
        let mut members = Vec::with_capacity(total);
        members.push(PlaylistItem::new(first.title, first_url.clone()));

        for (offset, member_url) in rest.iter().enumerate() {
            let position = offset + 2;
            match self.provider.resolve_title(member_url).await {
                Ok(title) => members.push(PlaylistItem::new(title, member_url.clone())),
                Err(e) => {
                    self.events
                        .warn(format!(
                            "[{}/{}] WARNING: Could not fetch the title ({}). Listing it as a placeholder.",
                            position, total, e
                        ))
                        .await;
                    members.push(PlaylistItem::placeholder(position, member_url.clone()));
                }
            }
        }

        Ok(PlaylistCatalog {
            title: playlist.title,
            source_url: url.to_string(),
            members,
            renditions,
        })
    }
}

/// Cheap shape check run before any network call.
///
/// An empty `accepted_hosts` accepts every http(s) host. Playlists must carry
/// a `list` query parameter.
pub fn check_url(raw: &str, kind: MediaKind, accepted_hosts: &[String]) -> Result<(), FetchError> {
    let url = raw.trim();
    if url.chars().count() < MIN_URL_CHARS {
        return Err(FetchError::InvalidUrl(format!("'{}' is too short", url)));
    }

    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("'{}': {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(format!(
            "'{}' is not an http(s) address",
            url
        )));
    }

    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    if !accepted_hosts.is_empty()
        && !accepted_hosts
            .iter()
            .any(|accepted| host.contains(&accepted.to_ascii_lowercase()))
    {
        return Err(FetchError::InvalidUrl(format!(
            "'{}' is not a supported host",
            host
        )));
    }

    if kind == MediaKind::Playlist && !parsed.query_pairs().any(|(key, _)| key == "list") {
        return Err(FetchError::InvalidUrl(format!(
            "'{}' does not name a playlist",
            url
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::{channel, EventReceiver, OrchestratorEvent};
    use crate::application::testing::{audio, item, progressive, ScriptedProvider};

    const VIDEO: &str = "https://www.youtube.com/watch?v=first";
    const SECOND: &str = "https://www.youtube.com/watch?v=second";
    const THIRD: &str = "https://www.youtube.com/watch?v=third";
    const PLAYLIST: &str = "https://www.youtube.com/playlist?list=PL123";

    fn hosts() -> Vec<String> {
        vec!["youtube.com".to_string(), "youtu.be".to_string()]
    }

    fn coordinator(provider: Arc<ScriptedProvider>) -> (FetchCoordinator, EventReceiver) {
        let (sink, receiver) = channel(1024);
        (FetchCoordinator::new(provider, sink, hosts()), receiver)
    }

    fn log_lines(receiver: &mut EventReceiver) -> Vec<String> {
        receiver
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                OrchestratorEvent::Log(entry) => Some(entry.message),
                OrchestratorEvent::Progress(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_check_url() {
        let hosts = hosts();
        assert!(check_url(VIDEO, MediaKind::Video, &hosts).is_ok());
        assert!(check_url("  https://youtu.be/abcdef  ", MediaKind::Audio, &hosts).is_ok());
        assert!(check_url(PLAYLIST, MediaKind::Playlist, &hosts).is_ok());
        assert!(check_url("https://www.youtube.com/watch?v=a&list=PL1", MediaKind::Playlist, &hosts).is_ok());

        for bad in ["", "youtu.be/x", "not a url at all", "ftp://youtube.com/video"] {
            assert!(
                matches!(check_url(bad, MediaKind::Video, &hosts), Err(FetchError::InvalidUrl(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(check_url("https://example.com/watch?v=1", MediaKind::Video, &hosts).is_err());
        assert!(check_url(VIDEO, MediaKind::Playlist, &hosts).is_err());
        assert!(check_url("https://example.com/watch?v=1", MediaKind::Video, &[]).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_never_reaches_provider() {
        let provider = Arc::new(ScriptedProvider::new());
        let (fetch, mut receiver) = coordinator(provider.clone());

        for bad in ["", "short", "https://vimeo.com/12345678", VIDEO] {
            let kind = if bad == VIDEO { MediaKind::Playlist } else { MediaKind::Video };
            let result = fetch.resolve(bad, kind).await;
            assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
        }

        assert_eq!(provider.calls(), 0);
        assert!(fetch.latest().is_none());
        assert!(log_lines(&mut receiver)
            .iter()
            .all(|line| line.starts_with("FATAL ERROR")));
    }

    #[tokio::test]
    async fn test_resolve_video_publishes_sorted_catalog() {
        let provider = Arc::new(ScriptedProvider::new().with_item(
            VIDEO,
            item(
                "First Clip",
                vec![progressive("18", 360), audio("140", 128.0), progressive("22", 720)],
            ),
        ));
        let (fetch, mut receiver) = coordinator(provider);

        let target = fetch.resolve(VIDEO, MediaKind::Video).await.unwrap();
        let ResolvedTarget::Single(media) = target.as_ref() else {
            panic!("expected a single item");
        };
        assert_eq!(media.title, "First Clip");
        assert_eq!(media.kind, RenditionKind::Video);
        let ids: Vec<&str> = media
            .renditions
            .sorted_by_quality()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["22", "18"]);

        assert_eq!(fetch.latest(), Some(target));
        let lines = log_lines(&mut receiver);
        assert!(lines.contains(&"Found 2 quality options.".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_audio_filters_kind() {
        let provider = Arc::new(ScriptedProvider::new().with_item(
            VIDEO,
            item("Song", vec![progressive("18", 360), audio("140", 128.0), audio("139", 48.0)]),
        ));
        let (fetch, _receiver) = coordinator(provider);

        let target = fetch.resolve(VIDEO, MediaKind::Audio).await.unwrap();
        let labels = target.renditions().labels();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].starts_with("128kbps"));
        assert!(labels[1].starts_with("48kbps"));
    }

    #[tokio::test]
    async fn test_no_renditions() {
        let provider = Arc::new(
            ScriptedProvider::new().with_item(VIDEO, item("Audio only", vec![audio("140", 128.0)])),
        );
        let (fetch, _receiver) = coordinator(provider);

        assert_eq!(
            fetch.resolve(VIDEO, MediaKind::Video).await,
            Err(FetchError::NoRenditions)
        );
        assert!(fetch.latest().is_none());
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let provider = Arc::new(ScriptedProvider::new().failing_item(VIDEO));
        let (fetch, _receiver) = coordinator(provider);

        let result = fetch.resolve(VIDEO, MediaKind::Video).await;
        assert!(matches!(result, Err(FetchError::ConnectionFailed(detail)) if detail.contains("unavailable")));
    }

    #[tokio::test]
    async fn test_empty_playlist() {
        let provider = Arc::new(ScriptedProvider::new().with_playlist(PLAYLIST, "Empty", &[]));
        let (fetch, _receiver) = coordinator(provider);

        assert_eq!(
            fetch.resolve(PLAYLIST, MediaKind::Playlist).await,
            Err(FetchError::EmptyPlaylist)
        );
    }

    #[tokio::test]
    async fn test_playlist_samples_first_member_and_keeps_placeholders() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_playlist(PLAYLIST, "Mix", &[VIDEO, SECOND, THIRD])
                .with_item(VIDEO, item("One", vec![progressive("18", 360), progressive("22", 720)]))
                .with_item(SECOND, item("Two", vec![progressive("37", 1080)]))
                .with_item(THIRD, item("Three", vec![progressive("18", 360)]))
                .failing_title(SECOND),
        );
        let (fetch, mut receiver) = coordinator(provider);

        let target = fetch.resolve(PLAYLIST, MediaKind::Playlist).await.unwrap();
        let ResolvedTarget::Playlist(playlist) = target.as_ref() else {
            panic!("expected a playlist");
        };

        assert_eq!(playlist.title, "Mix");
        // Only the first member's renditions are offered.
        let ids: Vec<&str> = playlist
            .renditions
            .sorted_by_quality()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["22", "18"]);

        assert_eq!(playlist.members.len(), 3);
        assert_eq!(playlist.members[0], PlaylistItem::new("One", VIDEO));
        assert_eq!(playlist.members[1], PlaylistItem::placeholder(2, SECOND));
        assert!(!playlist.members[1].title_resolved);
        assert_eq!(playlist.members[2], PlaylistItem::new("Three", THIRD));

        let lines = log_lines(&mut receiver);
        assert!(lines.iter().any(|l| l.starts_with("[2/3] WARNING")));
    }

    #[tokio::test]
    async fn test_superseded_fetch_is_not_published() {
        let mut provider = ScriptedProvider::new()
            .with_item(VIDEO, item("Old", vec![progressive("18", 360)]))
            .with_item(SECOND, item("New", vec![progressive("22", 720)]));
        let gate = provider.hold(VIDEO);
        let provider = Arc::new(provider);
        let (fetch, _receiver) = coordinator(provider.clone());

        let slow = fetch.spawn(VIDEO.to_string(), MediaKind::Video);
        while provider.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let newer = fetch.resolve(SECOND, MediaKind::Video).await.unwrap();
        gate.notify_one();
        let older = slow.await.unwrap().unwrap();

        assert_eq!(older.title(), "Old");
        assert_eq!(fetch.latest().map(|t| t.title().to_string()), Some("New".to_string()));
        assert_eq!(fetch.latest(), Some(newer));
    }

    #[tokio::test]
    async fn test_spawn_aborts_running_fetch() {
        let mut provider = ScriptedProvider::new()
            .with_item(VIDEO, item("Old", vec![progressive("18", 360)]))
            .with_item(SECOND, item("New", vec![progressive("22", 720)]));
        let gate = provider.hold(VIDEO);
        let provider = Arc::new(provider);
        let (fetch, _receiver) = coordinator(provider.clone());

        let slow = fetch.spawn(VIDEO.to_string(), MediaKind::Video);
        while provider.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(provider.in_flight(), 1);

        let newer = fetch.spawn(SECOND.to_string(), MediaKind::Video);
        let aborted = slow.await.unwrap_err();
        assert!(aborted.is_cancelled());
        assert_eq!(provider.in_flight(), 0);

        let newer = newer.await.unwrap().unwrap();
        assert_eq!(newer.title(), "New");
        assert_eq!(fetch.latest(), Some(newer));

        // Releasing the gate afterwards changes nothing.
        gate.notify_one();
        tokio::task::yield_now().await;
        assert_eq!(fetch.latest().map(|t| t.title().to_string()), Some("New".to_string()));
    }

    #[tokio::test]
    async fn test_new_fetch_clears_previous_result() {
        let provider = Arc::new(
            ScriptedProvider::new().with_item(VIDEO, item("Clip", vec![progressive("18", 360)])),
        );
        let (fetch, _receiver) = coordinator(provider);

        fetch.resolve(VIDEO, MediaKind::Video).await.unwrap();
        assert!(fetch.latest().is_some());

        let _ = fetch.resolve("nope", MediaKind::Video).await;
        assert!(fetch.latest().is_none());
    }
}
