use std::path::PathBuf;
use std::sync::Arc;

use futures::{
    stream::{self, BoxStream},
    StreamExt,
};

use super::directory::{rendezvous, DirectoryRequests, DirectorySelector};
use super::download_coordinator::DownloadCoordinator;
use super::events::{channel, EventReceiver, EventSink};
use super::fetch_coordinator::FetchCoordinator;
use super::progress::ProgressReporter;
use crate::{
    api::MediaProvider,
    config::AppConfig,
    domain::{
        DownloadError, DownloadOutcome, DownloadRequest, DownloadTarget, FetchError, MediaKind,
        PlaylistItem, PlaylistSelection, RenditionSelector, ResolvedTarget,
    },
};

/// The ends of the channels that belong to the interactive side.
#[derive(Debug)]
pub struct PresentationHandles {
    pub events: EventReceiver,
    pub directory_requests: DirectoryRequests,
}

/// What the user picked for a download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSelection {
    pub rendition: RenditionSelector,
    /// Playlist members in selection order; `None` means every member.
    pub members: Option<Vec<PlaylistItem>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadUpdate {
    Started { destination: PathBuf, items: usize },
    Outcome(DownloadOutcome),
    Finished { title: String },
    Aborted(DownloadError),
}

struct Prepared {
    destination: PathBuf,
    items: usize,
    title: String,
    outcomes: BoxStream<'static, DownloadOutcome>,
}

/// Wires the coordinators to one provider and one event channel.
#[derive(Clone)]
pub struct Orchestrator {
    fetch: FetchCoordinator,
    downloads: DownloadCoordinator,
    directories: DirectorySelector,
    events: EventSink,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn MediaProvider>, config: &AppConfig) -> (Self, PresentationHandles) {
        let (events, receiver) = channel(config.event_capacity);
        let (directories, directory_requests) = rendezvous();

        let orchestrator = Self {
            fetch: FetchCoordinator::new(
                provider.clone(),
                events.clone(),
                config.accepted_hosts.clone(),
            ),
            downloads: DownloadCoordinator::new(provider, events.clone()),
            directories,
            events,
        };

        (
            orchestrator,
            PresentationHandles {
                events: receiver,
                directory_requests,
            },
        )
    }

    pub async fn resolve(
        &self,
        url: String,
        kind: MediaKind,
    ) -> Result<Arc<ResolvedTarget>, FetchError> {
        match self.fetch.spawn(url, kind).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(FetchError::Superseded),
            Err(e) => {
                tracing::error!(error = %e, "fetch task did not complete");
                Err(FetchError::ConnectionFailed(e.to_string()))
            }
        }
    }

    pub fn latest(&self) -> Option<Arc<ResolvedTarget>> {
        self.fetch.latest()
    }

    pub async fn request_directory(&self) -> Option<PathBuf> {
        self.directories.request_directory().await
    }

    /// Asks for a destination, then downloads the latest resolved target.
    ///
    /// The stream starts with `Started` and ends with `Finished`, or is a
    /// single `Aborted` when the run could not begin.
    pub fn start_download(&self, selection: DownloadSelection) -> BoxStream<'static, DownloadUpdate> {
        let this = self.clone();

        stream::once(async move { this.prepare(selection).await })
            .flat_map(|prepared| match prepared {
                Ok(Prepared {
                    destination,
                    items,
                    title,
                    outcomes,
                }) => stream::iter([DownloadUpdate::Started { destination, items }])
                    .chain(outcomes.map(DownloadUpdate::Outcome))
                    .chain(stream::iter([DownloadUpdate::Finished { title }]))
                    .boxed(),
                Err(e) => stream::iter([DownloadUpdate::Aborted(e)]).boxed(),
            })
            .boxed()
    }

    async fn prepare(&self, selection: DownloadSelection) -> Result<Prepared, DownloadError> {
        let Some(target) = self.fetch.latest() else {
            self.events
                .error("Error: Please fetch a URL before downloading.")
                .await;
            return Err(DownloadError::NothingResolved);
        };

        self.events
            .info("Please select a directory to save your file(s).")
            .await;
        let Some(destination) = self.request_directory().await else {
            self.events
                .warn("Download cancelled: No directory was selected.")
                .await;
            return Err(DownloadError::NoDestinationSelected);
        };
        self.events
            .info(format!("Files will be saved to: {}", destination.display()))
            .await;

        let (download_target, items) = match target.as_ref() {
            ResolvedTarget::Single(item) => (DownloadTarget::Single(item.clone()), 1),
            ResolvedTarget::Playlist(playlist) => {
                let members = selection
                    .members
                    .unwrap_or_else(|| playlist.members.clone());
                let items = members.len();
                (
                    DownloadTarget::Playlist(PlaylistSelection {
                        title: playlist.title.clone(),
                        renditions: playlist.renditions.clone(),
                        members,
                    }),
                    items,
                )
            }
        };

        let request = DownloadRequest {
            target: download_target,
            rendition: selection.rendition,
            destination_dir: destination.clone(),
        };

        let outcomes = match self
            .downloads
            .run(request, ProgressReporter::new(self.events.clone()))
        {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.events.error(format!("Error: {}", e)).await;
                return Err(e);
            }
        };

        Ok(Prepared {
            destination,
            items,
            title: target.title().to_string(),
            outcomes,
        })
    }
}
