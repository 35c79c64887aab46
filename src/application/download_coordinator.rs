use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use futures::{stream::BoxStream, StreamExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::events::EventSink;
use super::progress::ProgressReporter;
use crate::{
    api::MediaProvider,
    domain::{
        DownloadError, DownloadOutcome, DownloadRequest, DownloadTarget, MediaItem, PlaylistItem,
        Rendition, RenditionCatalog, RenditionKind, RenditionSelector,
    },
    utils::output_filename,
};

/// Runs download requests, one item at a time, one request at a time.
#[derive(Clone)]
pub struct DownloadCoordinator {
    provider: Arc<dyn MediaProvider>,
    events: EventSink,
    slot: Arc<Semaphore>,
}

impl DownloadCoordinator {
    pub fn new(provider: Arc<dyn MediaProvider>, events: EventSink) -> Self {
        Self {
            provider,
            events,
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Returns a lazy stream yielding one outcome per processed item, in
    /// processing order. Nothing is transferred until the stream is polled.
    pub fn run(
        &self,
        request: DownloadRequest,
        progress: ProgressReporter,
    ) -> Result<BoxStream<'static, DownloadOutcome>, DownloadError> {
        let permit = self
            .slot
            .clone()
            .try_acquire_owned()
            .map_err(|_| DownloadError::AlreadyRunning)?;

        let DownloadRequest {
            target,
            rendition,
            destination_dir,
        } = request;

        let (jobs, playlist_title) = match target {
            DownloadTarget::Single(item) => (VecDeque::from([Job::Single(item)]), None),
            DownloadTarget::Playlist(selection) => {
                let requested = requested_for_playlist(&selection.renditions, &rendition)?;
                let jobs = selection
                    .members
                    .into_iter()
                    .map(|member| Job::Member {
                        member,
                        requested: requested.clone(),
                    })
                    .collect();
                (jobs, Some(selection.title))
            }
        };

        let run = RunContext {
            provider: self.provider.clone(),
            events: self.events.clone(),
            progress,
            destination: destination_dir,
            selector: rendition,
            total: jobs.len(),
            jobs,
            processed: 0,
            playlist_title,
            _permit: permit,
        };

        Ok(futures::stream::unfold(RunState::Start(run), |state| async move {
            match state {
                RunState::Start(run) => {
                    if let Some(title) = &run.playlist_title {
                        run.events
                            .info(format!("--- Starting playlist download: '{}' ---", title))
                            .await;
                    }
                    if run.jobs.is_empty() {
                        run.finish().await;
                        return None;
                    }
                    run.step().await
                }
                RunState::Running(run) => run.step().await,
                RunState::Finished => None,
            }
        })
        .boxed())
    }
}

/// Rendition requested for every playlist member, as (id, label shown to the user).
#[derive(Debug, Clone)]
struct Requested {
    id: String,
    label: String,
}

/// Labels only make sense against the sampled catalog, so they are turned
/// into an id before any member is touched.
fn requested_for_playlist(
    sampled: &RenditionCatalog,
    selector: &RenditionSelector,
) -> Result<Requested, DownloadError> {
    match selector {
        RenditionSelector::Id(id) => Ok(Requested {
            id: id.clone(),
            label: sampled
                .find_by_id(id)
                .map(|r| r.label.clone())
                .unwrap_or_else(|| id.clone()),
        }),
        RenditionSelector::Label(label) => sampled
            .find_by_label(label)
            .map(|r| Requested {
                id: r.id.clone(),
                label: r.label.clone(),
            })
            .ok_or_else(|| DownloadError::RenditionNotFound(label.clone())),
    }
}

enum Job {
    Single(MediaItem),
    Member {
        member: PlaylistItem,
        requested: Requested,
    },
}

enum RunState {
    Start(RunContext),
    Running(RunContext),
    Finished,
}

struct RunContext {
    provider: Arc<dyn MediaProvider>,
    events: EventSink,
    progress: ProgressReporter,
    destination: PathBuf,
    selector: RenditionSelector,
    jobs: VecDeque<Job>,
    total: usize,
    processed: usize,
    playlist_title: Option<String>,
    // Held until the run is dropped or finished.
    _permit: OwnedSemaphorePermit,
}

impl RunContext {
    async fn step(mut self) -> Option<(DownloadOutcome, RunState)> {
        let job = self.jobs.pop_front()?;
        self.processed += 1;

        let outcome = match job {
            Job::Single(item) => self.download_single(&item).await,
            Job::Member { member, requested } => self.download_member(&member, &requested).await,
        };

        if !self.jobs.is_empty() {
            return Some((outcome, RunState::Running(self)));
        }

        self.finish().await;
        Some((outcome, RunState::Finished))
    }

    async fn finish(&self) {
        if self.playlist_title.is_some() {
            self.events.info("--- Playlist download complete! ---").await;
        }
    }

    async fn download_single(&self, item: &MediaItem) -> DownloadOutcome {
        let Some(rendition) = item.renditions.find(&self.selector).cloned() else {
            self.events
                .error(format!(
                    "Error: Could not find the selected stream for '{}'.",
                    self.selector
                ))
                .await;
            return DownloadOutcome::failed(&item.title, "rendition not found");
        };

        self.progress.reset().await;
        self.events
            .info(format!(
                "Starting {} download for: '{}'",
                match item.kind {
                    RenditionKind::Video => "video",
                    RenditionKind::Audio => "audio",
                },
                item.title
            ))
            .await;

        let filename = output_filename(self.processed, &item.title, &rendition);
        match self.transfer(&item.source_url, &rendition, &filename).await {
            Ok(saved) => {
                self.events
                    .info(format!("SUCCESS: Download complete for '{}'.", item.title))
                    .await;
                DownloadOutcome::success(&item.title, saved)
            }
            Err(reason) => {
                self.events
                    .error(format!(
                        "ERROR: Could not download '{}'. --> {}",
                        item.title, reason
                    ))
                    .await;
                DownloadOutcome::failed(&item.title, reason.to_string())
            }
        }
    }

    async fn download_member(&self, member: &PlaylistItem, requested: &Requested) -> DownloadOutcome {
        let position = format!("[{}/{}]", self.processed, self.total);

        self.progress.reset().await;
        self.events
            .info(format!("{} Downloading: '{}'", position, member.title))
            .await;

        let source = match self.provider.resolve_item(&member.source_url).await {
            Ok(source) => source,
            Err(e) => {
                self.events
                    .error(format!(
                        "{} ERROR: Could not download '{}'. Skipping. --> {}",
                        position, member.title, e
                    ))
                    .await;
                return DownloadOutcome::failed(&member.title, e.to_string());
            }
        };

        let title = if member.title_resolved || source.title.is_empty() {
            member.title.clone()
        } else {
            source.title.clone()
        };

        // Members are only checked against the progressive video filter here,
        // not when the playlist was listed.
        let catalog =
            RenditionCatalog::from_streams(&source.streams, RenditionKind::Video, source.duration_secs);
        let (rendition, fell_back) = match catalog.find_by_id(&requested.id) {
            Some(rendition) => (rendition.clone(), false),
            None => match catalog.best() {
                Some(best) => {
                    self.events
                        .warn(format!(
                            "{} WARNING: Quality '{}' not found for this video. Falling back to '{}'.",
                            position, requested.label, best.label
                        ))
                        .await;
                    (best.clone(), true)
                }
                None => {
                    self.events
                        .error(format!(
                            "{} ERROR: No compatible stream for '{}'. Skipping.",
                            position, title
                        ))
                        .await;
                    return DownloadOutcome::failed(title, "no compatible rendition");
                }
            },
        };

        let filename = output_filename(self.processed, &title, &rendition);
        match self.transfer(&member.source_url, &rendition, &filename).await {
            Ok(saved) => {
                self.events
                    .info(format!("{} SUCCESS: Downloaded '{}'.", position, title))
                    .await;
                if fell_back {
                    DownloadOutcome::fallback(title, rendition.label, saved)
                } else {
                    DownloadOutcome::success(title, saved)
                }
            }
            Err(reason) => {
                self.events
                    .error(format!(
                        "{} ERROR: Could not download '{}'. Skipping. --> {}",
                        position, title, reason
                    ))
                    .await;
                DownloadOutcome::failed(title, reason.to_string())
            }
        }
    }

    /// Returns the file name actually written.
    async fn transfer(
        &self,
        source_url: &str,
        rendition: &Rendition,
        filename: &str,
    ) -> Result<String, DownloadError> {
        tokio::fs::create_dir_all(&self.destination)
            .await
            .map_err(|e| {
                DownloadError::TransferFailed(format!(
                    "could not create {}: {}",
                    self.destination.display(),
                    e
                ))
            })?;

        let progress = &self.progress;
        let mut on_progress = |total: u64, remaining: u64| {
            progress.report(total, remaining);
        };

        let written = self
            .provider
            .download(
                source_url,
                rendition,
                &self.destination,
                filename,
                &mut on_progress,
            )
            .await
            .map_err(|e| DownloadError::TransferFailed(e.to_string()))?;
        self.progress.complete().await;

        Ok(written
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string()))
    }
}
