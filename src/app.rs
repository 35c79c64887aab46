use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use iced::{Subscription, Task};

use crate::api::MediaProvider;
use crate::application::{
    DirectoryRequests, DownloadSelection, DownloadUpdate, EventReceiver, Orchestrator,
    OrchestratorEvent,
};
use crate::config::AppConfig;
use crate::domain::{
    DownloadError, FetchError, MediaKind, RenditionSelector, ResolvedTarget,
};
use crate::ui::{DownloadMessage, DownloadView};

/// URLs this short are never sent to the provider.
const MIN_FETCH_CHARS: usize = 11;

pub struct DownloadApp {
    view: DownloadView,
    orchestrator: Orchestrator,
    events: EventReceiver,
    directory_requests: DirectoryRequests,
    poll_interval: Duration,
    // Bumped per fetch; results carrying an older value are stale.
    fetch_seq: u64,
    // Outcome counts for the running download: (total, failed)
    outcomes: (usize, usize),
}

impl DownloadApp {
    pub fn new(provider: Arc<dyn MediaProvider>, config: &AppConfig) -> Self {
        let (orchestrator, handles) = Orchestrator::new(provider, config);

        Self {
            view: DownloadView::default(),
            orchestrator,
            events: handles.events,
            directory_requests: handles.directory_requests,
            poll_interval: config.poll_interval(),
            fetch_seq: 0,
            outcomes: (0, 0),
        }
    }

    fn fetch(&mut self) -> Task<Message> {
        let url = self.view.url.trim().to_string();
        if url.chars().count() < MIN_FETCH_CHARS || self.view.is_downloading {
            return Task::none();
        }

        self.fetch_seq += 1;
        self.view.is_fetching = true;
        self.view.status_message = "Fetching details...".to_string();

        let orchestrator = self.orchestrator.clone();
        let kind = self.view.mode;
        let seq = self.fetch_seq;
        Task::perform(
            async move { orchestrator.resolve(url, kind).await },
            move |result| Message::Resolved(seq, result),
        )
    }

    fn start_download(&mut self) -> Task<Message> {
        let Some(label) = self.view.selected_quality.clone() else {
            return Task::none();
        };
        let members = if self.view.mode == MediaKind::Playlist {
            let picked = self.view.picked_members();
            if picked.is_empty() {
                self.view.status_message = "Please select at least one video.".to_string();
                return Task::none();
            }
            Some(picked)
        } else {
            None
        };

        self.view.is_downloading = true;
        self.outcomes = (0, 0);

        let selection = DownloadSelection {
            rendition: RenditionSelector::Label(label),
            members,
        };
        Task::stream(
            self.orchestrator
                .start_download(selection)
                .map(Message::Download),
        )
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    /// Drain background events and serve directory requests
    Tick,
    Resolved(u64, Result<Arc<ResolvedTarget>, FetchError>),
    Download(DownloadUpdate),
    DirectoryAnswered,
    DialogClosed,
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::UrlPasted(_)
                | DownloadMessage::UrlSubmitted
                | DownloadMessage::ModeSelected(_) => {
                    return app.fetch();
                }
                DownloadMessage::DownloadPressed => return app.start_download(),
                _ => {}
            }
        }
        Message::Tick => {
            while let Some(event) = app.events.try_next() {
                match event {
                    OrchestratorEvent::Log(entry) => app.view.push_log(entry.level, entry.to_string()),
                    OrchestratorEvent::Progress(progress) => app.view.progress = progress,
                }
            }

            if let Some(request) = app.directory_requests.try_next() {
                return Task::perform(
                    async move {
                        let choice = rfd::AsyncFileDialog::new()
                            .set_title("Select a directory to save your file(s)")
                            .pick_folder()
                            .await
                            .map(|handle| handle.path().to_path_buf());
                        request.respond(choice);
                    },
                    |_| Message::DirectoryAnswered,
                );
            }
        }
        Message::Resolved(seq, result) => {
            // Results of superseded fetches are ignored.
            if seq != app.fetch_seq {
                return Task::none();
            }

            match result {
                Ok(target) => {
                    app.view.is_fetching = false;
                    app.view.show_target(&target);
                }
                Err(FetchError::Superseded) => {}
                Err(e) => {
                    app.view.is_fetching = false;
                    app.view.status_message = "Could not fetch details".to_string();
                    return show_dialog(Notice::error("Error", e.to_string()));
                }
            }
        }
        Message::Download(update) => match update {
            DownloadUpdate::Started { destination, items } => {
                app.view.status_message =
                    format!("Downloading {} item(s) to {}", items, destination.display());
            }
            DownloadUpdate::Outcome(outcome) => {
                app.outcomes.0 += 1;
                if outcome.is_failure() {
                    app.outcomes.1 += 1;
                }
            }
            DownloadUpdate::Finished { title } => {
                app.view.is_downloading = false;
                let (total, failed) = app.outcomes;
                app.view.status_message = format!("Finished: {}", title);
                return show_dialog(completion_notice(&title, total, failed));
            }
            DownloadUpdate::Aborted(e) => {
                app.view.is_downloading = false;
                app.view.status_message = e.to_string();
                if e != DownloadError::NoDestinationSelected {
                    return show_dialog(Notice::error("Error", e.to_string()));
                }
            }
        },
        Message::DirectoryAnswered | Message::DialogClosed => {}
    }
    Task::none()
}

/// A blocking message box.
struct Notice {
    level: rfd::MessageLevel,
    title: &'static str,
    description: String,
}

impl Notice {
    fn error(title: &'static str, description: String) -> Self {
        Self {
            level: rfd::MessageLevel::Error,
            title,
            description,
        }
    }
}

/// Only a run without failures is reported as a success.
fn completion_notice(title: &str, total: usize, failed: usize) -> Notice {
    if failed == 0 {
        Notice {
            level: rfd::MessageLevel::Info,
            title: "Success",
            description: format!("Finished downloading '{}'.", title),
        }
    } else if failed >= total {
        Notice::error(
            "Download Error",
            format!("Could not download '{}'. See the log for details.", title),
        )
    } else {
        Notice {
            level: rfd::MessageLevel::Warning,
            title: "Download Finished",
            description: format!(
                "Finished downloading '{}'. {} of {} item(s) failed, see the log.",
                title, failed, total
            ),
        }
    }
}

fn show_dialog(notice: Notice) -> Task<Message> {
    Task::perform(
        async move {
            rfd::AsyncMessageDialog::new()
                .set_level(notice.level)
                .set_title(notice.title)
                .set_description(notice.description)
                .show()
                .await;
        },
        |_| Message::DialogClosed,
    )
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}

pub fn subscription(app: &DownloadApp) -> Subscription<Message> {
    iced::time::every(app.poll_interval).map(|_| Message::Tick)
}
