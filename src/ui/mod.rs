use iced::{
    widget::{button, column, pick_list, progress_bar, radio, row, scrollable, text, text_input, Column, Space},
    Color, Element, Length,
};

use crate::application::LogLevel;
use crate::domain::{MediaKind, PlaylistItem, ResolvedTarget};

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub mode: MediaKind,
    pub qualities: Vec<String>,
    pub selected_quality: Option<String>,
    pub members: Vec<PlaylistItem>,
    /// Indices into `members`, in the order they were picked
    pub selected_members: Vec<usize>,
    pub progress: f32,
    pub logs: Vec<(LogLevel, String)>,
    pub status_message: String,
    pub is_fetching: bool,
    pub is_downloading: bool,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            url: String::new(),
            mode: MediaKind::default(),
            qualities: Vec::new(),
            selected_quality: None,
            members: Vec::new(),
            selected_members: Vec::new(),
            progress: 0.0,
            logs: Vec::new(),
            status_message: "Paste a URL to get started".to_string(),
            is_fetching: false,
            is_downloading: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    UrlPasted(String),
    UrlSubmitted,
    ModeSelected(MediaKind),
    QualitySelected(String),
    MemberToggled(usize),
    SelectAll,
    ClearSelection,
    DownloadPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) | DownloadMessage::UrlPasted(url) => {
                self.url = url;
                self.clear_target();
            }
            DownloadMessage::UrlSubmitted => {}
            DownloadMessage::ModeSelected(mode) => {
                if self.mode != mode {
                    self.mode = mode;
                    self.clear_target();
                }
            }
            DownloadMessage::QualitySelected(label) => {
                self.selected_quality = Some(label);
            }
            DownloadMessage::MemberToggled(index) => {
                if let Some(pos) = self.selected_members.iter().position(|i| *i == index) {
                    self.selected_members.remove(pos);
                } else if index < self.members.len() {
                    self.selected_members.push(index);
                }
            }
            DownloadMessage::SelectAll => {
                for index in 0..self.members.len() {
                    if !self.selected_members.contains(&index) {
                        self.selected_members.push(index);
                    }
                }
            }
            DownloadMessage::ClearSelection => self.selected_members.clear(),
            DownloadMessage::DownloadPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn clear_target(&mut self) {
        self.qualities.clear();
        self.selected_quality = None;
        self.members.clear();
        self.selected_members.clear();
        self.progress = 0.0;
    }

    pub fn show_target(&mut self, target: &ResolvedTarget) {
        self.qualities = target.renditions().labels();
        self.selected_quality = self.qualities.first().cloned();
        self.selected_members.clear();
        self.members = match target {
            ResolvedTarget::Single(_) => Vec::new(),
            ResolvedTarget::Playlist(playlist) => playlist.members.clone(),
        };
        self.status_message = format!("Ready: {}", target.title());
    }

    pub fn push_log(&mut self, level: LogLevel, line: impl Into<String>) {
        self.logs.push((level, line.into()));
    }

    /// Picked members, in pick order.
    pub fn picked_members(&self) -> Vec<PlaylistItem> {
        self.selected_members
            .iter()
            .filter_map(|i| self.members.get(*i).cloned())
            .collect()
    }

    fn can_download(&self) -> bool {
        !self.is_downloading
            && !self.is_fetching
            && self.selected_quality.is_some()
            && (self.mode != MediaKind::Playlist || !self.selected_members.is_empty())
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let modes = MediaKind::ALL.iter().fold(row![].spacing(20), |modes, kind| {
            modes.push(radio(
                kind.to_string(),
                *kind,
                Some(self.mode),
                DownloadMessage::ModeSelected,
            ))
        });

        let members = Column::with_children(self.members.iter().enumerate().map(|(index, member)| {
            let marker = match self.selected_members.iter().position(|i| *i == index) {
                Some(order) => format!("[{}]", order + 1),
                None => "[ ]".to_string(),
            };
            button(text(format!("{} {}", marker, member.title)).size(13))
                .on_press(DownloadMessage::MemberToggled(index))
                .width(Length::Fill)
                .into()
        }))
        .spacing(2);

        let playlist_controls = row![
            button("Select all").on_press(DownloadMessage::SelectAll),
            button("Clear").on_press(DownloadMessage::ClearSelection),
        ]
        .spacing(10);

        let logs = Column::with_children(self.logs.iter().map(|(level, line)| {
            let color = match level {
                LogLevel::Info => None,
                LogLevel::Warn => Some(Color::from_rgb(0.85, 0.55, 0.0)),
                LogLevel::Error => Some(Color::from_rgb(0.8, 0.1, 0.1)),
            };
            text(line).size(12).color_maybe(color).into()
        }));

        let mut content = column![
            text("Video Downloader").size(32),
            Space::new().height(Length::Fixed(10.0)),
            modes,
            text("URL:").size(16),
            text_input("Paste a video or playlist URL...", &self.url)
                .on_input(DownloadMessage::UrlChanged)
                .on_paste(DownloadMessage::UrlPasted)
                .on_submit(DownloadMessage::UrlSubmitted)
                .padding(10),
            pick_list(
                self.qualities.as_slice(),
                self.selected_quality.clone(),
                DownloadMessage::QualitySelected,
            )
            .placeholder("Select a quality"),
        ]
        .padding(20)
        .spacing(10);

        if self.mode == MediaKind::Playlist && !self.members.is_empty() {
            content = content
                .push(playlist_controls)
                .push(scrollable(members).height(Length::Fixed(160.0)));
        }

        content
            .push(progress_bar(0.0..=100.0, self.progress))
            .push(text(&self.status_message).size(14))
            .push(scrollable(logs).height(Length::Fill))
            .push(
                button("Download")
                    .on_press_maybe(self.can_download().then_some(DownloadMessage::DownloadPressed))
                    .padding([10, 20]),
            )
            .into()
    }
}
