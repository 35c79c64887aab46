mod api;
mod app;
mod application;
mod config;
mod domain;
mod ui;
mod utils;

use std::sync::Arc;

use api::{MediaProvider, YtDlpProvider};
use config::AppConfig;

fn main() -> iced::Result {
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    utils::logging::init_tracing(&config.log_filter);
    if let Some(e) = config_error {
        tracing::warn!(error = %e, "falling back to default configuration");
    }

    let provider: Arc<dyn MediaProvider> = match YtDlpProvider::new(config.provider.clone()) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            tracing::error!(error = %e, "could not set up the media provider");
            std::process::exit(1);
        }
    };
    tracing::info!(ytdlp = %config.provider.ytdlp_path, "starting");

    iced::application(
        move || app::DownloadApp::new(provider.clone(), &config),
        app::update,
        app::view,
    )
    .subscription(app::subscription)
    .title("TubeFetch")
    .run()
}
