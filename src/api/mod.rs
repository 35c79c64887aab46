pub mod client;
pub mod models;
pub mod provider;

pub use client::YtDlpProvider;
pub use provider::MediaProvider;
