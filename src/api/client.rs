use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream::BoxStream, Stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::models::{YtDlpInfo, YtDlpPlaylist};
use super::provider::{MediaProvider, ProgressCallback, ProviderError, Result};
use crate::config::ProviderConfig;
use crate::domain::{Rendition, SourceItem, SourcePlaylist};

/// Media provider backed by the `yt-dlp` binary for metadata and plain HTTP
/// for the byte transfer.
#[derive(Clone)]
pub struct YtDlpProvider {
    config: ProviderConfig,
    http: Client,
}

impl YtDlpProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        let http = builder.build()?;

        Ok(Self { config, http })
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.socket_timeout_secs.to_string(),
            "--user-agent".to_string(),
            self.config.user_agent.clone(),
        ];
        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        args
    }

    async fn run_ytdlp(&self, extra: &[&str], url: &str) -> Result<Vec<u8>> {
        let mut args = self.base_args();
        args.extend(extra.iter().map(|a| a.to_string()));
        args.push(url.to_string());

        tracing::debug!(binary = %self.config.ytdlp_path, ?args, "running yt-dlp");

        let output = Command::new(&self.config.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ProviderError::ToolFailed(format!(
                    "could not run {}: {}",
                    self.config.ytdlp_path, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            return Err(ProviderError::ToolFailed(if message.is_empty() {
                format!("exited with {}", output.status)
            } else {
                message.to_string()
            }));
        }

        Ok(output.stdout)
    }

    async fn dump_item(&self, url: &str) -> Result<YtDlpInfo> {
        let stdout = self
            .run_ytdlp(&["--dump-single-json", "--no-playlist"], url)
            .await?;
        serde_json::from_slice(&stdout)
            .map_err(|e| ProviderError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    /// Open a streaming GET on a direct media URL.
    /// Returns (total_size, stream)
    pub async fn download_file_stream(
        &self,
        download_url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<(Option<u64>, BoxStream<'static, Result<Bytes>>)> {
        let response = self
            .http
            .get(download_url)
            .headers(header_map(headers))
            .send()
            .await?
            .error_for_status()?;

        let total_size = response.content_length();
        let stream = response.bytes_stream().map_err(ProviderError::Request);

        Ok((total_size, stream.boxed()))
    }
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    async fn resolve_item(&self, url: &str) -> Result<SourceItem> {
        Ok(self.dump_item(url).await?.to_source_item())
    }

    async fn resolve_playlist(&self, url: &str) -> Result<SourcePlaylist> {
        let stdout = self
            .run_ytdlp(&["--flat-playlist", "--dump-single-json"], url)
            .await?;
        let playlist: YtDlpPlaylist = serde_json::from_slice(&stdout)
            .map_err(|e| ProviderError::InvalidResponse(format!("JSON decode error: {}", e)))?;
        Ok(playlist.to_source_playlist())
    }

    async fn resolve_title(&self, url: &str) -> Result<String> {
        let stdout = self
            .run_ytdlp(&["--no-playlist", "--print", "title"], url)
            .await?;
        let title = String::from_utf8_lossy(&stdout).trim().to_string();
        if title.is_empty() {
            return Err(ProviderError::InvalidResponse("empty title".to_string()));
        }
        Ok(title)
    }

    async fn download(
        &self,
        source_url: &str,
        rendition: &Rendition,
        output_dir: &Path,
        filename: &str,
        on_progress: ProgressCallback<'_>,
    ) -> Result<PathBuf> {
        // Direct stream URLs expire, so they are looked up right before the transfer.
        let info = self.dump_item(source_url).await?;
        let format = info
            .format(&rendition.id)
            .ok_or_else(|| ProviderError::UnknownRendition(rendition.id.clone()))?;
        let media_url = format
            .url
            .as_deref()
            .ok_or_else(|| ProviderError::NoStreamUrl(rendition.id.clone()))?;

        let (content_length, stream) = self
            .download_file_stream(media_url, &format.http_headers)
            .await?;
        let total = content_length.or(format.filesize);

        let target = output_dir.join(filename);
        write_stream_to_file(stream, total, &target, on_progress).await?;

        Ok(target)
    }
}

fn header_map(headers: &HashMap<String, String>) -> HeaderMap {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
            let value = HeaderValue::from_str(value).ok()?;
            Some((name, value))
        })
        .collect()
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Stream chunks into `target` through a `.part` file that is renamed on
/// success and removed on failure. Returns the number of bytes written.
pub async fn write_stream_to_file<S>(
    mut stream: S,
    total: Option<u64>,
    target: &Path,
    on_progress: ProgressCallback<'_>,
) -> Result<u64>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let partial = partial_path(target);

    let written = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        let total_bytes = total.unwrap_or(0);
        let mut downloaded = 0u64;
        on_progress(total_bytes, total_bytes);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            on_progress(total_bytes, total_bytes.saturating_sub(downloaded));
        }

        file.sync_all().await?;
        on_progress(total.unwrap_or(downloaded), 0);
        Ok::<u64, ProviderError>(downloaded)
    }
    .await;

    match written {
        Ok(bytes) => {
            tokio::fs::rename(&partial, target).await?;
            Ok(bytes)
        }
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                tracing::debug!(path = %partial.display(), "could not remove partial file: {}", cleanup);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> YtDlpProvider {
        YtDlpProvider::new(ProviderConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_stream_download_writes_file_and_reports_progress() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/media")
            .match_header("x-token", "abc")
            .with_status(200)
            .with_body("hello world")
            .create_async()
            .await;

        let headers = HashMap::from([("X-Token".to_string(), "abc".to_string())]);
        let (total, stream) = provider()
            .download_file_stream(&format!("{}/media", server.url()), &headers)
            .await
            .unwrap();
        assert_eq!(total, Some(11));

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("1-clip-360p.mp4");
        let mut events = Vec::new();
        let written = write_stream_to_file(stream, total, &target, &mut |t, r| {
            events.push((t, r))
        })
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(written, 11);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello world");
        assert!(!partial_path(&target).exists());
        assert_eq!(events.first(), Some(&(11, 11)));
        assert_eq!(events.last(), Some(&(11, 0)));
        assert!(events.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gone")
            .with_status(403)
            .create_async()
            .await;

        let result = provider()
            .download_file_stream(&format!("{}/gone", server.url()), &HashMap::new())
            .await;
        assert!(matches!(result, Err(ProviderError::Request(_))));
    }

    #[tokio::test]
    async fn test_failed_stream_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("broken.mp4");
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(ProviderError::InvalidResponse("connection reset".to_string())),
        ];

        let result =
            write_stream_to_file(futures::stream::iter(chunks), Some(10), &target, &mut |_, _| {})
                .await;

        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
        assert!(!target.exists());
        assert!(!partial_path(&target).exists());
    }

    #[tokio::test]
    async fn test_unknown_length_still_finishes_at_zero_remaining() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("unknown.mp3");
        let chunks: Vec<Result<Bytes>> = vec![Ok(Bytes::from_static(b"1234"))];

        let mut last = None;
        write_stream_to_file(futures::stream::iter(chunks), None, &target, &mut |t, r| {
            last = Some((t, r))
        })
        .await
        .unwrap();

        assert_eq!(last, Some((4, 0)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_tool_failure() {
        let provider = YtDlpProvider::new(ProviderConfig {
            ytdlp_path: "/nonexistent/yt-dlp-binary".to_string(),
            ..ProviderConfig::default()
        })
        .unwrap();

        let result = provider
            .resolve_item("https://www.youtube.com/watch?v=abc")
            .await;
        assert!(matches!(result, Err(ProviderError::ToolFailed(_))));
    }
}
