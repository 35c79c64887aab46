use std::cmp::Ordering;

use super::model::{Rendition, RenditionKind, RenditionSelector, SourceStream};

const BYTES_PER_MB: f64 = (1u64 << 20) as f64;

/// Renditions of one media item, best first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenditionCatalog {
    renditions: Vec<Rendition>,
}

impl RenditionCatalog {
    pub fn new(mut renditions: Vec<Rendition>) -> Self {
        renditions.sort_by(compare_quality);
        Self { renditions }
    }

    /// Keeps the streams matching `kind` and the container preference, and
    /// derives size and label for each without touching the provider data.
    pub fn from_streams(
        streams: &[SourceStream],
        kind: RenditionKind,
        duration_secs: Option<f64>,
    ) -> Self {
        let renditions = streams
            .iter()
            .filter(|stream| is_compatible(stream, kind))
            .filter_map(|stream| {
                let quality = quality_metric(stream, kind)?;
                let size = approximate_size(stream, duration_secs);
                Some(Rendition {
                    id: stream.id.clone(),
                    label: rendition_label(kind, quality, size),
                    kind,
                    quality,
                    container: stream.container.clone(),
                    approximate_size_bytes: size,
                })
            })
            .collect();

        Self::new(renditions)
    }

    pub fn sorted_by_quality(&self) -> &[Rendition] {
        &self.renditions
    }

    pub fn best(&self) -> Option<&Rendition> {
        self.renditions.first()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Rendition> {
        self.renditions.iter().find(|r| r.id == id)
    }

    pub fn find_by_label(&self, label: &str) -> Option<&Rendition> {
        self.renditions.iter().find(|r| r.label == label)
    }

    pub fn find(&self, selector: &RenditionSelector) -> Option<&Rendition> {
        match selector {
            RenditionSelector::Id(id) => self.find_by_id(id),
            RenditionSelector::Label(label) => self.find_by_label(label),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.renditions.iter().map(|r| r.label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.renditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renditions.is_empty()
    }
}

// Higher quality first, then larger size, then id so equal streams order stably.
fn compare_quality(a: &Rendition, b: &Rendition) -> Ordering {
    b.quality
        .cmp(&a.quality)
        .then_with(|| b.approximate_size_bytes.cmp(&a.approximate_size_bytes))
        .then_with(|| a.id.cmp(&b.id))
}

/// Video needs a progressive (muxed) mp4; audio needs an audio-only mp4/m4a.
pub fn is_compatible(stream: &SourceStream, kind: RenditionKind) -> bool {
    let container = stream.container.to_ascii_lowercase();
    match kind {
        RenditionKind::Video => stream.has_video && stream.has_audio && container == "mp4",
        RenditionKind::Audio => {
            !stream.has_video && stream.has_audio && (container == "m4a" || container == "mp4")
        }
    }
}

fn quality_metric(stream: &SourceStream, kind: RenditionKind) -> Option<u32> {
    match kind {
        RenditionKind::Video => stream.height,
        RenditionKind::Audio => stream
            .audio_bitrate_kbps
            .or(stream.total_bitrate_kbps)
            .filter(|kbps| kbps.is_finite() && *kbps > 0.0)
            .map(|kbps| kbps.round() as u32),
    }
}

/// Exact size if known, else the provider's estimate, else bitrate times duration.
pub fn approximate_size(stream: &SourceStream, duration_secs: Option<f64>) -> Option<u64> {
    stream.filesize.or(stream.filesize_approx).or_else(|| {
        let kbps = stream.total_bitrate_kbps.or(stream.audio_bitrate_kbps)? as f64;
        let secs = duration_secs?;
        if kbps <= 0.0 || secs <= 0.0 {
            return None;
        }
        Some((kbps * 1000.0 / 8.0 * secs).round() as u64)
    })
}

fn rendition_label(kind: RenditionKind, quality: u32, size: Option<u64>) -> String {
    match size {
        Some(bytes) => format!(
            "{} - {:.2} MB",
            kind.quality_tag(quality),
            bytes as f64 / BYTES_PER_MB
        ),
        None => format!("{} - size unknown", kind.quality_tag(quality)),
    }
}
