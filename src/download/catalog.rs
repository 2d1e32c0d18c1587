//! Downloadable format catalog.
//!
//! Turns reconciled formats into the serializable entries clients render
//! and submit back. Field names are part of the wire contract and must
//! stay stable across releases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::download::reconcile::{FormatKind, Reconciled, ReconciledFormat};

/// Kind of download a catalog entry (or submitted request) represents.
///
/// The serialized names are the wire contract shared with clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadKind {
    #[serde(rename = "combined_format")]
    Combined,
    #[serde(rename = "enhanced_format")]
    Enhanced,
    #[serde(rename = "video_only")]
    VideoOnly,
    #[serde(rename = "audio_only")]
    AudioOnly,
    /// Client-requested download of an audio stream by plain selector,
    /// without going through the catalog. Never emitted by the catalog
    /// builder; delivered as MP3 like [`DownloadKind::AudioOnly`].
    #[serde(rename = "raw")]
    RawAudio,
}

impl DownloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadKind::Combined => "combined_format",
            DownloadKind::Enhanced => "enhanced_format",
            DownloadKind::VideoOnly => "video_only",
            DownloadKind::AudioOnly => "audio_only",
            DownloadKind::RawAudio => "raw",
        }
    }

    /// Audio downloads are delivered as MP3 and need a transcode step.
    pub fn transcodes_to_mp3(&self) -> bool {
        matches!(self, DownloadKind::AudioOnly | DownloadKind::RawAudio)
    }
}

impl fmt::Display for DownloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "combined_format" => Ok(DownloadKind::Combined),
            "enhanced_format" => Ok(DownloadKind::Enhanced),
            "video_only" => Ok(DownloadKind::VideoOnly),
            "audio_only" => Ok(DownloadKind::AudioOnly),
            "raw" => Ok(DownloadKind::RawAudio),
            other => Err(format!("Unknown download type: {other}")),
        }
    }
}

impl From<FormatKind> for DownloadKind {
    fn from(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Combined => DownloadKind::Combined,
            FormatKind::Enhanced => DownloadKind::Enhanced,
            FormatKind::VideoOnly => DownloadKind::VideoOnly,
            FormatKind::AudioOnly => DownloadKind::AudioOnly,
        }
    }
}

/// One presentable download option.
///
/// `format_id` carries the reconciled selector (single id, `"{v}+{a}"`
/// pairing, or `"{id}_audio"` synthesized track) and is what clients send
/// back when starting a download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub format_id: String,
    pub ext: String,
    pub resolution: String,
    pub resolution_precise: String,
    pub filesize: u64,
    pub vcodec: String,
    pub acodec: String,
    pub fps: f64,
    pub height: u32,
    pub width: u32,
    pub download_type: DownloadKind,
    pub description: String,
    pub abr: f64,
    pub quality: String,
    pub audio_info: String,
    pub has_audio: bool,
}

/// Builds the full catalog from a reconciliation result: video variants in
/// reconciler order first, audio variants appended after.
///
/// This function never fails. Malformed inputs degrade to an empty catalog
/// (with a log line) rather than poisoning the surrounding media info.
pub fn build_catalog(reconciled: &Reconciled) -> Vec<CatalogEntry> {
    let mut entries = Vec::with_capacity(reconciled.video.len() + reconciled.audio.len());
    for fmt in &reconciled.video {
        entries.push(video_entry(fmt));
    }
    for fmt in &reconciled.audio {
        match audio_entry(fmt) {
            Some(entry) => entries.push(entry),
            None => log::debug!("Skipping audio format {} without a usable codec", fmt.selector),
        }
    }
    entries
}

fn video_entry(fmt: &ReconciledFormat) -> CatalogEntry {
    let resolution = resolution_label(fmt.height, fmt.width, fmt.fps);
    let size_label = size_label(fmt.filesize);

    let mut description = match fmt.kind {
        FormatKind::Enhanced => format!("{resolution} + Audio (Enhanced) - {size_label}"),
        FormatKind::Combined => format!("{resolution} + Audio - {size_label}"),
        _ => format!("{resolution} - {size_label} (No Audio)"),
    };
    if fmt.has_audio() && fmt.abr > 0.0 {
        description.push_str(&format!(" ({}kbps audio)", fmt.abr));
    }
    let ext = fmt.ext.clone().unwrap_or_else(|| "mp4".to_string());
    description.push_str(&format!(" (.{ext})"));

    let audio_info = if fmt.has_audio() {
        match (&fmt.acodec, fmt.abr) {
            (Some(acodec), abr) if abr > 0.0 => format!("{abr}kbps ({acodec})"),
            (Some(acodec), _) => acodec.clone(),
            (None, _) => "N/A".to_string(),
        }
    } else {
        "No Audio".to_string()
    };

    CatalogEntry {
        format_id: fmt.selector.clone(),
        ext,
        resolution_precise: if fmt.width > 0 && fmt.height > 0 {
            format!("{}x{}", fmt.width, fmt.height)
        } else {
            "Unknown".to_string()
        },
        filesize: fmt.filesize,
        vcodec: fmt.vcodec.clone().unwrap_or_else(|| "Unknown".to_string()),
        acodec: fmt.acodec.clone().unwrap_or_else(|| "none".to_string()),
        fps: fmt.fps,
        height: fmt.height,
        width: fmt.width,
        download_type: fmt.kind.into(),
        description,
        abr: fmt.abr,
        quality: resolution.clone(),
        audio_info,
        has_audio: fmt.has_audio(),
        resolution,
    }
}

fn audio_entry(fmt: &ReconciledFormat) -> Option<CatalogEntry> {
    let acodec = match fmt.acodec.as_deref() {
        Some(c) if !c.is_empty() && c != "none" => c.to_string(),
        _ => return None,
    };

    let quality = if fmt.abr > 0.0 {
        format!("{:.0}kbps", fmt.abr)
    } else {
        "Audio Only".to_string()
    };
    let size_label = size_label(fmt.filesize);
    let audio_info = if fmt.abr > 0.0 {
        format!("{}kbps ({acodec})", fmt.abr)
    } else {
        acodec.clone()
    };

    Some(CatalogEntry {
        format_id: fmt.selector.clone(),
        // Audio tracks are always delivered as MP3
        ext: "mp3".to_string(),
        resolution: "Audio Only".to_string(),
        resolution_precise: "Audio Only".to_string(),
        filesize: fmt.filesize,
        vcodec: "none".to_string(),
        acodec,
        fps: 0.0,
        height: 0,
        width: 0,
        download_type: DownloadKind::AudioOnly,
        description: format!("Audio Only - {quality} - {size_label} (.mp3)"),
        abr: fmt.abr,
        quality,
        audio_info,
        has_audio: true,
    })
}

fn resolution_label(height: u32, width: u32, fps: f64) -> String {
    if height > 0 && width > 0 {
        let mut label = format!("{height}p");
        if fps > 0.0 {
            label.push_str(&format!(" ({fps:.0}fps)"));
        }
        label
    } else {
        "Unknown".to_string()
    }
}

fn size_label(filesize: u64) -> String {
    if filesize > 0 {
        let size_mb = filesize as f64 / (1024.0 * 1024.0);
        format!("{size_mb:.1}MB")
    } else {
        "Unknown size".to_string()
    }
}
