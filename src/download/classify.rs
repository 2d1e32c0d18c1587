//! Stream-format classification.
//!
//! Decides, for one raw yt-dlp format record, whether it carries video and/or
//! audio. Codec fields are authoritative when present; otherwise a set of
//! fallback heuristics kicks in for audio detection, because some extractors
//! omit `acodec` on audio-only streams.

use serde::{Deserialize, Serialize};

/// Container extensions that usually indicate an audio-only stream.
///
/// `webm` is ambiguous (it is also a video container); the list is a
/// deliberate approximation, consulted only after the codec fields have
/// failed to identify the stream.
const AUDIO_EXTENSIONS: &[&str] = &["webm", "m4a", "mp3", "aac", "opus"];

/// One raw stream format as reported by the resolver (yt-dlp JSON).
///
/// All fields are optional on the wire; absent or null values deserialize to
/// `None` and are coerced to zero/empty where math or labels need them.
/// Nothing here ever raises on malformed metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFormat {
    /// Unique format identifier within one media item. Records with an
    /// empty id are discarded during reconciliation.
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    /// Video codec, or the literal string "none" for audio-only streams
    #[serde(default)]
    pub vcodec: Option<String>,
    /// Audio codec, or the literal string "none" for video-only streams
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub fps: Option<f64>,
    /// Average audio bitrate in kbps
    #[serde(default)]
    pub abr: Option<f64>,
    /// Total bitrate in kbps
    #[serde(default)]
    pub tbr: Option<f64>,
    #[serde(default)]
    pub filesize: Option<u64>,
    /// Free-text note from the extractor, used only as a fallback signal
    #[serde(default)]
    pub format_note: Option<String>,
}

impl RawFormat {
    /// Height in pixels, coerced to 0 when absent.
    pub fn height_px(&self) -> u32 {
        self.height.map(|h| h.max(0.0) as u32).unwrap_or(0)
    }

    /// Width in pixels, coerced to 0 when absent.
    pub fn width_px(&self) -> u32 {
        self.width.map(|w| w.max(0.0) as u32).unwrap_or(0)
    }

    /// Frames per second, coerced to 0 when absent.
    pub fn fps_value(&self) -> f64 {
        self.fps.unwrap_or(0.0).max(0.0)
    }

    /// Average audio bitrate in kbps, coerced to 0 when absent.
    pub fn abr_kbps(&self) -> f64 {
        self.abr.unwrap_or(0.0).max(0.0)
    }

    /// File size in bytes, coerced to 0 when absent.
    pub fn filesize_bytes(&self) -> u64 {
        self.filesize.unwrap_or(0)
    }

    fn codec_present(codec: &Option<String>) -> bool {
        matches!(codec.as_deref(), Some(c) if !c.is_empty() && c != "none")
    }
}

/// A raw format plus its derived video/audio classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedFormat {
    pub format: RawFormat,
    pub has_video: bool,
    pub has_audio: bool,
}

/// Classifies one raw format.
///
/// `has_video` is purely codec-driven. `has_audio` falls back, in order, to:
/// a known audio container extension, an "audio" substring in the format
/// note, or a zero-by-zero frame with `vcodec == "none"`. When a heuristic
/// fires and `acodec` is missing, the extension is recorded as the codec so
/// downstream labels have something to show.
pub fn classify(mut format: RawFormat) -> ClassifiedFormat {
    let has_video = RawFormat::codec_present(&format.vcodec);
    let mut has_audio = RawFormat::codec_present(&format.acodec);

    if !has_audio {
        let ext_is_audio = format
            .ext
            .as_deref()
            .map(|e| AUDIO_EXTENSIONS.contains(&e))
            .unwrap_or(false);
        let note_mentions_audio = format
            .format_note
            .as_deref()
            .map(|n| n.to_lowercase().contains("audio"))
            .unwrap_or(false);
        let zero_frame_no_video = format.height == Some(0.0)
            && format.width == Some(0.0)
            && format.vcodec.as_deref() == Some("none");

        if ext_is_audio || note_mentions_audio || zero_frame_no_video {
            has_audio = true;
            // Missing (not "none") acodec gets the extension as a stand-in.
            if format.acodec.as_deref().map(str::is_empty).unwrap_or(true) {
                format.acodec = Some(format.ext.clone().unwrap_or_else(|| "unknown".to_string()));
            }
        }
    }

    ClassifiedFormat {
        format,
        has_video,
        has_audio,
    }
}
