//! Format reconciliation.
//!
//! Takes the full raw format list of one media item and produces the
//! normalized set of downloadable variants: native combined streams,
//! synthesized video+audio pairings, unpaired video-only streams, and the
//! independent audio-only list. This is where the messy realities of
//! extractor metadata get absorbed: missing codecs, bitrates, and malformed
//! fields degrade gracefully instead of failing.

use crate::download::classify::{classify, RawFormat};

/// Audio bitrate assumed for synthesized audio tracks when the source
/// format reports none (kbps).
const DEFAULT_SYNTHESIZED_ABR: f64 = 128.0;

/// The kind of a reconciled format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// Native stream carrying both video and audio
    Combined,
    /// Synthesized pairing of a video-only stream with the best audio-only stream
    Enhanced,
    /// Video-only stream for which no audio candidate existed
    VideoOnly,
    /// Stand-alone audio stream
    AudioOnly,
}

/// One downloadable variant after reconciliation.
///
/// `selector` is the opaque string the resolver's fetch understands
/// unmodified: a single format id, `"{videoId}+{audioId}"` for enhanced
/// pairings, or `"{combinedId}_audio"` for synthesized audio tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledFormat {
    pub selector: String,
    pub kind: FormatKind,
    pub ext: Option<String>,
    pub height: u32,
    pub width: u32,
    pub fps: f64,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    /// Average audio bitrate in kbps; 0 means unknown/absent
    pub abr: f64,
    pub filesize: u64,
}

impl ReconciledFormat {
    /// Whether this variant carries an audio track.
    pub fn has_audio(&self) -> bool {
        !matches!(self.kind, FormatKind::VideoOnly)
    }
}

/// Result of reconciling one media item's formats.
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    /// Combined, enhanced, and video-only variants, sorted by descending
    /// `(height, fps)`. At equal resolution, native combined precedes
    /// enhanced, and both precede video-only.
    pub video: Vec<ReconciledFormat>,
    /// Audio-only variants, sorted by descending bitrate.
    pub audio: Vec<ReconciledFormat>,
}

/// Reconciles the raw format list of one media item.
///
/// Steps:
/// 1. Classify every format; records without a `format_id` are discarded.
/// 2. Partition into combined / video-only / audio-only.
/// 3. If no stand-alone audio exists, synthesize one audio variant per
///    combined format that has a real audio codec.
/// 4. Pair every video-only stream with the single best audio stream
///    (highest bitrate wins, first-encountered wins ties). Unpairable
///    streams stay as video-only.
/// 5. Sort both output lists by quality.
pub fn reconcile(formats: Vec<RawFormat>) -> Reconciled {
    let mut combined = Vec::new();
    let mut video_only = Vec::new();
    let mut audio_only = Vec::new();

    for raw in formats {
        if raw.format_id.is_empty() {
            continue;
        }
        let c = classify(raw);
        match (c.has_video, c.has_audio) {
            (true, true) => combined.push(c.format),
            (true, false) => video_only.push(c.format),
            (false, true) => audio_only.push(c.format),
            (false, false) => {
                log::debug!("Discarding format {} with neither video nor audio", c.format.format_id);
            }
        }
    }

    log::info!(
        "Reconciling formats: {} combined, {} video-only, {} audio-only",
        combined.len(),
        video_only.len(),
        audio_only.len()
    );

    let mut audio: Vec<ReconciledFormat> = audio_only.iter().map(audio_variant).collect();

    // No stand-alone audio at all: fall back to the audio tracks embedded in
    // combined formats so video-only streams still get something to pair with
    // and the catalog still offers an audio option.
    if audio.is_empty() && !combined.is_empty() {
        log::info!("No separate audio formats found, extracting from combined formats");
        for fmt in &combined {
            if matches!(fmt.acodec.as_deref(), Some(c) if !c.is_empty() && c != "none") {
                let abr = match fmt.abr_kbps() {
                    a if a > 0.0 => a,
                    _ => DEFAULT_SYNTHESIZED_ABR,
                };
                audio.push(ReconciledFormat {
                    selector: format!("{}_audio", fmt.format_id),
                    kind: FormatKind::AudioOnly,
                    ext: fmt.ext.clone(),
                    height: 0,
                    width: 0,
                    fps: 0.0,
                    vcodec: None,
                    acodec: fmt.acodec.clone(),
                    abr,
                    filesize: fmt.filesize_bytes(),
                });
            }
        }
    }

    // Single best audio for every pairing: the stream with the globally
    // highest bitrate, scanned in order so ties keep the first candidate.
    // Streams without a known bitrate are never chosen.
    let best_audio = audio
        .iter()
        .filter(|candidate| candidate.abr > 0.0)
        .fold(None::<&ReconciledFormat>, |best, candidate| match best {
            Some(b) if candidate.abr > b.abr => Some(candidate),
            None => Some(candidate),
            other => other,
        })
        .cloned();

    let mut video: Vec<ReconciledFormat> = combined.iter().map(combined_variant).collect();

    for fmt in &video_only {
        match &best_audio {
            Some(a) => video.push(ReconciledFormat {
                selector: format!("{}+{}", fmt.format_id, a.selector),
                kind: FormatKind::Enhanced,
                ext: fmt.ext.clone(),
                height: fmt.height_px(),
                width: fmt.width_px(),
                fps: fmt.fps_value(),
                vcodec: fmt.vcodec.clone(),
                acodec: a.acodec.clone(),
                abr: a.abr,
                filesize: fmt.filesize_bytes(),
            }),
            None => video.push(ReconciledFormat {
                selector: fmt.format_id.clone(),
                kind: FormatKind::VideoOnly,
                ext: fmt.ext.clone(),
                height: fmt.height_px(),
                width: fmt.width_px(),
                fps: fmt.fps_value(),
                vcodec: fmt.vcodec.clone(),
                acodec: None,
                abr: 0.0,
                filesize: fmt.filesize_bytes(),
            }),
        }
    }

    // Stable sort: at equal (height, fps) the pre-sort order stands, which
    // keeps native combined ahead of enhanced and video-only entries.
    video.sort_by(|a, b| {
        b.height
            .cmp(&a.height)
            .then(b.fps.partial_cmp(&a.fps).unwrap_or(std::cmp::Ordering::Equal))
    });
    audio.sort_by(|a, b| b.abr.partial_cmp(&a.abr).unwrap_or(std::cmp::Ordering::Equal));

    Reconciled { video, audio }
}

fn combined_variant(fmt: &RawFormat) -> ReconciledFormat {
    ReconciledFormat {
        selector: fmt.format_id.clone(),
        kind: FormatKind::Combined,
        ext: fmt.ext.clone(),
        height: fmt.height_px(),
        width: fmt.width_px(),
        fps: fmt.fps_value(),
        vcodec: fmt.vcodec.clone(),
        acodec: fmt.acodec.clone(),
        abr: fmt.abr_kbps(),
        filesize: fmt.filesize_bytes(),
    }
}

fn audio_variant(fmt: &RawFormat) -> ReconciledFormat {
    ReconciledFormat {
        selector: fmt.format_id.clone(),
        kind: FormatKind::AudioOnly,
        ext: fmt.ext.clone(),
        height: 0,
        width: 0,
        fps: 0.0,
        vcodec: None,
        acodec: fmt.acodec.clone(),
        abr: fmt.abr_kbps(),
        filesize: fmt.filesize_bytes(),
    }
}
