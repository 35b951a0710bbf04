use std::collections::HashMap;
use std::path::{Path, PathBuf};
use log::{debug, info};
use crate::audio_buffer::{AudioBuffer, rms};
use crate::errors::AudioError;
use crate::subtitle_parser::{DialogueEntry, Timeline};

// @module: Voice reference slicing from the separated vocal track

/// RMS below this is treated as silence; empty audio cannot seed a voice clone
const SILENCE_RMS_THRESHOLD: f32 = 1e-4;

/// Slicer tuning knobs
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SlicerConfig {
    /// Milliseconds of padding before the entry start
    #[serde(default = "default_pad_before_ms")]
    pub pad_before_ms: u64,

    /// Milliseconds of padding after the entry end
    #[serde(default = "default_pad_after_ms")]
    pub pad_after_ms: u64,

    /// Minimum usable reference duration in seconds
    #[serde(default = "default_min_reference_s")]
    pub min_reference_s: f64,
}

fn default_pad_before_ms() -> u64 {
    200
}

fn default_pad_after_ms() -> u64 {
    300
}

fn default_min_reference_s() -> f64 {
    0.5
}

impl Default for SlicerConfig {
    fn default() -> Self {
        SlicerConfig {
            pad_before_ms: default_pad_before_ms(),
            pad_after_ms: default_pad_after_ms(),
            min_reference_s: default_min_reference_s(),
        }
    }
}

/// A voice reference clip cut for one dialogue entry
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReferenceSegment {
    /// The dialogue entry this clip corresponds to
    pub entry: DialogueEntry,

    /// Path to the saved WAV clip
    pub clip_path: PathBuf,

    /// Actual clip duration in seconds
    pub duration_s: f64,

    /// Clip sample rate
    pub sample_rate: u32,
}

/// Slice the vocal track at dialogue timestamps into voice reference clips.
///
/// Each entry gets a padded sample window clamped to the track bounds; clips
/// that come out too short or near-silent are rejected and counted, never
/// failing the batch. Output order matches timeline order, but rejected
/// entries leave holes; consumers must look segments up by `sequence_index`,
/// not by array position.
pub fn slice_vocals<P: AsRef<Path>>(
    vocals: &AudioBuffer,
    timeline: &Timeline,
    output_dir: P,
    config: &SlicerConfig,
) -> Result<Vec<ReferenceSegment>, AudioError> {
    let output_dir = output_dir.as_ref();

    if vocals.is_empty() {
        return Err(AudioError::EmptyTrack("vocal track has no samples".to_string()));
    }

    let sample_rate = vocals.sample_rate;
    let total_samples = vocals.len();
    let total_ms = (total_samples as u64 * 1000) / sample_rate as u64;

    info!(
        "Slicing {} entries from vocals ({:.1}s, {}Hz)",
        timeline.dialogue_count(),
        vocals.duration_s(),
        sample_rate
    );

    let mut segments = Vec::new();
    let mut skipped = 0usize;

    for entry in &timeline.entries {
        // Padded window, clamped to the track
        let start_ms = entry.start_ms.saturating_sub(config.pad_before_ms);
        let end_ms = (entry.end_ms + config.pad_after_ms).min(total_ms);

        let start_sample = (start_ms * sample_rate as u64 / 1000) as usize;
        let end_sample = (end_ms * sample_rate as u64 / 1000) as usize;

        // Never an empty window: at least one sample survives the clamp
        let start_sample = start_sample.min(total_samples - 1);
        let end_sample = end_sample.clamp(start_sample + 1, total_samples);

        let clip = &vocals.samples[start_sample..end_sample];
        let duration_s = clip.len() as f64 / sample_rate as f64;

        if duration_s < config.min_reference_s {
            debug!(
                "Skipping entry {} ({:.2}s < {:.2}s)",
                entry.sequence_index, duration_s, config.min_reference_s
            );
            skipped += 1;
            continue;
        }

        let clip_rms = rms(clip);
        if clip_rms < SILENCE_RMS_THRESHOLD {
            debug!(
                "Skipping entry {} (silence, RMS={:.6})",
                entry.sequence_index, clip_rms
            );
            skipped += 1;
            continue;
        }

        let clip_path = output_dir.join(format!("voice_{:04}.wav", entry.sequence_index));
        AudioBuffer::new(clip.to_vec(), sample_rate).write_wav(&clip_path)?;

        segments.push(ReferenceSegment {
            entry: entry.clone(),
            clip_path,
            duration_s,
            sample_rate,
        });
    }

    info!(
        "Sliced {} voice references ({} skipped; too short or silent)",
        segments.len(),
        skipped
    );
    Ok(segments)
}

/// Sparse lookup from entry sequence index to its reference segment.
///
/// The timeline-to-segment mapping is partial; an explicit keyed map avoids
/// the silent misalignment a parallel array would invite.
pub fn segment_index(segments: &[ReferenceSegment]) -> HashMap<usize, &ReferenceSegment> {
    segments
        .iter()
        .map(|s| (s.entry.sequence_index, s))
        .collect()
}
