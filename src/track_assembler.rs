use std::collections::HashMap;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use crate::audio_buffer::{AudioBuffer, db_to_linear, peak, resample_linear};
use crate::errors::AudioError;
use crate::subtitle_parser::DialogueEntry;

// @module: Replacement clip placement, duration correction and final mixing

/// Mix peak ceiling; the whole mix is scaled down uniformly past this
const PEAK_CEILING: f32 = 0.95;

/// Duration ratio band inside which a clip is placed as-is
const STRETCH_TOLERANCE: (f64, f64) = (0.8, 1.2);

/// Clip filename pattern for directory collection: dub_NNNN.wav
static CLIP_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^dub_(\d{4})\.wav$").unwrap()
});

/// Assembler tuning knobs
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AssemblerConfig {
    /// Voice gain relative to accompaniment, in dB
    #[serde(default = "default_voice_boost_db")]
    pub voice_boost_db: f32,

    /// Sample rate of the assembled output
    #[serde(default = "default_target_sample_rate")]
    pub target_sample_rate: u32,
}

fn default_voice_boost_db() -> f32 {
    3.0
}

fn default_target_sample_rate() -> u32 {
    44100
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        AssemblerConfig {
            voice_boost_db: default_voice_boost_db(),
            target_sample_rate: default_target_sample_rate(),
        }
    }
}

/// An externally synthesized clip meant to replace one dialogue entry
#[derive(Debug, Clone)]
pub struct ReplacementClip {
    /// The dialogue entry this clip dubs
    pub entry: DialogueEntry,

    /// Path to the synthesized WAV
    pub clip_path: PathBuf,

    /// Measured clip duration in seconds
    pub duration_s: f64,

    /// Native sample rate of the clip
    pub sample_rate: u32,
}

impl ReplacementClip {
    /// Collect replacement clips from a directory of `dub_NNNN.wav` files.
    ///
    /// Files are joined to timeline entries by the index encoded in the
    /// filename; arrival order and directory order are irrelevant, and
    /// entries without a clip are simply absent from the result.
    pub fn collect_from_dir<P: AsRef<Path>>(
        dir: P,
        entries: &[DialogueEntry],
    ) -> Result<Vec<ReplacementClip>, AudioError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(AudioError::FileNotFound(dir.display().to_string()));
        }

        let by_index: HashMap<usize, &DialogueEntry> =
            entries.iter().map(|e| (e.sequence_index, e)).collect();

        let mut clips = Vec::new();
        let mut unmatched = 0usize;

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| AudioError::FileNotFound(format!("{}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        paths.sort();

        for path in paths {
            let name = match path.file_name().map(|n| n.to_string_lossy().to_string()) {
                Some(name) => name,
                None => continue,
            };
            let caps = match CLIP_NAME_REGEX.captures(&name) {
                Some(caps) => caps,
                None => continue,
            };
            let index: usize = caps[1].parse().unwrap_or(usize::MAX);

            let entry = match by_index.get(&index) {
                Some(entry) => (*entry).clone(),
                None => {
                    warn!("Clip {} has no matching timeline entry; ignoring", name);
                    unmatched += 1;
                    continue;
                }
            };

            let audio = AudioBuffer::read_wav(&path)?;
            clips.push(ReplacementClip {
                entry,
                duration_s: audio.duration_s(),
                sample_rate: audio.sample_rate,
                clip_path: path,
            });
        }

        if unmatched > 0 {
            warn!("{} clip file(s) did not match any timeline entry", unmatched);
        }
        Ok(clips)
    }
}

/// The final mixed audio artifact
#[derive(Debug)]
pub struct AssembledTrack {
    /// Combined waveform, exactly as long as the accompaniment
    pub samples: Vec<f32>,

    /// Output sample rate
    pub sample_rate: u32,

    /// Clips successfully placed on the timeline
    pub clips_placed: usize,

    /// Clips that needed duration correction
    pub clips_stretched: usize,

    /// Clips dropped because they started past the end of the track
    pub clips_dropped: usize,
}

impl AssembledTrack {
    /// Output duration in seconds
    pub fn duration_s(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Duration correction seam.
///
/// The provided implementation stretches by resampling, which alters pitch;
/// an accepted approximation for short dialogue clips. A pitch-preserving
/// phase-vocoder implementation can be substituted here without touching
/// placement or mixing.
pub trait TimeStretcher {
    /// Stretch or squeeze `samples` to exactly `target_len` samples
    fn stretch(&self, samples: &[f32], target_len: usize) -> Vec<f32>;
}

/// Resampling-based stretcher (duration-only, not pitch-preserving)
#[derive(Debug, Default)]
pub struct LinearStretcher;

impl TimeStretcher for LinearStretcher {
    fn stretch(&self, samples: &[f32], target_len: usize) -> Vec<f32> {
        resample_linear(samples, target_len)
    }
}

/// Place replacement clips at their original entry timestamps, mix with the
/// accompaniment and normalize.
///
/// The accompaniment track is the authoritative timeline: the output buffer
/// is exactly its length at the target rate no matter what the clips do.
pub fn assemble(
    clips: &[ReplacementClip],
    accompaniment: &AudioBuffer,
    config: &AssemblerConfig,
) -> Result<AssembledTrack, AudioError> {
    assemble_with_stretcher(clips, accompaniment, config, &LinearStretcher)
}

/// `assemble` with an explicit duration-correction implementation
pub fn assemble_with_stretcher(
    clips: &[ReplacementClip],
    accompaniment: &AudioBuffer,
    config: &AssemblerConfig,
    stretcher: &dyn TimeStretcher,
) -> Result<AssembledTrack, AudioError> {
    if accompaniment.is_empty() {
        return Err(AudioError::EmptyTrack(
            "accompaniment track has no samples".to_string(),
        ));
    }

    let target_rate = config.target_sample_rate;
    let accomp = accompaniment.resampled(target_rate);
    let total_samples = accomp.len();

    info!(
        "Assembling {} dubbed clips onto {:.1}s accompaniment track",
        clips.len(),
        accomp.duration_s()
    );

    // Voice mix buffer, sized exactly to the accompaniment
    let mut voice_track = vec![0.0f32; total_samples];
    let mut clips_placed = 0usize;
    let mut clips_stretched = 0usize;
    let mut clips_dropped = 0usize;

    for clip in clips {
        let entry = &clip.entry;
        let target_duration_ms = entry.duration_ms();

        let audio = AudioBuffer::read_wav(&clip.clip_path)?;
        let audio = audio.resampled(target_rate);
        let mut samples = audio.samples;

        let clip_duration_ms = samples.len() as f64 * 1000.0 / target_rate as f64;

        // Correct the duration only when the mismatch is past tolerance;
        // the ratio is against the original entry duration, never the
        // padded slicer window
        let ratio = if target_duration_ms > 0 {
            clip_duration_ms / target_duration_ms as f64
        } else {
            1.0
        };

        if ratio < STRETCH_TOLERANCE.0 || ratio > STRETCH_TOLERANCE.1 {
            let target_len = (target_duration_ms * target_rate as u64 / 1000) as usize;
            samples = stretcher.stretch(&samples, target_len);
            clips_stretched += 1;
            debug!(
                "Clip {}: stretched {:.0}ms -> {}ms (ratio {:.2})",
                entry.sequence_index, clip_duration_ms, target_duration_ms, ratio
            );
        }

        // Placement from the unpadded entry start
        let start_sample = (entry.start_ms * target_rate as u64 / 1000) as usize;

        if start_sample >= total_samples {
            warn!(
                "Clip {} starts past end of track; skipping",
                entry.sequence_index
            );
            clips_dropped += 1;
            continue;
        }
        let end_sample = (start_sample + samples.len()).min(total_samples);
        let len = end_sample - start_sample;

        // Additive mix: overlapping placements sum, which is fine because
        // dialogue rarely overlaps within one track
        for (dst, src) in voice_track[start_sample..end_sample]
            .iter_mut()
            .zip(samples[..len].iter())
        {
            *dst += *src;
        }
        clips_placed += 1;
    }

    // Voice boost, then sum with the accompaniment bed
    let boost = db_to_linear(config.voice_boost_db);
    let mut mix: Vec<f32> = accomp
        .samples
        .iter()
        .zip(voice_track.iter())
        .map(|(&bed, &voice)| bed + voice * boost)
        .collect();

    // Peak limiting: uniform scale-down, not dynamic compression
    let mix_peak = peak(&mix);
    if mix_peak > PEAK_CEILING {
        let scale = PEAK_CEILING / mix_peak;
        for sample in &mut mix {
            *sample *= scale;
        }
        info!("Normalized output (peak was {:.3})", mix_peak);
    }

    info!(
        "Assembly complete: {} clips placed ({} stretched, {} dropped)",
        clips_placed, clips_stretched, clips_dropped
    );

    Ok(AssembledTrack {
        samples: mix,
        sample_rate: target_rate,
        clips_placed,
        clips_stretched,
        clips_dropped,
    })
}
