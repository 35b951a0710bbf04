use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::app_config::Config;
use crate::audio_buffer::AudioBuffer;
use crate::errors::SubtitleError;
use crate::file_utils::{FileManager, FileType};
use crate::media_extractor;
use crate::separator;
use crate::subtitle_parser::{self, DialogueEntry};
use crate::track_assembler::{self, ReplacementClip};
use crate::vocal_slicer::{self, ReferenceSegment};

// @module: Application controller for the dubbing pipeline

/// Timeline manifest written into the work directory for the external
/// synthesis step (per-entry source text and timing, keyed by index)
#[derive(Debug, Serialize, Deserialize)]
pub struct TimelineManifest {
    /// Dialect the source document was parsed as
    pub format: String,
    /// Raw entry count before filtering
    pub total_raw_entries: usize,
    /// Entries removed by filtering
    pub filtered_entries: usize,
    /// Surviving dialogue entries in timeline order
    pub entries: Vec<DialogueEntry>,
}

/// Result of the preparation half of the pipeline
#[derive(Debug)]
pub struct PrepareOutcome {
    /// Path to the written timeline manifest
    pub timeline_path: PathBuf,
    /// Path to the written segments manifest
    pub segments_path: PathBuf,
    /// Separated accompaniment track, when separation ran
    pub accompaniment_path: Option<PathBuf>,
    /// Dialogue entries on the timeline
    pub dialogue_count: usize,
    /// Voice reference segments that passed viability checks
    pub segment_count: usize,
}

/// Main application controller for the dubbing pipeline
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    /// Create a new controller for test purposes with default configuration
    pub fn new_for_test() -> Result<Self> {
        Self::with_config(Config::default())
    }

    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Check if the controller is properly initialized with configuration
    pub fn is_initialized(&self) -> bool {
        !self.config.subtitle_language.is_empty() && !self.config.target_language.is_empty()
    }

    /// Run the preparation half: subtitles → timeline → separation → voice
    /// reference segments, leaving manifests for the external synthesis step.
    ///
    /// `input` may be a video container (subtitles and audio are extracted
    /// and separated) or a bare subtitle document, in which case
    /// `vocals_override` must point at an already-separated vocal WAV.
    pub async fn prepare(
        &self,
        input: &Path,
        work_dir: &Path,
        vocals_override: Option<&Path>,
        demucs_model: &str,
        device: &str,
    ) -> Result<PrepareOutcome> {
        let start_time = Instant::now();

        if !input.exists() {
            return Err(anyhow!("Input file does not exist: {}", input.display()));
        }
        FileManager::ensure_dir(work_dir)?;

        let file_type = FileManager::detect_file_type(input)?;

        // Stage 1: obtain and parse subtitles
        let (subtitle_path, accompaniment_path, vocals_path) = match file_type {
            FileType::Subtitle => {
                info!("Detected subtitle file, skipping extraction and separation");
                let vocals = vocals_override
                    .ok_or_else(|| {
                        anyhow!(
                            "A separated vocals WAV is required when the input is a bare subtitle file"
                        )
                    })?
                    .to_path_buf();
                (input.to_path_buf(), None, vocals)
            }
            FileType::Video => {
                let subtitle_path = media_extractor::extract_subtitle_track(
                    input,
                    work_dir.join("subs").as_path(),
                    &self.config.subtitle_language,
                )
                .await?
                .ok_or_else(|| {
                    anyhow!(
                        "No {} subtitles found (embedded or external); cannot proceed without dialogue text",
                        self.config.subtitle_language
                    )
                })?;

                // Stage 2: extract the original-language audio
                let audio_path = media_extractor::extract_audio_track(
                    input,
                    work_dir.join("audio").as_path(),
                    &self.config.audio_language,
                )
                .await?;

                // Stage 3: source separation (external model boundary)
                let progress = stage_spinner("Separating vocals");
                let separated = separator::separate_vocals(
                    audio_path.as_path(),
                    work_dir.join("separated").as_path(),
                    demucs_model,
                    device,
                )
                .await?;
                progress.finish_and_clear();

                (subtitle_path, Some(separated.accompaniment), separated.vocals)
            }
            _ => {
                return Err(anyhow!(
                    "Unsupported input type: {} (expected a video container or subtitle file)",
                    input.display()
                ));
            }
        };

        let options = self.config.parser.to_parse_options();
        let timeline = subtitle_parser::parse_file(&subtitle_path, None, &options)
            .context("Failed to parse subtitle file")?;
        info!("{}", timeline.summary());

        if timeline.is_empty() {
            return Err(SubtitleError::NoDialogue(subtitle_path.display().to_string()).into());
        }

        // Stage 4: slice voice references
        let vocals = AudioBuffer::read_wav(&vocals_path)
            .with_context(|| format!("Failed to read vocals: {}", vocals_path.display()))?;
        let slices_dir = work_dir.join("slices");
        let segments =
            vocal_slicer::slice_vocals(&vocals, &timeline, &slices_dir, &self.config.slicer)?;

        if segments.is_empty() {
            return Err(anyhow!(
                "No usable voice reference clips; check audio/subtitle alignment"
            ));
        }

        // Manifests for the external synthesis step
        let timeline_path = work_dir.join("timeline.json");
        let segments_path = work_dir.join("segments.json");
        self.write_timeline_manifest(&timeline_path, &timeline)?;
        self.write_segments_manifest(&segments_path, &segments)?;

        info!(
            "Preparation complete in {}: {} dialogue lines, {} voice references",
            format_duration(start_time.elapsed()),
            timeline.dialogue_count(),
            segments.len()
        );

        Ok(PrepareOutcome {
            timeline_path,
            segments_path,
            accompaniment_path,
            dialogue_count: timeline.dialogue_count(),
            segment_count: segments.len(),
        })
    }

    /// Run the assembly half: collect externally synthesized clips, place
    /// them on the original timeline, mix with the accompaniment and write
    /// the final dubbed audio track.
    pub fn assemble_clips(
        &self,
        work_dir: &Path,
        clips_dir: &Path,
        accompaniment_path: &Path,
        output_wav: &Path,
    ) -> Result<track_assembler::AssembledTrack> {
        let start_time = Instant::now();

        let timeline_path = work_dir.join("timeline.json");
        let manifest = self.read_timeline_manifest(&timeline_path)?;

        let clips = ReplacementClip::collect_from_dir(clips_dir, &manifest.entries)?;
        if clips.is_empty() {
            return Err(anyhow!(
                "No replacement clips found in {}; run the synthesis step first",
                clips_dir.display()
            ));
        }

        let accompaniment = AudioBuffer::read_wav(accompaniment_path).with_context(|| {
            format!(
                "Failed to read accompaniment: {}",
                accompaniment_path.display()
            )
        })?;

        let progress = stage_spinner("Assembling dubbed track");
        let track = track_assembler::assemble(&clips, &accompaniment, &self.config.assembler)?;
        progress.finish_and_clear();

        AudioBuffer::new(track.samples.clone(), track.sample_rate).write_wav(output_wav)?;

        info!(
            "Assembled {} in {} ({:.1}s of audio, {} clips placed, {} stretched, {} dropped)",
            output_wav.display(),
            format_duration(start_time.elapsed()),
            track.duration_s(),
            track.clips_placed,
            track.clips_stretched,
            track.clips_dropped
        );

        Ok(track)
    }

    /// Run the whole pipeline. Replacement clips must already exist in
    /// `clips_dir` (synthesis runs out of process between the two halves,
    /// so a full run is: prepare → external synthesis → run again).
    pub async fn run(
        &self,
        input: &Path,
        output: &Path,
        work_dir: &Path,
        clips_dir: &Path,
        demucs_model: &str,
        device: &str,
        force_overwrite: bool,
        skip_mux: bool,
    ) -> Result<()> {
        if output.exists() && !force_overwrite {
            warn!(
                "Skipping, output already exists (use -f to force overwrite): {}",
                output.display()
            );
            return Ok(());
        }

        let outcome = self.prepare(input, work_dir, None, demucs_model, device).await?;
        let accompaniment = outcome
            .accompaniment_path
            .clone()
            .ok_or_else(|| anyhow!("Full runs need a video input so separation can produce the accompaniment"))?;

        if !clips_dir.is_dir() {
            return Err(anyhow!(
                "Clips directory {} does not exist; run the synthesis step over {} first",
                clips_dir.display(),
                outcome.segments_path.display()
            ));
        }

        let dubbed_wav = work_dir.join("dubbed_audio.wav");
        let track = self.assemble_clips(work_dir, clips_dir, &accompaniment, &dubbed_wav)?;

        if skip_mux {
            info!(
                "Skipping mux; dubbed audio at {} ({:.1}s)",
                dubbed_wav.display(),
                track.duration_s()
            );
            return Ok(());
        }

        media_extractor::mux_dubbed_audio(
            input,
            dubbed_wav.as_path(),
            output,
            &self.config.target_language,
        )
        .await?;

        info!("Done: {}", output.display());
        Ok(())
    }

    fn write_timeline_manifest(
        &self,
        path: &Path,
        timeline: &subtitle_parser::Timeline,
    ) -> Result<()> {
        let manifest = TimelineManifest {
            format: timeline.format.to_string(),
            total_raw_entries: timeline.total_raw_entries,
            filtered_entries: timeline.filtered_entries,
            entries: timeline.entries.clone(),
        };
        let content = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write timeline manifest: {}", path.display()))?;
        Ok(())
    }

    fn read_timeline_manifest(&self, path: &Path) -> Result<TimelineManifest> {
        let content = FileManager::read_to_string(path)
            .with_context(|| format!("Failed to read timeline manifest: {}", path.display()))?;
        let manifest: TimelineManifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse timeline manifest: {}", path.display()))?;
        Ok(manifest)
    }

    fn write_segments_manifest(&self, path: &Path, segments: &[ReferenceSegment]) -> Result<()> {
        let content = serde_json::to_string_pretty(segments)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write segments manifest: {}", path.display()))?;
        Ok(())
    }
}

/// Spinner-style progress bar for a long-running stage
fn stage_spinner(message: &str) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_message(message.to_string());
    progress.enable_steady_tick(std::time::Duration::from_millis(120));
    progress
}

/// Format an elapsed duration as 1h 2m 3s / 2m 3s / 3s
fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
