/*!
 * Tests for replacement clip collection, placement and mixing
 */

use std::fs;
use std::path::Path;
use anyhow::Result;
use otodub::audio_buffer::{AudioBuffer, peak};
use otodub::errors::AudioError;
use otodub::subtitle_parser::DialogueEntry;
use otodub::track_assembler::{
    AssemblerConfig, ReplacementClip, TimeStretcher, assemble, assemble_with_stretcher,
};
use crate::common;

const RATE: u32 = 44100;

/// Write a synthesized clip WAV and return a ReplacementClip joined to `entry`
fn make_clip(dir: &Path, entry: DialogueEntry, duration_s: f64, amplitude: f32) -> Result<ReplacementClip> {
    let name = format!("dub_{:04}.wav", entry.sequence_index);
    let path = common::write_sine_wav(dir, &name, duration_s, RATE, amplitude)?;
    Ok(ReplacementClip {
        entry,
        clip_path: path,
        duration_s,
        sample_rate: RATE,
    })
}

/// Test directory collection joins clips to entries by filename index
#[test]
fn test_collect_from_dir_withIndexedNames_shouldJoinByIndex() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let entries = vec![
        common::entry_at(0, 1000, 2000, "First"),
        common::entry_at(2, 5000, 6000, "Third"),
    ];

    common::write_sine_wav(temp_dir.path(), "dub_0000.wav", 1.0, RATE, 0.5)?;
    common::write_sine_wav(temp_dir.path(), "dub_0002.wav", 1.0, RATE, 0.5)?;
    // No entry with index 5; must be ignored, not an error
    common::write_sine_wav(temp_dir.path(), "dub_0005.wav", 1.0, RATE, 0.5)?;
    // Non-matching names are skipped entirely
    fs::write(temp_dir.path().join("notes.txt"), "not audio")?;

    let clips = ReplacementClip::collect_from_dir(temp_dir.path(), &entries)?;

    assert_eq!(clips.len(), 2);
    assert_eq!(clips[0].entry.sequence_index, 0);
    assert_eq!(clips[1].entry.sequence_index, 2);
    assert!((clips[0].duration_s - 1.0).abs() < 0.01);
    Ok(())
}

/// Test collection from a missing directory fails
#[test]
fn test_collect_from_dir_withMissingDir_shouldReturnError() {
    let entries = vec![common::entry_at(0, 0, 1000, "Line")];
    let result = ReplacementClip::collect_from_dir("/nonexistent/clips", &entries);
    assert!(matches!(result, Err(AudioError::FileNotFound(_))));
}

/// Test a clip within tolerance is placed at its entry start without stretching
#[test]
fn test_assemble_withClipInTolerance_shouldPlaceWithoutStretch() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let accompaniment = AudioBuffer::silence(RATE as usize * 5, RATE);
    let entry = common::entry_at(0, 1000, 2000, "One second line");
    let clips = vec![make_clip(temp_dir.path(), entry, 1.0, 0.5)?];

    let track = assemble(&clips, &accompaniment, &AssemblerConfig::default())?;

    assert_eq!(track.clips_placed, 1);
    assert_eq!(track.clips_stretched, 0);
    assert_eq!(track.clips_dropped, 0);

    // Voice energy sits in the 1s..2s window and nowhere else
    let before = peak(&track.samples[..RATE as usize]);
    let during = peak(&track.samples[RATE as usize..2 * RATE as usize]);
    let after = peak(&track.samples[2 * RATE as usize + 100..]);
    assert!(before < 1e-4);
    assert!(during > 0.1);
    assert!(after < 1e-4);
    Ok(())
}

/// Test the output is always exactly as long as the accompaniment
#[test]
fn test_assemble_withAnyClips_shouldMatchAccompanimentLength() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let accompaniment = common::sine_tone(3.0, RATE, 220.0, 0.1);
    let entry = common::entry_at(0, 500, 1500, "Line");
    let clips = vec![make_clip(temp_dir.path(), entry, 1.0, 0.3)?];

    let track = assemble(&clips, &accompaniment, &AssemblerConfig::default())?;

    assert_eq!(track.samples.len(), accompaniment.len());
    assert_eq!(track.sample_rate, RATE);
    Ok(())
}

/// Test duration correction: a 2.4s clip against a 1s entry is stretched to 1s
#[test]
fn test_assemble_withOversizedClip_shouldStretchToEntryDuration() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let accompaniment = AudioBuffer::silence(RATE as usize * 5, RATE);
    let entry = common::entry_at(0, 1000, 2000, "Short line");
    let clips = vec![make_clip(temp_dir.path(), entry, 2.4, 0.5)?];

    let track = assemble(&clips, &accompaniment, &AssemblerConfig::default())?;

    assert_eq!(track.clips_placed, 1);
    assert_eq!(track.clips_stretched, 1);

    // The corrected clip occupies exactly the entry window
    let during = peak(&track.samples[RATE as usize..2 * RATE as usize]);
    let after = peak(&track.samples[2 * RATE as usize + 100..]);
    assert!(during > 0.1);
    assert!(after < 1e-4);
    Ok(())
}

/// Test a mildly mismatched clip is left alone
#[test]
fn test_assemble_withMildMismatch_shouldNotStretch() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let accompaniment = AudioBuffer::silence(RATE as usize * 5, RATE);
    // 1.1s clip against a 1s entry: ratio 1.1, inside [0.8, 1.2]
    let entry = common::entry_at(0, 1000, 2000, "Close enough");
    let clips = vec![make_clip(temp_dir.path(), entry, 1.1, 0.5)?];

    let track = assemble(&clips, &accompaniment, &AssemblerConfig::default())?;

    assert_eq!(track.clips_stretched, 0);
    Ok(())
}

/// Test a clip starting past the end of the track is dropped, not an error
#[test]
fn test_assemble_withClipPastTrackEnd_shouldDropClip() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let accompaniment = AudioBuffer::silence(RATE as usize * 2, RATE);
    let entry = common::entry_at(0, 10_000, 11_000, "Off the end");
    let clips = vec![make_clip(temp_dir.path(), entry, 1.0, 0.5)?];

    let track = assemble(&clips, &accompaniment, &AssemblerConfig::default())?;

    assert_eq!(track.clips_placed, 0);
    assert_eq!(track.clips_dropped, 1);
    assert_eq!(track.samples.len(), accompaniment.len());
    Ok(())
}

/// Test a clip overhanging the end of the track is truncated
#[test]
fn test_assemble_withOverhangingClip_shouldTruncate() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let accompaniment = AudioBuffer::silence(RATE as usize * 2, RATE);
    // Entry starts 0.5s before the end, clip runs 1s
    let entry = common::entry_at(0, 1500, 2500, "Overhang");
    let clips = vec![make_clip(temp_dir.path(), entry, 1.0, 0.5)?];

    let track = assemble(&clips, &accompaniment, &AssemblerConfig::default())?;

    assert_eq!(track.clips_placed, 1);
    assert_eq!(track.samples.len(), accompaniment.len());
    Ok(())
}

/// Test the final mix never exceeds the peak ceiling
#[test]
fn test_assemble_withHotMix_shouldNormalizeBelowCeiling() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let accompaniment = common::sine_tone(3.0, RATE, 220.0, 0.8);
    let entry = common::entry_at(0, 500, 1500, "Loud line");
    // 0.9 amplitude voice plus a 3 dB boost over a 0.8 bed clips without limiting
    let clips = vec![make_clip(temp_dir.path(), entry, 1.0, 0.9)?];

    let track = assemble(&clips, &accompaniment, &AssemblerConfig::default())?;

    assert!(peak(&track.samples) <= 0.95 + 1e-4);
    Ok(())
}

/// Test an empty accompaniment is a structural failure
#[test]
fn test_assemble_withEmptyAccompaniment_shouldReturnError() {
    let accompaniment = AudioBuffer::new(Vec::new(), RATE);
    let result = assemble(&[], &accompaniment, &AssemblerConfig::default());
    assert!(matches!(result, Err(AudioError::EmptyTrack(_))));
}

/// Test the accompaniment passes through untouched when there are no clips
#[test]
fn test_assemble_withNoClips_shouldReturnBedOnly() -> Result<()> {
    let accompaniment = common::sine_tone(2.0, RATE, 220.0, 0.3);
    let track = assemble(&[], &accompaniment, &AssemblerConfig::default())?;

    assert_eq!(track.clips_placed, 0);
    assert_eq!(track.samples.len(), accompaniment.len());
    assert!((peak(&track.samples) - 0.3).abs() < 0.01);
    Ok(())
}

/// Stretcher stub that records the requested target length
struct FixedStretcher;

impl TimeStretcher for FixedStretcher {
    fn stretch(&self, _samples: &[f32], target_len: usize) -> Vec<f32> {
        vec![0.25; target_len]
    }
}

/// Test the stretcher seam receives the entry duration in samples
#[test]
fn test_assemble_withCustomStretcher_shouldUseItForCorrection() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let accompaniment = AudioBuffer::silence(RATE as usize * 5, RATE);
    let entry = common::entry_at(0, 1000, 2000, "Stub-corrected");
    let clips = vec![make_clip(temp_dir.path(), entry, 3.0, 0.5)?];

    let track = assemble_with_stretcher(
        &clips,
        &accompaniment,
        &AssemblerConfig::default(),
        &FixedStretcher,
    )?;

    assert_eq!(track.clips_stretched, 1);
    // The stub writes a constant 0.25 over the 3 dB-boosted window
    let mid = track.samples[(1.5 * RATE as f64) as usize];
    assert!((mid - 0.25 * otodub::audio_buffer::db_to_linear(3.0)).abs() < 0.01);
    Ok(())
}
