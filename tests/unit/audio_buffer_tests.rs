/*!
 * Tests for the audio buffer and sample math helpers
 */

use anyhow::Result;
use rand::Rng;
use otodub::audio_buffer::{
    AudioBuffer, db_to_linear, downmix_to_mono, peak, resample_linear, rms,
};
use crate::common;

/// Test stereo downmix averages channel pairs
#[test]
fn test_downmix_to_mono_withStereoFrames_shouldAverage() {
    let interleaved = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
    let mono = downmix_to_mono(&interleaved, 2);
    assert_eq!(mono, vec![0.5, 0.5, 0.0]);
}

/// Test that mono input passes through unchanged
#[test]
fn test_downmix_to_mono_withMonoInput_shouldPassThrough() {
    let samples = [0.25, -0.5, 0.75];
    assert_eq!(downmix_to_mono(&samples, 1), samples.to_vec());
}

/// Test RMS of a constant signal
#[test]
fn test_rms_withConstantSignal_shouldEqualMagnitude() {
    let samples = vec![0.5f32; 1000];
    assert!((rms(&samples) - 0.5).abs() < 1e-6);
    assert_eq!(rms(&[]), 0.0);
}

/// Test peak returns the largest absolute sample
#[test]
fn test_peak_withMixedSigns_shouldReturnAbsoluteMax() {
    assert_eq!(peak(&[0.1, -0.9, 0.5]), 0.9);
    assert_eq!(peak(&[]), 0.0);
}

/// Test decibel conversion at known points
#[test]
fn test_db_to_linear_withKnownValues_shouldMatch() {
    assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
    assert!((db_to_linear(20.0) - 10.0).abs() < 1e-4);
    assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-6);
}

/// Test linear resampling preserves endpoints
#[test]
fn test_resample_linear_withEndpoints_shouldPreserveFirstAndLast() {
    let samples = [0.0, 0.25, 0.5, 0.75, 1.0];
    let out = resample_linear(&samples, 9);
    assert_eq!(out.len(), 9);
    assert!((out[0] - 0.0).abs() < 1e-6);
    assert!((out[8] - 1.0).abs() < 1e-6);
}

/// Test resampling a linear ramp stays a linear ramp
#[test]
fn test_resample_linear_withRamp_shouldInterpolateSmoothly() {
    let samples: Vec<f32> = (0..100).map(|i| i as f32 / 99.0).collect();
    let out = resample_linear(&samples, 50);
    for (i, &v) in out.iter().enumerate() {
        let expected = i as f32 / 49.0;
        assert!((v - expected).abs() < 0.02, "index {}: {} vs {}", i, v, expected);
    }
}

/// Test degenerate resampling inputs
#[test]
fn test_resample_linear_withDegenerateInputs_shouldNotPanic() {
    assert!(resample_linear(&[], 10).is_empty());
    assert_eq!(resample_linear(&[0.5], 4), vec![0.5; 4]);
    assert_eq!(resample_linear(&[0.1, 0.9], 1).len(), 1);
    assert!(resample_linear(&[0.1, 0.9], 0).is_empty());
}

/// Test buffer duration accounting
#[test]
fn test_audio_buffer_duration_withKnownLength_shouldMatch() {
    let buffer = AudioBuffer::silence(44100, 44100);
    assert_eq!(buffer.len(), 44100);
    assert!((buffer.duration_s() - 1.0).abs() < 1e-9);
    assert!(!buffer.is_empty());
    assert!(AudioBuffer::new(Vec::new(), 44100).is_empty());
}

/// Test WAV write/read round trip through 16-bit quantization
#[test]
fn test_wav_round_trip_withRandomSignal_shouldSurviveQuantization() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("roundtrip.wav");

    let mut rng = rand::rng();
    let samples: Vec<f32> = (0..4800).map(|_| rng.random_range(-0.8..0.8)).collect();
    let original = AudioBuffer::new(samples, 48000);
    original.write_wav(&path)?;

    let loaded = AudioBuffer::read_wav(&path)?;
    assert_eq!(loaded.sample_rate, 48000);
    assert_eq!(loaded.len(), original.len());
    for (a, b) in original.samples.iter().zip(loaded.samples.iter()) {
        assert!((a - b).abs() < 1e-3);
    }
    Ok(())
}

/// Test that write_wav creates missing parent directories
#[test]
fn test_write_wav_withMissingParentDir_shouldCreateIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("nested/deeper/out.wav");

    AudioBuffer::silence(100, 16000).write_wav(&path)?;
    assert!(path.exists());
    Ok(())
}

/// Test rate conversion preserves duration
#[test]
fn test_resampled_withRateChange_shouldPreserveDuration() {
    let buffer = common::sine_tone(2.0, 22050, 440.0, 0.5);
    let converted = buffer.resampled(44100);
    assert_eq!(converted.sample_rate, 44100);
    assert!((converted.duration_s() - 2.0).abs() < 0.001);
}

/// Test that resampling to the same rate is a no-op on length
#[test]
fn test_resampled_withSameRate_shouldKeepLength() {
    let buffer = common::sine_tone(1.0, 44100, 440.0, 0.5);
    let converted = buffer.resampled(44100);
    assert_eq!(converted.len(), buffer.len());
}
