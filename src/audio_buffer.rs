use std::path::Path;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use crate::errors::AudioError;

// @module: Mono f32 audio buffers and WAV I/O

/// A mono audio buffer with float samples in [-1.0, 1.0]
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono PCM samples
    pub samples: Vec<f32>,

    /// Samples per second
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from existing samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        AudioBuffer { samples, sample_rate }
    }

    /// Create a silent buffer of the given length
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        AudioBuffer {
            samples: vec![0.0; len],
            sample_rate,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Buffer duration in seconds
    pub fn duration_s(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Read a WAV file into a mono buffer.
    ///
    /// 16/24/32-bit integer and 32-bit float encodings are supported;
    /// multichannel input is averaged down to one channel.
    pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Self, AudioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AudioError::FileNotFound(path.display().to_string()));
        }

        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels as usize;

        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, _) => reader
                .samples::<f32>()
                .collect::<Result<Vec<f32>, _>>()?,
            (SampleFormat::Int, bits) => {
                let scale = (1i64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<f32>, _>>()?
            }
        };

        let samples = downmix_to_mono(&interleaved, channels);

        debug!(
            "Read {}: {} samples, {} Hz, {} channel(s)",
            path.display(),
            samples.len(),
            spec.sample_rate,
            channels
        );

        Ok(AudioBuffer {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    /// Write the buffer as a 16-bit PCM WAV file, creating parent directories
    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<(), AudioError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AudioError::FileNotFound(format!("{}: {}", parent.display(), e)))?;
        }

        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Resample the buffer to a new rate with linear interpolation
    pub fn resampled(&self, target_rate: u32) -> AudioBuffer {
        if self.sample_rate == target_rate {
            return self.clone();
        }
        let ratio = target_rate as f64 / self.sample_rate as f64;
        let target_len = (self.samples.len() as f64 * ratio).round() as usize;
        AudioBuffer {
            samples: resample_linear(&self.samples, target_len),
            sample_rate: target_rate,
        }
    }
}

/// Average interleaved multichannel samples down to mono
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Root-mean-square amplitude of a sample slice
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Peak absolute amplitude of a sample slice
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

/// Convert a decibel gain to a linear multiplication factor
pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Resample a sample slice to an exact target length via linear interpolation.
///
/// This changes pitch along with duration. Good enough for short dialogue
/// clips; anything higher-fidelity belongs behind the assembler's stretch seam.
pub fn resample_linear(samples: &[f32], target_len: usize) -> Vec<f32> {
    if target_len == 0 || samples.is_empty() {
        return Vec::new();
    }
    if samples.len() == target_len {
        return samples.to_vec();
    }
    if samples.len() == 1 {
        return vec![samples[0]; target_len];
    }

    let src_max = (samples.len() - 1) as f64;
    let step = if target_len == 1 {
        0.0
    } else {
        src_max / (target_len - 1) as f64
    };

    (0..target_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            if idx + 1 < samples.len() {
                samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
            } else {
                samples[idx]
            }
        })
        .collect()
}
