/*!
 * Error types for the otodub application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 *
 * Structural failures (input missing, format unidentifiable) are errors and
 * abort the stage. Per-item failures (one bad line, one silent clip) are not
 * errors at all; they are dropped and reported through summary counters.
 */

// Allow dead code - error types are for library consumers
#![allow(dead_code)]

use thiserror::Error;

/// Errors that can occur when parsing subtitle documents
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// The subtitle document does not exist
    #[error("Subtitle file not found: {0}")]
    FileNotFound(String),

    /// Neither the format hint nor content sniffing identified a dialect
    #[error("Unsupported subtitle format: {0}")]
    UnknownFormat(String),

    /// Dialogue lines appeared before the Format directive declared a schema
    #[error("Dialogue lines present but no Format directive found in [Events] section")]
    MissingFormatLine,

    /// Parsing succeeded but every entry was filtered out
    #[error("No dialogue entries survived parsing and filtering: {0}")]
    NoDialogue(String),
}

/// Errors that can occur when reading, writing or processing audio
#[derive(Error, Debug)]
pub enum AudioError {
    /// The referenced audio file does not exist
    #[error("Audio file not found: {0}")]
    FileNotFound(String),

    /// Error from the WAV codec
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// A track required to have content was empty
    #[error("Audio track is empty: {0}")]
    EmptyTrack(String),
}

/// Errors from the external media toolkit boundary (ffmpeg/ffprobe/demucs)
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// ffprobe invocation failed or produced unparseable output
    #[error("Media probe failed: {0}")]
    ProbeFailed(String),

    /// ffmpeg invocation returned a non-zero status
    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    /// No stream with the requested language/type exists in the container
    #[error("No matching {stream_type} stream for language '{language}'")]
    NoMatchingStream {
        /// Stream type that was searched for ("audio" or "subtitle")
        stream_type: String,
        /// Language tag that was requested
        language: String,
    },

    /// All candidate subtitle streams are image-based and cannot be parsed
    #[error("Subtitle track is bitmap-based ({0}) and cannot be converted to text")]
    BitmapSubtitles(String),

    /// The external command did not finish within its allotted time
    #[error("External command timed out: {0}")]
    Timeout(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from subtitle parsing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from audio processing
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Error from the media toolkit boundary
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
