/*!
 * # otodub: anime dubbing timeline core
 *
 * A Rust library for dubbing anime episodes: it parses heterogeneous subtitle
 * documents into a canonical dialogue timeline, cuts voice-reference audio
 * from the separated vocal track, and places independently synthesized
 * replacement clips back onto the timeline with duration correction,
 * overlap-safe mixing and loudness normalization.
 *
 * ## Features
 *
 * - Parse SRT and ASS/SSA subtitle documents into one entry shape
 * - Filter non-dialogue content (signs, karaoke, typesetting) by style
 * - Collapse frame-by-frame repeated entries and flicker artifacts
 * - Slice padded voice-reference clips for voice cloning
 * - Reassemble dubbed clips against the accompaniment bed, sample-accurate
 * - Thin ffmpeg/ffprobe/demucs boundaries for extraction and separation
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_parser`: Subtitle documents → dialogue timeline
 * - `audio_buffer`: Mono f32 buffers and WAV I/O
 * - `vocal_slicer`: Voice reference slicing
 * - `track_assembler`: Clip placement, duration correction, mixing
 * - `media_extractor`: ffmpeg/ffprobe subprocess boundary
 * - `separator`: Source separation subprocess boundary
 * - `file_utils`: File system operations
 * - `app_controller`: Staged pipeline controller
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod audio_buffer;
pub mod errors;
pub mod file_utils;
pub mod media_extractor;
pub mod separator;
pub mod subtitle_parser;
pub mod track_assembler;
pub mod vocal_slicer;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use audio_buffer::AudioBuffer;
pub use errors::{AppError, AudioError, ExtractionError, SubtitleError};
pub use subtitle_parser::{DialogueEntry, ParseOptions, SubtitleFormat, Timeline};
pub use track_assembler::{AssembledTrack, ReplacementClip};
pub use vocal_slicer::ReferenceSegment;
