use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use regex::Regex;
use once_cell::sync::Lazy;
use std::process::Command;

// @module: File and directory utilities

// @const: SRT shape check for extensionless subtitle files
static SRT_SHAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+\s*\r?\n\d{1,2}:\d{2}:\d{2},\d{3}\s+-->\s+\d{1,2}:\d{2}:\d{2},\d{3}").unwrap()
});

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        }
        Ok(())
    }

    /// Read a text file, stripping a UTF-8 BOM when present
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        Ok(content
            .strip_prefix('\u{feff}')
            .map(|s| s.to_string())
            .unwrap_or(content))
    }

    // @generates: Output path for a produced artifact
    // @params: input_file, output_dir, tag, extension
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(
        input_file: P1,
        output_dir: P2,
        tag: &str,
        extension: &str,
    ) -> PathBuf {
        let input_file = input_file.as_ref();
        let output_dir = output_dir.as_ref();

        let stem = input_file.file_stem().unwrap_or_default();

        let mut output_filename = stem.to_string_lossy().to_string();
        output_filename.push('.');
        output_filename.push_str(tag);
        output_filename.push('.');
        output_filename.push_str(extension);

        output_dir.join(output_filename)
    }

    /// Detect whether a file is a subtitle document, an audio file, or a
    /// video container supported by ffmpeg
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> Result<FileType> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("File does not exist: {}", path.display()));
        }

        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy().to_lowercase();

            if matches!(ext_str.as_str(), "srt" | "ass" | "ssa") {
                return Ok(FileType::Subtitle);
            }

            if matches!(ext_str.as_str(), "wav" | "flac" | "mp3" | "aac" | "opus" | "ogg") {
                return Ok(FileType::Audio);
            }

            // Common video container extensions; not exhaustive but covers
            // what anime releases actually ship as
            let video_extensions = [
                "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v",
                "mpg", "mpeg", "ogv", "ts", "mts", "m2ts",
            ];
            if video_extensions.contains(&ext_str.as_str()) {
                return Ok(FileType::Video);
            }
        }

        // Subtitle shape check comes before probing; ffprobe happily demuxes
        // SRT text and would report it as a media container
        if let Ok(content) = fs::read_to_string(path) {
            if content.contains("[Script Info]") {
                return Ok(FileType::Subtitle);
            }
            if content.contains("-->") && SRT_SHAPE_REGEX.is_match(&content) {
                return Ok(FileType::Subtitle);
            }
        }

        // If extension check doesn't work, try to examine the file with ffprobe
        let output = Command::new("ffprobe")
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=format_name")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(path)
            .output();

        if let Ok(output) = output {
            if output.status.success() {
                let format = String::from_utf8_lossy(&output.stdout).trim().to_lowercase();
                if !format.is_empty() {
                    return Ok(FileType::Video);
                }
            }
        }

        Ok(FileType::Unknown)
    }
}

/// Enum representing different file types
#[derive(Debug, PartialEq, Eq)]
pub enum FileType {
    /// Subtitle document (SRT/ASS/SSA)
    Subtitle,
    /// Standalone audio file
    Audio,
    /// Video container supported by ffmpeg
    Video,
    /// Unknown file type
    Unknown,
}
