use std::path::{Path, PathBuf};
use std::time::Duration;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::process::Command;
use walkdir::WalkDir;
use crate::errors::ExtractionError;
use crate::file_utils::FileManager;

// @module: Thin subprocess boundary around ffmpeg/ffprobe

/// Timeout for ffprobe stream inspection
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for ffmpeg extraction and muxing
const FFMPEG_TIMEOUT: Duration = Duration::from_secs(300);

/// One stream from an ffprobe report
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Absolute stream index in the container
    pub index: usize,
    /// "audio", "subtitle", "video", ...
    pub codec_type: String,
    /// Codec name as reported by ffprobe
    pub codec_name: String,
    /// Language tag, when present
    pub language: Option<String>,
    /// Track title, when present
    pub title: Option<String>,
}

/// Probe a media file and return its streams
pub async fn probe_streams<P: AsRef<Path>>(media_path: P) -> Result<Vec<StreamInfo>, ExtractionError> {
    let media_path = media_path.as_ref();

    if !media_path.exists() {
        return Err(ExtractionError::ProbeFailed(format!(
            "media file not found: {}",
            media_path.display()
        )));
    }

    let ffprobe_future = Command::new("ffprobe")
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_streams",
            media_path.to_str().unwrap_or(""),
        ])
        .output();

    let output = tokio::select! {
        result = ffprobe_future => {
            result.map_err(|e| ExtractionError::ProbeFailed(format!("failed to execute ffprobe: {}", e)))?
        },
        _ = tokio::time::sleep(PROBE_TIMEOUT) => {
            return Err(ExtractionError::Timeout("ffprobe".to_string()));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("ffprobe failed: {}", stderr);
        return Err(ExtractionError::ProbeFailed(stderr.to_string()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: Value = serde_json::from_str(&stdout)
        .map_err(|e| ExtractionError::ProbeFailed(format!("unparseable ffprobe output: {}", e)))?;

    let mut streams = Vec::new();
    if let Some(entries) = json.get("streams").and_then(|s| s.as_array()) {
        for stream in entries {
            let index = stream
                .get("index")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(0);
            let codec_type = stream
                .get("codec_type")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let codec_name = stream
                .get("codec_name")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let language = stream
                .get("tags")
                .and_then(|t| t.get("language"))
                .and_then(|l| l.as_str())
                .map(|s| s.to_string());
            let title = stream
                .get("tags")
                .and_then(|t| t.get("title"))
                .and_then(|l| l.as_str())
                .map(|s| s.to_string());

            streams.push(StreamInfo {
                index,
                codec_type,
                codec_name,
                language,
                title,
            });
        }
    }

    Ok(streams)
}

/// Check if a subtitle codec is bitmap-based (cannot be converted to text)
pub fn is_bitmap_codec(codec_name: &str) -> bool {
    matches!(
        codec_name,
        "hdmv_pgs_subtitle" | "dvd_subtitle" | "dvb_subtitle" | "xsub"
    )
}

/// Pick the first stream of the given type whose language tag matches
fn select_stream<'a>(
    streams: &'a [StreamInfo],
    codec_type: &str,
    language: &str,
) -> Option<&'a StreamInfo> {
    streams
        .iter()
        .filter(|s| s.codec_type == codec_type)
        .find(|s| {
            s.language
                .as_deref()
                .map(|l| l.starts_with(language) || language_codes_match(l, language))
                .unwrap_or(false)
        })
}

/// Compare two ISO language tags, tolerating 639-1 vs 639-2/3 forms
pub fn language_codes_match(a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    let parse = |code: &str| -> Option<isolang::Language> {
        isolang::Language::from_639_1(code).or_else(|| isolang::Language::from_639_3(code))
    };
    match (parse(a), parse(b)) {
        (Some(la), Some(lb)) => la == lb,
        _ => false,
    }
}

/// Extract the audio track for a language as 44.1 kHz stereo PCM WAV
pub async fn extract_audio_track<P: AsRef<Path>>(
    media_path: P,
    output_dir: P,
    language: &str,
) -> Result<PathBuf, ExtractionError> {
    let media_path = media_path.as_ref();
    let output_dir = output_dir.as_ref();
    FileManager::ensure_dir(output_dir)
        .map_err(|e| ExtractionError::FfmpegFailed(e.to_string()))?;

    let streams = probe_streams(media_path).await?;
    let stream = select_stream(&streams, "audio", language).ok_or_else(|| {
        ExtractionError::NoMatchingStream {
            stream_type: "audio".to_string(),
            language: language.to_string(),
        }
    })?;

    let stem = media_path.file_stem().unwrap_or_default().to_string_lossy();
    let audio_file = output_dir.join(format!("{}_audio_{}.wav", stem, language));

    info!(
        "Extracting audio: {} (stream {}) -> {}",
        media_path.display(),
        stream.index,
        audio_file.display()
    );

    run_ffmpeg(&[
        "-y",
        "-i", media_path.to_str().unwrap_or_default(),
        "-map", &format!("0:{}", stream.index),
        "-acodec", "pcm_s16le",
        "-ar", "44100",
        "-ac", "2",
        audio_file.to_str().unwrap_or_default(),
    ])
    .await?;

    Ok(audio_file)
}

/// Extract the subtitle track for a language, preserving its native codec.
///
/// ASS streams must stay ASS; transcoding to SRT would throw away the style
/// labels the timeline parser filters on.
pub async fn extract_subtitle_track<P: AsRef<Path>>(
    media_path: P,
    output_dir: P,
    language: &str,
) -> Result<Option<PathBuf>, ExtractionError> {
    let media_path = media_path.as_ref();
    let output_dir = output_dir.as_ref();
    FileManager::ensure_dir(output_dir)
        .map_err(|e| ExtractionError::FfmpegFailed(e.to_string()))?;

    let streams = probe_streams(media_path).await?;
    let stream = match select_stream(&streams, "subtitle", language) {
        Some(stream) => stream,
        None => {
            warn!(
                "No embedded {} subtitles in {}",
                language,
                media_path.display()
            );
            return Ok(find_external_subtitles(media_path, language));
        }
    };

    if is_bitmap_codec(&stream.codec_name) {
        return Err(ExtractionError::BitmapSubtitles(stream.codec_name.clone()));
    }

    let ext = match stream.codec_name.as_str() {
        "ass" | "ssa" => ".ass",
        "webvtt" => ".vtt",
        _ => ".srt",
    };
    let stem = media_path.file_stem().unwrap_or_default().to_string_lossy();
    let sub_file = output_dir.join(format!("{}_subs_{}{}", stem, language, ext));

    info!(
        "Extracting subtitles: {} (stream {}) -> {}",
        media_path.display(),
        stream.index,
        sub_file.display()
    );

    run_ffmpeg(&[
        "-y",
        "-i", media_path.to_str().unwrap_or_default(),
        "-map", &format!("0:{}", stream.index),
        "-c:s", "copy",
        sub_file.to_str().unwrap_or_default(),
    ])
    .await?;

    Ok(Some(sub_file))
}

/// Look for sidecar subtitle files next to the media file
pub fn find_external_subtitles(media_path: &Path, language: &str) -> Option<PathBuf> {
    let stem = media_path.file_stem()?.to_string_lossy().to_string();
    let parent = media_path.parent()?;

    let candidates = [
        format!("{}.{}.srt", stem, language),
        format!("{}.{}.ass", stem, language),
        format!("{}.{}.ssa", stem, language),
        format!("{}.srt", stem),
        format!("{}.ass", stem),
    ];

    for entry in WalkDir::new(parent)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let name = entry.file_name().to_string_lossy();
        if candidates.iter().any(|c| c == &name) {
            info!("Found external subtitles: {}", name);
            return Some(entry.path().to_path_buf());
        }
    }
    None
}

/// Mux the dubbed audio into the container as an additional track.
///
/// All original streams are kept; the new track carries a language tag and a
/// human-readable title.
pub async fn mux_dubbed_audio<P: AsRef<Path>>(
    source_media: P,
    dubbed_audio: P,
    output_media: P,
    target_language: &str,
) -> Result<PathBuf, ExtractionError> {
    let source_media = source_media.as_ref();
    let dubbed_audio = dubbed_audio.as_ref();
    let output_media = output_media.as_ref();

    let lang = isolang::Language::from_639_1(target_language)
        .or_else(|| isolang::Language::from_639_3(target_language));
    let lang_tag = lang
        .map(|l| l.to_639_3().to_string())
        .unwrap_or_else(|| target_language.to_string());
    let title = format!(
        "{} (AI Dubbed)",
        lang.map(|l| l.to_name().to_string())
            .unwrap_or_else(|| target_language.to_uppercase())
    );

    info!(
        "Muxing dubbed track into {} (language: {})",
        output_media.display(),
        lang_tag
    );

    let language_meta = format!("language={}", lang_tag);
    let title_meta = format!("title={}", title);

    run_ffmpeg(&[
        "-y",
        "-i", source_media.to_str().unwrap_or_default(),
        "-i", dubbed_audio.to_str().unwrap_or_default(),
        "-map", "0",
        "-map", "1:a:0",
        "-c", "copy",
        "-c:a:1", "aac",
        "-metadata:s:a:1", &language_meta,
        "-metadata:s:a:1", &title_meta,
        output_media.to_str().unwrap_or_default(),
    ])
    .await?;

    Ok(output_media.to_path_buf())
}

/// Run ffmpeg with a timeout, surfacing filtered stderr on failure
async fn run_ffmpeg(args: &[&str]) -> Result<(), ExtractionError> {
    debug!("ffmpeg {}", args.join(" "));

    let ffmpeg_future = Command::new("ffmpeg").args(args).output();

    let result = tokio::select! {
        result = ffmpeg_future => {
            result.map_err(|e| ExtractionError::FfmpegFailed(format!("failed to execute ffmpeg: {}", e)))?
        },
        _ = tokio::time::sleep(FFMPEG_TIMEOUT) => {
            return Err(ExtractionError::Timeout("ffmpeg".to_string()));
        }
    };

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let filtered = filter_ffmpeg_stderr(&stderr);
        error!("ffmpeg failed: {}", filtered);
        return Err(ExtractionError::FfmpegFailed(filtered));
    }
    Ok(())
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let dominated_prefixes = [
        "ffmpeg version",
        "  built with",
        "  configuration:",
        "  lib",
        "Input #",
        "  Metadata:",
        "  Duration:",
        "  Chapter",
        "    Chapter",
        "  Stream #",
        "      Metadata:",
        "        title",
        "        BPS",
        "        DURATION",
        "        NUMBER_OF",
        "        _STATISTICS",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return false;
            }
            !dominated_prefixes.iter().any(|p| line.starts_with(p))
        })
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}
