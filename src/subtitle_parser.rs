use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use regex::Regex;
use once_cell::sync::Lazy;
use log::{warn, debug};
use crate::errors::SubtitleError;

// @module: Subtitle parsing into a canonical dialogue timeline

// @const: SRT timestamp regex (comma or dot before the millisecond part)
static SRT_TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})").unwrap()
});

// @const: Blank-line block separator for SRT documents
static SRT_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\r?\n\s*\r?\n").unwrap()
});

// @const: Content sniffer for the numbered-block dialect
static SRT_SNIFF_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\d+\s*\r?\n\d{1,2}:\d{2}:\d{2}").unwrap()
});

// @const: HTML-style inline markup in SRT text
static HTML_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<[^>]+>").unwrap()
});

// @const: ASS override blocks: {\tag}, {\tag(value)}, {\tag&Hvalue&}
static ASS_OVERRIDE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{[^}]*\}").unwrap()
});

// @const: ASS timestamp: H:MM:SS.cc or H:MM:SS.mmm
static ASS_TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+):(\d{2}):(\d{2})\.(\d{2,3})").unwrap()
});

// @const: Whitespace run collapser
static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").unwrap()
});

/// ASS styles that typically carry typesetting/signs rather than dialogue.
/// Matched case-insensitively against the style label of each Dialogue line.
pub const DEFAULT_EXCLUDED_STYLES: &[&str] = &[
    "sign", "signs", "sign2", "sign3",
    "title", "title2",
    "op", "op1", "op2", "opening",
    "ed", "ed1", "ed2", "ending",
    "karaoke", "kara",
    "note", "notes",
    "flashback",
    "top", "top-i",
    "insert", "insert song",
    "typeset", "typesetting", "ts",
    "staff", "credit", "credits",
    "song", "lyrics",
];

/// Build the default exclusion set as an owned, lowercased HashSet
pub fn default_excluded_styles() -> HashSet<String> {
    DEFAULT_EXCLUDED_STYLES.iter().map(|s| s.to_string()).collect()
}

/// Maximum gap between two identical-text entries that still merges them
const DEDUP_MAX_GAP_MS: i64 = 500;

/// Supported subtitle dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    /// Numbered-block dialect (SubRip)
    Srt,
    /// Styled dialect with a header-declared field schema (ASS/SSA)
    Ass,
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Srt => write!(f, "srt"),
            Self::Ass => write!(f, "ass"),
        }
    }
}

impl std::str::FromStr for SubtitleFormat {
    type Err = SubtitleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim_start_matches('.') {
            "srt" => Ok(Self::Srt),
            "ass" | "ssa" => Ok(Self::Ass),
            other => Err(SubtitleError::UnknownFormat(other.to_string())),
        }
    }
}

// @struct: Single dialogue entry on the timeline
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DialogueEntry {
    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms (always > start_ms)
    pub end_ms: u64,

    // @field: Cleaned dialogue text, markup-free and non-empty
    pub text: String,

    // @field: ASS style label (empty for SRT)
    pub style: String,

    // @field: ASS Name field (empty for SRT)
    pub speaker: String,

    // @field: Dense 0-based position in the filtered timeline
    pub sequence_index: usize,
}

impl DialogueEntry {
    /// Creates a new dialogue entry - used by tests and external consumers
    #[allow(dead_code)]
    pub fn new(start_ms: u64, end_ms: u64, text: &str) -> Self {
        DialogueEntry {
            start_ms,
            end_ms,
            text: text.to_string(),
            style: String::new(),
            speaker: String::new(),
            sequence_index: 0,
        }
    }

    // @creates: Validated dialogue entry
    // @validates: Time range and non-empty cleaned text
    fn new_validated(
        start_ms: u64,
        end_ms: u64,
        text: String,
        style: String,
        speaker: String,
    ) -> Option<Self> {
        if end_ms <= start_ms {
            return None;
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(DialogueEntry {
            start_ms,
            end_ms,
            text: trimmed.to_string(),
            style,
            speaker,
            sequence_index: 0,
        })
    }

    /// Entry duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    /// Entry duration in seconds
    pub fn duration_s(&self) -> f64 {
        self.duration_ms() as f64 / 1000.0
    }

    /// Format a timestamp in milliseconds as HH:MM:SS,mmm
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for DialogueEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let preview: String = if self.text.chars().count() > 50 {
            let mut p: String = self.text.chars().take(50).collect();
            p.push_str("...");
            p
        } else {
            self.text.clone()
        };
        write!(
            f,
            "[{}] {} --> {} {:?}",
            self.sequence_index,
            Self::format_timestamp(self.start_ms),
            Self::format_timestamp(self.end_ms),
            preview
        )
    }
}

/// Options controlling the post-parse filtering pipeline
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Style labels to exclude (default exclusion set when None)
    pub exclude_styles: Option<HashSet<String>>,

    /// Entries shorter than this are dropped (frame-flicker artifacts)
    pub min_duration_ms: u64,

    /// Collapse runs of consecutive identical-text entries
    pub deduplicate: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            exclude_styles: None,
            min_duration_ms: 100,
            deduplicate: true,
        }
    }
}

/// Ordered dialogue timeline with provenance metadata
#[derive(Debug)]
pub struct Timeline {
    /// Filtered dialogue entries, in source order
    pub entries: Vec<DialogueEntry>,

    /// Dialect the document was parsed as
    pub format: SubtitleFormat,

    /// Raw entry count before any filtering
    pub total_raw_entries: usize,

    /// Entries removed by style exclusion, validation, duration and dedup filters
    pub filtered_entries: usize,

    /// Distinct style labels encountered in the document
    pub styles_found: HashSet<String>,

    /// Source document path, when parsed from a file
    pub source_path: Option<PathBuf>,
}

impl Timeline {
    /// Number of dialogue entries that survived filtering
    pub fn dialogue_count(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries survived
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One-line provenance summary for logging
    pub fn summary(&self) -> String {
        let mut styles: Vec<&String> = self.styles_found.iter().collect();
        styles.sort();
        format!(
            "Format: {} | Dialogue: {} lines | Filtered: {} | Styles: {:?}",
            self.format,
            self.dialogue_count(),
            self.filtered_entries,
            styles
        )
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Dialogue Timeline")?;
        writeln!(f, "Source: {:?}", self.source_path)?;
        writeln!(f, "{}", self.summary())?;
        Ok(())
    }
}

/// Parse a subtitle file into a dialogue timeline.
///
/// Format resolution order: explicit hint, file extension, content sniffing.
/// Fails with `SubtitleError::FileNotFound` when the input does not exist and
/// `SubtitleError::UnknownFormat` when no dialect can be identified.
pub fn parse_file<P: AsRef<Path>>(
    path: P,
    format_hint: Option<SubtitleFormat>,
    options: &ParseOptions,
) -> Result<Timeline, SubtitleError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SubtitleError::FileNotFound(path.display().to_string()));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| SubtitleError::FileNotFound(format!("{}: {}", path.display(), e)))?;
    // Strip UTF-8 BOM so the first line matches cleanly
    let content = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

    let format = match format_hint {
        Some(fmt) => fmt,
        None => resolve_format(path, content)?,
    };

    let mut timeline = parse_str(content, format, options)?;
    timeline.source_path = Some(path.to_path_buf());

    debug!(
        "Parsed {}: {} dialogue lines ({} filtered from {} raw)",
        path.display(),
        timeline.dialogue_count(),
        timeline.filtered_entries,
        timeline.total_raw_entries
    );
    Ok(timeline)
}

/// Parse subtitle content already in memory
pub fn parse_str(
    content: &str,
    format: SubtitleFormat,
    options: &ParseOptions,
) -> Result<Timeline, SubtitleError> {
    let excluded = match &options.exclude_styles {
        Some(set) => set.iter().map(|s| s.trim().to_lowercase()).collect(),
        None => default_excluded_styles(),
    };

    let mut timeline = match format {
        SubtitleFormat::Srt => parse_srt(content),
        SubtitleFormat::Ass => parse_ass(content, &excluded)?,
    };

    apply_filters(&mut timeline, options);
    Ok(timeline)
}

/// Resolve the dialect from the file extension, falling back to content sniffing
fn resolve_format(path: &Path, content: &str) -> Result<SubtitleFormat, SubtitleError> {
    if let Some(ext) = path.extension() {
        if let Ok(fmt) = ext.to_string_lossy().parse::<SubtitleFormat>() {
            return Ok(fmt);
        }
    }
    sniff_format(content).ok_or_else(|| {
        SubtitleError::UnknownFormat(path.display().to_string())
    })
}

/// Identify the dialect from document content alone
pub fn sniff_format(content: &str) -> Option<SubtitleFormat> {
    if content.contains("[Script Info]") || content.contains("[V4+ Styles]") {
        Some(SubtitleFormat::Ass)
    } else if SRT_SNIFF_REGEX.is_match(content) {
        Some(SubtitleFormat::Srt)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// SRT parsing
// ---------------------------------------------------------------------------

fn parse_srt(content: &str) -> Timeline {
    let mut timeline = Timeline {
        entries: Vec::new(),
        format: SubtitleFormat::Srt,
        total_raw_entries: 0,
        filtered_entries: 0,
        styles_found: HashSet::new(),
        source_path: None,
    };

    for block in SRT_BLOCK_REGEX.split(content.trim()) {
        let lines: Vec<&str> = block.trim().lines().collect();
        if lines.is_empty() {
            continue;
        }

        timeline.total_raw_entries += 1;

        // A lone index line is still a block; keep it on the books
        if lines.len() < 2 {
            timeline.filtered_entries += 1;
            continue;
        }

        // The timestamp line is not always the second line; the numeric
        // index line may be missing in the wild
        let mut timestamp_caps = None;
        let mut text_start = 0;
        for (i, line) in lines.iter().enumerate() {
            if let Some(caps) = SRT_TIMESTAMP_REGEX.captures(line) {
                timestamp_caps = Some(caps);
                text_start = i + 1;
                break;
            }
        }

        let caps = match timestamp_caps {
            Some(caps) if text_start < lines.len() => caps,
            _ => {
                timeline.filtered_entries += 1;
                continue;
            }
        };

        let start_ms = srt_groups_to_ms(&caps, 1);
        let end_ms = srt_groups_to_ms(&caps, 5);

        let text = strip_markup_tags(&lines[text_start..].join(" "));

        match DialogueEntry::new_validated(start_ms, end_ms, text, String::new(), String::new()) {
            Some(entry) => timeline.entries.push(entry),
            None => timeline.filtered_entries += 1,
        }
    }

    timeline
}

/// Convert four SRT timestamp regex groups starting at `offset` to milliseconds
fn srt_groups_to_ms(caps: &regex::Captures, offset: usize) -> u64 {
    let group = |idx: usize| -> u64 {
        caps.get(offset + idx)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0))
    };
    group(0) * 3_600_000 + group(1) * 60_000 + group(2) * 1_000 + group(3)
}

/// Remove HTML-style inline tags from SRT text. Idempotent.
pub fn strip_markup_tags(text: &str) -> String {
    let stripped = HTML_TAG_REGEX.replace_all(text, "");
    WHITESPACE_REGEX.replace_all(stripped.trim(), " ").to_string()
}

// ---------------------------------------------------------------------------
// ASS/SSA parsing
// ---------------------------------------------------------------------------

fn parse_ass(content: &str, excluded: &HashSet<String>) -> Result<Timeline, SubtitleError> {
    let mut timeline = Timeline {
        entries: Vec::new(),
        format: SubtitleFormat::Ass,
        total_raw_entries: 0,
        filtered_entries: 0,
        styles_found: HashSet::new(),
        source_path: None,
    };

    let mut in_events = false;
    let mut format_fields: Vec<String> = Vec::new();
    let mut orphan_dialogue = 0usize;

    for line in content.lines() {
        let stripped = line.trim();

        if stripped.to_lowercase().starts_with("[events]") {
            in_events = true;
            continue;
        }

        if !in_events {
            continue;
        }

        if stripped.starts_with('[') {
            break; // Next section
        }

        if stripped.to_lowercase().starts_with("format:") {
            let format_str = stripped.splitn(2, ':').nth(1).unwrap_or("");
            format_fields = format_str
                .split(',')
                .map(|f| f.trim().to_lowercase())
                .collect();
            continue;
        }

        if !stripped.starts_with("Dialogue:") {
            continue;
        }

        timeline.total_raw_entries += 1;

        if format_fields.is_empty() {
            warn!("Dialogue line found before Format line; skipping");
            orphan_dialogue += 1;
            timeline.filtered_entries += 1;
            continue;
        }

        if let Some(entry) = parse_ass_dialogue_line(stripped, &format_fields, excluded, &mut timeline) {
            timeline.entries.push(entry);
        }
    }

    // Dialogue lines with no schema anywhere in the document means the header
    // is structurally missing, which is fatal for the whole parse
    if format_fields.is_empty() && orphan_dialogue > 0 {
        return Err(SubtitleError::MissingFormatLine);
    }

    Ok(timeline)
}

fn parse_ass_dialogue_line(
    line: &str,
    format_fields: &[String],
    excluded: &HashSet<String>,
    timeline: &mut Timeline,
) -> Option<DialogueEntry> {
    let data = line.splitn(2, ':').nth(1).unwrap_or("").trim();

    // The trailing Text field may contain commas, so split into at most
    // the declared field count
    let parts: Vec<&str> = data.splitn(format_fields.len(), ',').collect();
    if parts.len() < format_fields.len() {
        timeline.filtered_entries += 1;
        return None;
    }

    let field = |name: &str| -> &str {
        format_fields
            .iter()
            .position(|f| f == name)
            .map_or("", |i| parts[i].trim())
    };

    let style = field("style").to_string();
    timeline.styles_found.insert(style.clone());

    if excluded.contains(&style.to_lowercase()) {
        timeline.filtered_entries += 1;
        return None;
    }

    let start_ms = ass_time_to_ms(field("start"));
    let end_ms = ass_time_to_ms(field("end"));
    let (start_ms, end_ms) = match (start_ms, end_ms) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            timeline.filtered_entries += 1;
            return None;
        }
    };

    let speaker = field("name").to_string();
    let text = clean_ass_text(field("text"));

    match DialogueEntry::new_validated(start_ms, end_ms, text, style, speaker) {
        Some(entry) => Some(entry),
        None => {
            timeline.filtered_entries += 1;
            None
        }
    }
}

/// Convert an ASS timestamp (H:MM:SS.cc or H:MM:SS.mmm) to milliseconds.
///
/// ASS traditionally uses centiseconds; some muxers emit milliseconds.
/// The fractional digit count disambiguates.
pub fn ass_time_to_ms(time_str: &str) -> Option<u64> {
    let caps = ASS_TIME_REGEX.captures(time_str)?;

    let h: u64 = caps.get(1)?.as_str().parse().ok()?;
    let m: u64 = caps.get(2)?.as_str().parse().ok()?;
    let s: u64 = caps.get(3)?.as_str().parse().ok()?;
    let frac = caps.get(4)?.as_str();

    let ms: u64 = if frac.len() == 2 {
        frac.parse::<u64>().ok()? * 10
    } else {
        frac.parse().ok()?
    };

    Some(h * 3_600_000 + m * 60_000 + s * 1_000 + ms)
}

/// Remove ASS override blocks and escape sequences from dialogue text. Idempotent.
pub fn clean_ass_text(text: &str) -> String {
    let stripped = ASS_OVERRIDE_REGEX.replace_all(text, "");
    let unescaped = stripped
        .replace("\\N", " ")
        .replace("\\n", " ")
        .replace("\\h", " ");
    WHITESPACE_REGEX
        .replace_all(&unescaped, " ")
        .trim()
        .trim_matches('\u{feff}')
        .to_string()
}

// ---------------------------------------------------------------------------
// Post-parse filtering
// ---------------------------------------------------------------------------

/// Apply the dialect-independent filter pipeline.
///
/// Order is deliberate: the short-entry filter must run before dedup so a
/// flicker entry cannot bridge two unrelated runs through the merge-gap check.
fn apply_filters(timeline: &mut Timeline, options: &ParseOptions) {
    let pre_count = timeline.entries.len();
    timeline
        .entries
        .retain(|e| e.duration_ms() >= options.min_duration_ms);
    timeline.filtered_entries += pre_count - timeline.entries.len();

    if options.deduplicate {
        let pre_count = timeline.entries.len();
        timeline.entries = deduplicate_sequential(std::mem::take(&mut timeline.entries));
        timeline.filtered_entries += pre_count - timeline.entries.len();
    }

    for (i, entry) in timeline.entries.iter_mut().enumerate() {
        entry.sequence_index = i;
    }
}

/// Collapse runs of consecutive entries with byte-identical text.
///
/// Fansub sign typesetting repeats the same text across many frame-by-frame
/// entries; a run merges into one entry spanning from the first start to the
/// maximum end seen, keeping the first entry's style and speaker.
fn deduplicate_sequential(entries: Vec<DialogueEntry>) -> Vec<DialogueEntry> {
    let mut iter = entries.into_iter();
    let mut current = match iter.next() {
        Some(entry) => entry,
        None => return Vec::new(),
    };

    let mut deduplicated = Vec::new();
    for next in iter {
        let gap = next.start_ms as i64 - current.end_ms as i64;
        if next.text == current.text && gap < DEDUP_MAX_GAP_MS {
            current.end_ms = current.end_ms.max(next.end_ms);
        } else {
            deduplicated.push(current);
            current = next;
        }
    }
    deduplicated.push(current);
    deduplicated
}
