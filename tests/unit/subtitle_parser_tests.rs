/*!
 * Tests for the subtitle timeline parser
 */

use std::collections::HashSet;
use anyhow::Result;
use otodub::errors::SubtitleError;
use otodub::subtitle_parser::{
    self, DialogueEntry, ParseOptions, SubtitleFormat, ass_time_to_ms, clean_ass_text,
    parse_file, parse_str, sniff_format, strip_markup_tags,
};
use crate::common;

/// Test timestamp formatting for known millisecond values
#[test]
fn test_format_timestamp_withKnownValues_shouldFormatCorrectly() {
    assert_eq!(DialogueEntry::format_timestamp(0), "00:00:00,000");
    assert_eq!(DialogueEntry::format_timestamp(5000), "00:00:05,000");
    assert_eq!(DialogueEntry::format_timestamp(8000), "00:00:08,000");
    assert_eq!(DialogueEntry::format_timestamp(5025678), "01:23:45,678");
}

/// Test SRT parsing of a well-formed document
#[test]
fn test_parse_srt_withBasicDocument_shouldProduceTimeline() -> Result<()> {
    let timeline = parse_str(common::SAMPLE_SRT, SubtitleFormat::Srt, &ParseOptions::default())?;

    assert_eq!(timeline.format, SubtitleFormat::Srt);
    assert_eq!(timeline.dialogue_count(), 3);
    assert_eq!(timeline.total_raw_entries, 3);
    assert_eq!(timeline.filtered_entries, 0);

    let first = &timeline.entries[0];
    assert_eq!(first.start_ms, 1000);
    assert_eq!(first.end_ms, 4000);
    assert_eq!(first.text, "This is a test subtitle.");
    assert_eq!(first.duration_ms(), 3000);

    // Sequence indices are dense and 0-based
    for (i, entry) in timeline.entries.iter().enumerate() {
        assert_eq!(entry.sequence_index, i);
    }
    Ok(())
}

/// Test that HTML-style markup is stripped from SRT text
#[test]
fn test_parse_srt_withHtmlMarkup_shouldStripTags() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:03,000\n<i>Hello</i> <b>world</b>\n";
    let timeline = parse_str(content, SubtitleFormat::Srt, &ParseOptions::default())?;

    assert_eq!(timeline.dialogue_count(), 1);
    assert_eq!(timeline.entries[0].text, "Hello world");
    Ok(())
}

/// Test that the dot millisecond separator variant is accepted
#[test]
fn test_parse_srt_withDotSeparator_shouldParse() -> Result<()> {
    let content = "1\n00:00:01.500 --> 00:00:03.250\nMixed separator dialect.\n";
    let timeline = parse_str(content, SubtitleFormat::Srt, &ParseOptions::default())?;

    assert_eq!(timeline.dialogue_count(), 1);
    assert_eq!(timeline.entries[0].start_ms, 1500);
    assert_eq!(timeline.entries[0].end_ms, 3250);
    Ok(())
}

/// Test multi-line SRT text joining
#[test]
fn test_parse_srt_withMultilineText_shouldJoinLines() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:04,000\nFirst line\nSecond line\n";
    let timeline = parse_str(content, SubtitleFormat::Srt, &ParseOptions::default())?;

    assert_eq!(timeline.dialogue_count(), 1);
    assert!(timeline.entries[0].text.contains("First line"));
    assert!(timeline.entries[0].text.contains("Second line"));
    Ok(())
}

/// Test markup stripping helper directly
#[test]
fn test_strip_markup_tags_withNestedTags_shouldRemoveAll() {
    assert_eq!(strip_markup_tags("<i><b>text</b></i>"), "text");
    assert_eq!(strip_markup_tags("plain"), "plain");
    assert_eq!(
        strip_markup_tags("<font color=\"#ff0000\">red</font>"),
        "red"
    );
}

/// Test ASS parsing with style-based sign exclusion
#[test]
fn test_parse_ass_withSignStyle_shouldExcludeSigns() -> Result<()> {
    let timeline = parse_str(common::SAMPLE_ASS, SubtitleFormat::Ass, &ParseOptions::default())?;

    // The Signs line is excluded, the two Default lines survive
    assert_eq!(timeline.dialogue_count(), 2);
    assert_eq!(timeline.entries[0].text, "Good morning!");
    assert_eq!(timeline.entries[0].style, "Default");
    assert_eq!(timeline.entries[0].speaker, "Akari");
    assert_eq!(timeline.entries[1].text, "Wait for me. I'm coming too.");

    // Both style labels were still recorded
    assert!(timeline.styles_found.contains("Default"));
    assert!(timeline.styles_found.contains("Signs"));
    Ok(())
}

/// Test that style exclusion matching is case-insensitive
#[test]
fn test_parse_ass_withUppercaseSignStyle_shouldStillExclude() -> Result<()> {
    let content = "[Events]\n\
Format: Layer, Start, End, Style, Name, Text\n\
Dialogue: 0,0:00:01.00,0:00:03.00,SIGNS,,Background sign\n\
Dialogue: 0,0:00:04.00,0:00:06.00,Default,,Spoken line\n";
    let timeline = parse_str(content, SubtitleFormat::Ass, &ParseOptions::default())?;

    assert_eq!(timeline.dialogue_count(), 1);
    assert_eq!(timeline.entries[0].text, "Spoken line");
    Ok(())
}

/// Test custom exclusion sets override the defaults
#[test]
fn test_parse_ass_withCustomExclusions_shouldUseProvidedSet() -> Result<()> {
    let mut exclude = HashSet::new();
    exclude.insert("Default".to_string());
    let options = ParseOptions {
        exclude_styles: Some(exclude),
        ..ParseOptions::default()
    };
    let timeline = parse_str(common::SAMPLE_ASS, SubtitleFormat::Ass, &options)?;

    // Default excluded, Signs kept under the custom set
    assert_eq!(timeline.dialogue_count(), 1);
    assert_eq!(timeline.entries[0].style, "Signs");
    Ok(())
}

/// Test ASS timestamp parsing for centisecond and millisecond precision
#[test]
fn test_ass_time_to_ms_withBothPrecisions_shouldScaleCorrectly() {
    // Two fractional digits are centiseconds
    assert_eq!(ass_time_to_ms("0:00:05.00"), Some(5000));
    assert_eq!(ass_time_to_ms("0:01:02.50"), Some(62500));
    assert_eq!(ass_time_to_ms("1:00:00.01"), Some(3_600_010));

    // Three fractional digits are already milliseconds
    assert_eq!(ass_time_to_ms("0:00:05.123"), Some(5123));

    assert_eq!(ass_time_to_ms("garbage"), None);
}

/// Test override tag and line-break cleaning of ASS text
#[test]
fn test_clean_ass_text_withOverridesAndBreaks_shouldNormalize() {
    assert_eq!(
        clean_ass_text("{\\pos(640,30)}Sign text"),
        "Sign text"
    );
    assert_eq!(clean_ass_text("One\\NTwo"), "One Two");
    assert_eq!(clean_ass_text("Soft\\nbreak"), "Soft break");
    assert_eq!(clean_ass_text("Hard\\hspace"), "Hard space");
}

/// Test that cleaning is idempotent
#[test]
fn test_clean_ass_text_appliedTwice_shouldBeIdempotent() {
    let raw = "{\\i1}Emphasis{\\i0}\\NSecond   line";
    let once = clean_ass_text(raw);
    let twice = clean_ass_text(&once);
    assert_eq!(once, twice);
}

/// Test the documented deduplication scenario: repeated sign text collapses
#[test]
fn test_parse_withRepeatedIdenticalText_shouldDeduplicate() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:01,500\nSign text\n\n\
2\n00:00:01,500 --> 00:00:02,000\nSign text\n\n\
3\n00:00:02,000 --> 00:00:02,500\nSign text\n\n\
4\n00:00:05,000 --> 00:00:08,000\nActual dialogue\n";
    let timeline = parse_str(content, SubtitleFormat::Srt, &ParseOptions::default())?;

    assert_eq!(timeline.dialogue_count(), 2);

    // The run is merged into one entry spanning the whole window
    assert_eq!(timeline.entries[0].text, "Sign text");
    assert_eq!(timeline.entries[0].start_ms, 1000);
    assert_eq!(timeline.entries[0].end_ms, 2500);
    assert_eq!(timeline.entries[0].sequence_index, 0);

    assert_eq!(timeline.entries[1].text, "Actual dialogue");
    assert_eq!(timeline.entries[1].sequence_index, 1);
    Ok(())
}

/// Test that a sub-minimum flicker inside an identical-text run does not
/// break the merge: the duration filter runs first, so the survivors still
/// sit within the gap and collapse into one entry
#[test]
fn test_parse_withFlickerInsideRepeatedRun_shouldMergeAcrossIt() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:02,000\nSign text\n\n\
2\n00:00:02,020 --> 00:00:02,060\nSign text\n\n\
3\n00:00:02,100 --> 00:00:03,000\nSign text\n";
    let timeline = parse_str(content, SubtitleFormat::Srt, &ParseOptions::default())?;

    assert_eq!(timeline.dialogue_count(), 1);
    assert_eq!(timeline.entries[0].text, "Sign text");
    assert_eq!(timeline.entries[0].start_ms, 1000);
    assert_eq!(timeline.entries[0].end_ms, 3000);
    Ok(())
}

/// Test that identical text past the merge gap stays separate
#[test]
fn test_parse_withIdenticalTextFarApart_shouldNotMerge() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n\
2\n00:00:10,000 --> 00:00:11,000\nHello\n";
    let timeline = parse_str(content, SubtitleFormat::Srt, &ParseOptions::default())?;

    assert_eq!(timeline.dialogue_count(), 2);
    Ok(())
}

/// Test that a block with only an index line still shows up in the counters
#[test]
fn test_parse_srt_withLoneIndexBlock_shouldCountItAsFiltered() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n\
2\n\n\
3\n00:00:03,000 --> 00:00:04,000\nWorld\n";
    let timeline = parse_str(content, SubtitleFormat::Srt, &ParseOptions::default())?;

    assert_eq!(timeline.dialogue_count(), 2);
    assert_eq!(timeline.total_raw_entries, 3);
    assert_eq!(timeline.filtered_entries, 1);
    Ok(())
}

/// Test minimum duration filtering and zero-duration rejection
#[test]
fn test_parse_withShortEntries_shouldFilterByDuration() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:01,050\nFlicker\n\n\
2\n00:00:02,000 --> 00:00:02,000\nZero width\n\n\
3\n00:00:03,000 --> 00:00:06,000\nKept line\n";
    let timeline = parse_str(content, SubtitleFormat::Srt, &ParseOptions::default())?;

    assert_eq!(timeline.dialogue_count(), 1);
    assert_eq!(timeline.entries[0].text, "Kept line");
    assert_eq!(timeline.entries[0].sequence_index, 0);
    Ok(())
}

/// Test that a zero minimum duration keeps short entries but still rejects
/// zero-width ones
#[test]
fn test_parse_withZeroMinDuration_shouldKeepShortEntries() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:01,050\nFlicker\n\n\
2\n00:00:02,000 --> 00:00:02,000\nZero width\n\n\
3\n00:00:03,000 --> 00:00:06,000\nNormal line\n";
    let options = ParseOptions {
        min_duration_ms: 0,
        ..ParseOptions::default()
    };
    let timeline = parse_str(content, SubtitleFormat::Srt, &options)?;

    assert_eq!(timeline.dialogue_count(), 2);
    assert_eq!(timeline.entries[0].text, "Flicker");
    Ok(())
}

/// Test format sniffing from content alone
#[test]
fn test_sniff_format_withKnownContent_shouldIdentifyDialect() {
    assert_eq!(sniff_format(common::SAMPLE_SRT), Some(SubtitleFormat::Srt));
    assert_eq!(sniff_format(common::SAMPLE_ASS), Some(SubtitleFormat::Ass));
    assert_eq!(sniff_format("not a subtitle document"), None);
}

/// Test file parsing resolves the dialect from the extension
#[test]
fn test_parse_file_withSrtExtension_shouldParse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_srt(temp_dir.path(), "episode.srt")?;

    let timeline = parse_file(&path, None, &ParseOptions::default())?;
    assert_eq!(timeline.format, SubtitleFormat::Srt);
    assert_eq!(timeline.dialogue_count(), 3);
    assert_eq!(timeline.source_path.as_deref(), Some(path.as_path()));
    Ok(())
}

/// Test that a UTF-8 BOM does not break the first entry
#[test]
fn test_parse_file_withBom_shouldStripAndParse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let content = format!("\u{feff}{}", common::SAMPLE_SRT);
    let path = common::create_test_file(temp_dir.path(), "bom.srt", &content)?;

    let timeline = parse_file(&path, None, &ParseOptions::default())?;
    assert_eq!(timeline.dialogue_count(), 3);
    assert_eq!(timeline.entries[0].start_ms, 1000);
    Ok(())
}

/// Test missing file error
#[test]
fn test_parse_file_withMissingFile_shouldReturnFileNotFound() {
    let result = parse_file("/nonexistent/episode.srt", None, &ParseOptions::default());
    assert!(matches!(result, Err(SubtitleError::FileNotFound(_))));
}

/// Test ASS dialogue without any Format directive is a structural failure
#[test]
fn test_parse_ass_withoutFormatLine_shouldFail() {
    let content = "[Events]\n\
Dialogue: 0,0:00:01.00,0:00:03.00,Default,,Orphan line\n";
    let result = parse_str(content, SubtitleFormat::Ass, &ParseOptions::default());
    assert!(matches!(result, Err(SubtitleError::MissingFormatLine)));
}

/// Test the default exclusion list covers the common sign and song styles
#[test]
fn test_default_excluded_styles_shouldContainSignAndKaraoke() {
    let styles = subtitle_parser::default_excluded_styles();
    assert!(styles.contains("signs"));
    assert!(styles.contains("karaoke"));
    assert!(styles.contains("op"));
    assert!(!styles.contains("default"));
}
