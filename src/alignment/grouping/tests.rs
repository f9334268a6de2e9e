use super::{
    build_word_timings, distribute_to_display, group_phonemes, phoneme_durations_usable,
    uniform_durations, PhonemeGroup,
};
use crate::alignment::mapping::TextNormalizationMapper;
use crate::alignment::tokenization::{tokenize_display, tokenize_normalized};
use crate::config::MappingConfig;
use crate::types::{Breakpoint, RawPhoneme};

fn phoneme(symbol: &str, duration_secs: f64, range: std::ops::Range<usize>) -> RawPhoneme {
    RawPhoneme {
        symbol: symbol.to_string(),
        duration_secs,
        normalized_range: range,
    }
}

fn group(range: std::ops::Range<usize>, duration_secs: f64) -> PhonemeGroup {
    PhonemeGroup {
        normalized_range: range,
        duration_secs,
        phoneme_count: 1,
    }
}

fn identity_mapper(text: &str) -> TextNormalizationMapper {
    TextNormalizationMapper::new(text, text, &[], &MappingConfig::default())
}

#[test]
fn groups_split_where_range_changes() {
    let words = tokenize_normalized("hello world");
    let mut phonemes = Vec::new();
    for _ in 0..7 {
        phonemes.push(phoneme("h", 0.075, 0..5));
    }
    for _ in 0..5 {
        phonemes.push(phoneme("w", 0.075, 6..11));
    }
    let groups = group_phonemes(&phonemes, &words);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].phoneme_count, 7);
    assert_eq!(groups[1].phoneme_count, 5);
    assert!((groups[0].duration_secs - 0.525).abs() < 1e-9);
}

#[test]
fn per_character_ranges_coalesce_into_words() {
    let words = tokenize_normalized("hi yo");
    let phonemes = vec![
        phoneme("h", 0.1, 0..1),
        phoneme("aɪ", 0.1, 1..2),
        phoneme("j", 0.1, 3..4),
        phoneme("oʊ", 0.1, 4..5),
    ];
    let groups = group_phonemes(&phonemes, &words);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].normalized_range, 0..2);
    assert_eq!(groups[1].phoneme_count, 2);
}

#[test]
fn pause_between_words_joins_previous_group() {
    let words = tokenize_normalized("hi, yo");
    let phonemes = vec![
        phoneme("h", 0.1, 0..2),
        phoneme("_", 0.2, 2..3),
        phoneme("j", 0.1, 4..6),
    ];
    let groups = group_phonemes(&phonemes, &words);
    assert_eq!(groups.len(), 2);
    assert!((groups[0].duration_secs - 0.3).abs() < 1e-9);
}

#[test]
fn leading_pause_joins_first_word_group() {
    let words = tokenize_normalized(" hi");
    let phonemes = vec![phoneme("_", 0.2, 0..1), phoneme("h", 0.1, 1..3)];
    let groups = group_phonemes(&phonemes, &words);
    assert_eq!(groups.len(), 1);
    assert!((groups[0].duration_secs - 0.3).abs() < 1e-9);
    assert_eq!(groups[0].phoneme_count, 2);
}

#[test]
fn excess_groups_absorbed_by_last_matched_word() {
    // Positional fallback: ranges that do not point into words all coalesce, so
    // feed groups directly.
    let text = "one two";
    let normalized = tokenize_normalized(text);
    let display = tokenize_display(text);
    let groups = vec![group(0..3, 0.2), group(4..7, 0.3), group(9..9, 0.4)];
    let durations =
        distribute_to_display(&groups, &normalized, &display, &identity_mapper(text)).unwrap();
    assert!((durations[0] - 0.2).abs() < 1e-9);
    assert!((durations[1] - 0.7).abs() < 1e-9);
}

#[test]
fn uncovered_words_share_nearest_covered_span_by_chars() {
    let text = "aa bbbb";
    let normalized = tokenize_normalized(text);
    let display = tokenize_display(text);
    let groups = vec![group(0..2, 0.6)];
    let durations =
        distribute_to_display(&groups, &normalized, &display, &identity_mapper(text)).unwrap();
    // 2 chars vs 4 chars of a 0.6 s span.
    assert!((durations[0] - 0.2).abs() < 1e-9);
    assert!((durations[1] - 0.4).abs() < 1e-9);
}

#[test]
fn number_expansion_merges_onto_one_display_word() {
    let original = "In 1990 we";
    let normalized_text = "In nineteen ninety we";
    let breakpoints = [
        Breakpoint::new(0, 0),
        Breakpoint::new(3, 3),
        Breakpoint::new(8, 19),
    ];
    let mapper = TextNormalizationMapper::new(
        original,
        normalized_text,
        &breakpoints,
        &MappingConfig::default(),
    );
    let normalized = tokenize_normalized(normalized_text);
    let display = tokenize_display(original);
    let groups = vec![
        group(0..2, 0.1),
        group(3..11, 0.4),
        group(12..18, 0.3),
        group(19..21, 0.2),
    ];
    let durations = distribute_to_display(&groups, &normalized, &display, &mapper).unwrap();
    assert_eq!(durations.len(), 3);
    assert!((durations[0] - 0.1).abs() < 1e-9);
    assert!((durations[1] - 0.7).abs() < 1e-9);
    assert!((durations[2] - 0.2).abs() < 1e-9);
}

#[test]
fn nothing_covered_yields_none() {
    let text = "a b";
    let normalized = tokenize_normalized(text);
    let display = tokenize_display(text);
    assert!(distribute_to_display(&[], &normalized, &display, &identity_mapper(text)).is_none());
}

#[test]
fn usable_rejects_bad_durations() {
    assert!(!phoneme_durations_usable(&[]));
    assert!(!phoneme_durations_usable(&[phoneme("a", f64::NAN, 0..1)]));
    assert!(!phoneme_durations_usable(&[phoneme("a", -0.1, 0..1)]));
    assert!(!phoneme_durations_usable(&[phoneme("a", 0.0, 0..1)]));
    assert!(phoneme_durations_usable(&[phoneme("a", 0.1, 0..1)]));
}

#[test]
fn uniform_durations_split_total() {
    assert!(uniform_durations(0, 1.0).is_empty());
    let d = uniform_durations(4, 1.0);
    assert_eq!(d, vec![0.25; 4]);
}

#[test]
fn word_timings_extend_last_word_to_total() {
    let display = tokenize_display("a b");
    let words = build_word_timings(&display, vec![0.2, 0.3], 1.0, 1e-3);
    assert!((words[1].start_secs - 0.2).abs() < 1e-9);
    assert!((words[1].end_secs() - 1.0).abs() < 1e-9);
}

#[test]
fn word_timings_scale_when_phonemes_overshoot_audio() {
    let display = tokenize_display("a b");
    let words = build_word_timings(&display, vec![1.0, 1.0], 1.0, 1e-3);
    assert!((words[0].duration_secs - 0.5).abs() < 1e-9);
    assert!((words[1].start_secs - 0.5).abs() < 1e-9);
    let sum: f64 = words.iter().map(|w| w.duration_secs).sum();
    assert!((sum - 1.0).abs() < 1e-9);
}
