use std::cmp::Ordering;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::types::{
    AlignmentInput, AlignmentPrecision, AlignmentResult, Breakpoint, RawPhoneme, WordTiming,
};

pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub schema_version: u32,
    pub meta: Meta,
    pub units: Vec<UnitReport>,
    pub aggregates: AggregateReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub generated_at: String,
    pub offset_correction: String,
    pub case_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub id: String,
    pub unit_index: usize,
    pub precision: AlignmentPrecision,
    pub total_duration_secs: f64,
    pub word_count: u32,
    pub structural: StructuralMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_check: Option<CrossCheckReport>,
    pub notes: Vec<String>,
}

/// Invariant checks for one alignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralMetrics {
    /// |Σ word durations − total duration|.
    pub duration_gap_secs: f64,
    pub empty_range_word_count: u32,
    pub overlapping_range_word_count: u32,
    pub non_monotonic_word_count: u32,
    pub negative_duration_word_count: u32,
    /// Word starts that do not follow the previous word's end.
    pub discontinuous_word_count: u32,
}

impl StructuralMetrics {
    pub fn is_valid(&self, epsilon_secs: f64) -> bool {
        self.duration_gap_secs <= epsilon_secs
            && self.empty_range_word_count == 0
            && self.overlapping_range_word_count == 0
            && self.non_monotonic_word_count == 0
            && self.negative_duration_word_count == 0
            && self.discontinuous_word_count == 0
    }
}

/// Expected word timing, e.g. from a hand-checked fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceWord {
    pub word: String,
    pub start_secs: f64,
    pub end_secs: f64,
}

/// One recorded engine output plus what the aligner is expected to make of it.
#[derive(Debug, Clone, Deserialize)]
pub struct AlignmentCase {
    pub id: String,
    #[serde(default)]
    pub unit_index: usize,
    pub original_text: String,
    pub normalized_text: String,
    #[serde(default)]
    pub phonemes: Vec<RawPhoneme>,
    #[serde(default)]
    pub breakpoints: Vec<Breakpoint>,
    #[serde(default)]
    pub audio_duration_secs: f64,
    #[serde(default)]
    pub expected_words: Option<Vec<ReferenceWord>>,
    #[serde(default)]
    pub expected_precision: Option<AlignmentPrecision>,
    #[serde(default)]
    pub word_positions: Option<Vec<Range<usize>>>,
}

impl AlignmentCase {
    pub fn to_input(&self) -> AlignmentInput {
        AlignmentInput {
            unit_index: self.unit_index,
            original_text: self.original_text.clone(),
            normalized_text: self.normalized_text.clone(),
            phonemes: self.phonemes.clone(),
            breakpoints: self.breakpoints.clone(),
            audio_duration_secs: self.audio_duration_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimingMetrics {
    pub abs_err_ms_median: f32,
    pub abs_err_ms_p90: f32,
    pub abs_err_ms_max: f32,
}

/// Agreement between an alignment and the document's own word positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrossCheckReport {
    pub matched: u32,
    /// Document word overlaps aligned words but no aligned range equals it.
    pub mismatched: u32,
    /// Document word not covered by any aligned word.
    pub missing_in_alignment: u32,
    /// Aligned word overlapping no document word.
    pub extra_in_alignment: u32,
}

impl CrossCheckReport {
    pub fn agrees(&self) -> bool {
        self.mismatched == 0 && self.missing_in_alignment == 0 && self.extra_in_alignment == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub counts: AggregateCounts,
    pub duration_gap_secs: Option<MetricDistribution>,
    pub abs_err_ms_p90: Option<MetricDistribution>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateCounts {
    pub total: u32,
    pub estimated: u32,
    pub structurally_invalid: u32,
    pub cross_check_disagreements: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricDistribution {
    pub mean: f32,
    pub p50: f32,
    pub p90: f32,
    pub p99: f32,
}

pub fn compute_structural_metrics(alignment: &AlignmentResult) -> StructuralMetrics {
    let words = &alignment.words;
    let empty_range_word_count = words.iter().filter(|w| w.range.is_empty()).count();
    let negative_duration_word_count = words
        .iter()
        .filter(|w| !w.duration_secs.is_finite() || w.duration_secs < 0.0)
        .count();

    let mut overlapping = 0usize;
    let mut non_monotonic = 0usize;
    let mut discontinuous = 0usize;
    for pair in words.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        if current.range.end > next.range.start {
            overlapping += 1;
        }
        if current.range.start >= next.range.start || current.start_secs > next.start_secs {
            non_monotonic += 1;
        }
        if (current.end_secs() - next.start_secs).abs() > 1e-6 {
            discontinuous += 1;
        }
    }

    StructuralMetrics {
        duration_gap_secs: (alignment.summed_duration_secs() - alignment.total_duration_secs).abs(),
        empty_range_word_count: to_u32(empty_range_word_count),
        overlapping_range_word_count: to_u32(overlapping),
        non_monotonic_word_count: to_u32(non_monotonic),
        negative_duration_word_count: to_u32(negative_duration_word_count),
        discontinuous_word_count: to_u32(discontinuous),
    }
}

/// Compares aligned word ranges with independently extracted word positions.
/// Diagnostic only: the alignment stays authoritative.
pub fn cross_check(words: &[WordTiming], positions: &[Range<usize>]) -> CrossCheckReport {
    let mut report = CrossCheckReport::default();
    let mut touched = vec![false; words.len()];

    for position in positions.iter().filter(|p| !p.is_empty()) {
        let first = words.partition_point(|w| w.range.end <= position.start);
        let overlapping: Vec<usize> = (first..words.len())
            .take_while(|&i| words[i].range.start < position.end)
            .collect();
        if overlapping.is_empty() {
            report.missing_in_alignment += 1;
            continue;
        }
        for &i in &overlapping {
            touched[i] = true;
        }
        if overlapping.len() == 1 && words[overlapping[0]].range == *position {
            report.matched += 1;
        } else {
            report.mismatched += 1;
        }
    }
    report.extra_in_alignment = to_u32(touched.iter().filter(|t| !**t).count());
    report
}

pub fn compute_timing_metrics(
    predicted: &[WordTiming],
    reference: &[ReferenceWord],
) -> Option<TimingMetrics> {
    if predicted.is_empty() || predicted.len() != reference.len() {
        return None;
    }
    let mut abs_err_ms: Vec<f64> = predicted
        .iter()
        .zip(reference.iter())
        .flat_map(|(p, r)| {
            [
                (p.start_secs - r.start_secs).abs() * 1000.0,
                (p.end_secs() - r.end_secs).abs() * 1000.0,
            ]
        })
        .collect();
    abs_err_ms.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    Some(TimingMetrics {
        abs_err_ms_median: percentile_sorted(&abs_err_ms, 0.5) as f32,
        abs_err_ms_p90: percentile_sorted(&abs_err_ms, 0.9) as f32,
        abs_err_ms_max: abs_err_ms.last().copied().unwrap_or(0.0) as f32,
    })
}

pub fn compute_unit_report(
    id: &str,
    alignment: &AlignmentResult,
    reference: Option<&[ReferenceWord]>,
    positions: Option<&[Range<usize>]>,
    epsilon_secs: f64,
) -> UnitReport {
    let mut notes = Vec::new();
    let structural = compute_structural_metrics(alignment);
    if !structural.is_valid(epsilon_secs) {
        notes.push("structural_invariant_violated".to_string());
    }
    if alignment.precision == AlignmentPrecision::Estimated {
        notes.push("estimated_durations".to_string());
    }

    let timing = reference.and_then(|reference| {
        if reference.len() != alignment.words.len() {
            notes.push(format!(
                "word_count_mismatch:pred={} ref={}",
                alignment.words.len(),
                reference.len()
            ));
        }
        let label_mismatches = alignment
            .words
            .iter()
            .zip(reference.iter())
            .filter(|(p, r)| normalize_word_for_comparison(&p.word) != normalize_word_for_comparison(&r.word))
            .count();
        if label_mismatches > 0 {
            notes.push(format!("word_label_mismatches={label_mismatches}"));
        }
        compute_timing_metrics(&alignment.words, reference)
    });

    let cross_check = positions.map(|positions| cross_check(&alignment.words, positions));
    if cross_check.as_ref().is_some_and(|c| !c.agrees()) {
        notes.push("cross_check_disagreement".to_string());
    }

    UnitReport {
        id: id.to_string(),
        unit_index: alignment.unit_index,
        precision: alignment.precision,
        total_duration_secs: alignment.total_duration_secs,
        word_count: to_u32(alignment.words.len()),
        structural,
        timing,
        cross_check,
        notes,
    }
}

pub fn aggregate_reports(units: &[UnitReport], epsilon_secs: f64) -> AggregateReport {
    let gaps: Vec<f64> = units.iter().map(|u| u.structural.duration_gap_secs).collect();
    let p90s: Vec<f64> = units
        .iter()
        .filter_map(|u| u.timing.as_ref().map(|t| t.abs_err_ms_p90 as f64))
        .collect();

    AggregateReport {
        counts: AggregateCounts {
            total: to_u32(units.len()),
            estimated: to_u32(
                units
                    .iter()
                    .filter(|u| u.precision == AlignmentPrecision::Estimated)
                    .count(),
            ),
            structurally_invalid: to_u32(
                units
                    .iter()
                    .filter(|u| !u.structural.is_valid(epsilon_secs))
                    .count(),
            ),
            cross_check_disagreements: to_u32(
                units
                    .iter()
                    .filter(|u| u.cross_check.as_ref().is_some_and(|c| !c.agrees()))
                    .count(),
            ),
        },
        duration_gap_secs: distribution_or_none(&gaps),
        abs_err_ms_p90: distribution_or_none(&p90s),
    }
}

fn distribution_or_none(values: &[f64]) -> Option<MetricDistribution> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
    Some(MetricDistribution {
        mean: mean as f32,
        p50: percentile_sorted(&sorted, 0.5) as f32,
        p90: percentile_sorted(&sorted, 0.9) as f32,
        p99: percentile_sorted(&sorted, 0.99) as f32,
    })
}

fn percentile_sorted(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    if sorted_values.len() == 1 {
        return sorted_values[0];
    }

    let clamped = percentile.clamp(0.0, 1.0);
    let max_index = (sorted_values.len() - 1) as f64;
    let rank = clamped * max_index;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = rank - lower as f64;
        sorted_values[lower] * (1.0 - weight) + sorted_values[upper] * weight
    }
}

fn normalize_word_for_comparison(word: &str) -> String {
    word.trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, duration: f64, range: Range<usize>) -> WordTiming {
        WordTiming {
            word: text.to_string(),
            start_secs: start,
            duration_secs: duration,
            range,
        }
    }

    fn hello_world() -> AlignmentResult {
        AlignmentResult {
            unit_index: 0,
            total_duration_secs: 0.9,
            words: vec![
                word("Hello", 0.0, 0.525, 0..5),
                word("world.", 0.525, 0.375, 6..12),
            ],
            precision: AlignmentPrecision::Phoneme,
        }
    }

    #[test]
    fn valid_alignment_has_clean_structure() {
        let metrics = compute_structural_metrics(&hello_world());
        assert!(metrics.is_valid(1e-3));
        assert!(metrics.duration_gap_secs < 1e-9);
    }

    #[test]
    fn overlap_and_gap_are_flagged() {
        let mut alignment = hello_world();
        alignment.words[1].range = 3..12;
        alignment.words[1].duration_secs = 0.2;
        let metrics = compute_structural_metrics(&alignment);
        assert_eq!(metrics.overlapping_range_word_count, 1);
        assert!(metrics.duration_gap_secs > 0.1);
        assert!(!metrics.is_valid(1e-3));
    }

    #[test]
    fn cross_check_counts_each_outcome() {
        let words = hello_world().words;
        assert!(cross_check(&words, &[0..5, 6..12]).agrees());

        let report = cross_check(&words, &[0..5, 6..11, 20..25]);
        assert_eq!(report.matched, 1);
        assert_eq!(report.mismatched, 1);
        assert_eq!(report.missing_in_alignment, 1);
        assert_eq!(report.extra_in_alignment, 0);

        let report = cross_check(&words, &[0..5]);
        assert_eq!(report.extra_in_alignment, 1);
    }

    #[test]
    fn timing_metrics_need_matching_word_counts() {
        let words = hello_world().words;
        let reference = vec![
            ReferenceWord {
                word: "hello".to_string(),
                start_secs: 0.0,
                end_secs: 0.5,
            },
            ReferenceWord {
                word: "world".to_string(),
                start_secs: 0.5,
                end_secs: 0.9,
            },
        ];
        let metrics = compute_timing_metrics(&words, &reference).expect("metrics");
        assert!((metrics.abs_err_ms_max - 25.0).abs() < 0.01);
        assert!(compute_timing_metrics(&words, &reference[..1]).is_none());
    }

    #[test]
    fn unit_report_notes_and_aggregate_counts() {
        let mut estimated = hello_world();
        estimated.precision = AlignmentPrecision::Estimated;
        let positions = [0..5, 6..11];
        let a = compute_unit_report("a", &hello_world(), None, None, 1e-3);
        let b = compute_unit_report("b", &estimated, None, Some(&positions), 1e-3);
        assert!(a.notes.is_empty());
        assert!(b.notes.contains(&"estimated_durations".to_string()));
        assert!(b.notes.contains(&"cross_check_disagreement".to_string()));

        let aggregate = aggregate_reports(&[a, b], 1e-3);
        assert_eq!(aggregate.counts.total, 2);
        assert_eq!(aggregate.counts.estimated, 1);
        assert_eq!(aggregate.counts.cross_check_disagreements, 1);
        assert!(aggregate.abs_err_ms_p90.is_none());
    }

    #[test]
    fn percentile_interpolates() {
        let sorted = [0.0, 10.0];
        assert!((percentile_sorted(&sorted, 0.5) - 5.0).abs() < 1e-9);
        assert_eq!(percentile_sorted(&[], 0.5), 0.0);
    }
}
