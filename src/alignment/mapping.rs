use std::ops::Range;

use crate::config::{MappingConfig, OffsetCorrection};
use crate::types::Breakpoint;

/// Reconciles original document text with the engine's normalized text.
///
/// Breakpoints are corrected, clamped and made monotonic at construction time,
/// so both mapping directions are total, never decrease and never panic.
#[derive(Debug, Clone)]
pub struct TextNormalizationMapper {
    original_len: usize,
    normalized_len: usize,
    /// Non-decreasing on both axes, starts at (0, 0) and ends at the text lengths.
    points: Vec<Breakpoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rounding {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Original,
    Normalized,
}

impl Axis {
    fn of(self, point: &Breakpoint) -> usize {
        match self {
            Axis::Original => point.original,
            Axis::Normalized => point.normalized,
        }
    }
}

impl TextNormalizationMapper {
    pub fn new(
        original: &str,
        normalized: &str,
        breakpoints: &[Breakpoint],
        config: &MappingConfig,
    ) -> Self {
        Self::from_lengths(
            original.chars().count(),
            normalized.chars().count(),
            breakpoints,
            config,
        )
    }

    pub fn from_lengths(
        original_len: usize,
        normalized_len: usize,
        breakpoints: &[Breakpoint],
        config: &MappingConfig,
    ) -> Self {
        let non_empty = original_len > 0 && normalized_len > 0;
        let corrected = if non_empty {
            correct_offsets(breakpoints, config.offset_correction)
        } else {
            Vec::new()
        };
        let points = make_monotonic(corrected, original_len, normalized_len);
        Self {
            original_len,
            normalized_len,
            points,
        }
    }

    /// Corrected breakpoints, including the implicit start and end anchors.
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.points
    }

    pub fn map_original_to_normalized(&self, range: Range<usize>) -> Range<usize> {
        self.map_range(range, Axis::Original, Axis::Normalized)
    }

    pub fn map_normalized_to_original(&self, range: Range<usize>) -> Range<usize> {
        self.map_range(range, Axis::Normalized, Axis::Original)
    }

    fn axis_len(&self, axis: Axis) -> usize {
        match axis {
            Axis::Original => self.original_len,
            Axis::Normalized => self.normalized_len,
        }
    }

    fn map_range(&self, range: Range<usize>, from: Axis, to: Axis) -> Range<usize> {
        let from_len = self.axis_len(from);
        let to_len = self.axis_len(to);
        if range.start >= from_len {
            // Entirely out of bounds: empty sentinel at the end of the target text.
            return to_len..to_len;
        }
        let start = range.start;
        let end = range.end.clamp(start, from_len);

        let mapped_start = self.interpolate(start, from, to, Rounding::Down).min(to_len);
        let mapped_end = self
            .interpolate(end, from, to, Rounding::Up)
            .clamp(mapped_start, to_len);
        mapped_start..mapped_end
    }

    fn interpolate(&self, x: usize, from: Axis, to: Axis, rounding: Rounding) -> usize {
        let points = &self.points;
        // First point whose `from` coordinate reaches x.
        let first_at_or_after = points.partition_point(|p| from.of(p) < x);
        let Some(next) = points.get(first_at_or_after) else {
            return points.last().map(|p| to.of(p)).unwrap_or(0);
        };

        if from.of(next) == x {
            // Vertical segments: take the lowest target for a start, highest for an end.
            return match rounding {
                Rounding::Down => to.of(next),
                Rounding::Up => {
                    let last_at = points.partition_point(|p| from.of(p) <= x) - 1;
                    to.of(&points[last_at])
                }
            };
        }

        let Some(prev) = first_at_or_after
            .checked_sub(1)
            .and_then(|i| points.get(i))
        else {
            return to.of(next);
        };

        // Integer interpolation so exact positions never pick up float error.
        let span_from = (from.of(next) - from.of(prev)) as u128;
        let span_to = (to.of(next) - to.of(prev)) as u128;
        let numerator = (x - from.of(prev)) as u128 * span_to;
        let offset = match rounding {
            Rounding::Down => numerator / span_from,
            Rounding::Up => numerator.div_ceil(span_from),
        };
        (to.of(prev) + offset as usize).clamp(to.of(prev), to.of(next))
    }
}

fn correct_offsets(breakpoints: &[Breakpoint], correction: OffsetCorrection) -> Vec<Breakpoint> {
    let Some(first) = breakpoints.first().copied() else {
        return Vec::new();
    };
    let (shift_original, shift_normalized) = match correction {
        OffsetCorrection::Detect => (first.original, first.normalized),
        OffsetCorrection::Fixed(constant) => (
            if first.original != 0 { constant } else { 0 },
            if first.normalized != 0 { constant } else { 0 },
        ),
        OffsetCorrection::Disabled => (0, 0),
    };

    if shift_original != 0 || shift_normalized != 0 {
        tracing::debug!(
            first_original = first.original,
            first_normalized = first.normalized,
            shift_original,
            shift_normalized,
            "mapping: correcting systematic breakpoint offset"
        );
    }

    breakpoints
        .iter()
        .map(|bp| Breakpoint {
            original: bp.original.saturating_sub(shift_original),
            normalized: bp.normalized.saturating_sub(shift_normalized),
        })
        .collect()
}

fn make_monotonic(
    mut points: Vec<Breakpoint>,
    original_len: usize,
    normalized_len: usize,
) -> Vec<Breakpoint> {
    for p in &mut points {
        p.original = p.original.min(original_len);
        p.normalized = p.normalized.min(normalized_len);
    }
    points.push(Breakpoint::new(0, 0));
    points.push(Breakpoint::new(original_len, normalized_len));
    points.sort_by_key(|p| p.original);

    let mut repaired = 0usize;
    let mut running_max = 0usize;
    for p in &mut points {
        if p.normalized < running_max {
            p.normalized = running_max;
            repaired += 1;
        }
        running_max = p.normalized;
    }
    if repaired > 0 {
        tracing::debug!(
            repaired,
            "mapping: raised non-monotonic breakpoints to keep the mapping non-decreasing"
        );
    }

    points.dedup();
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(original: &str, normalized: &str, bps: &[(usize, usize)]) -> TextNormalizationMapper {
        let bps: Vec<Breakpoint> = bps.iter().map(|&(o, n)| Breakpoint::new(o, n)).collect();
        TextNormalizationMapper::new(original, normalized, &bps, &MappingConfig::default())
    }

    #[test]
    fn identity_without_breakpoints() {
        let m = mapper("hello world", "hello world", &[]);
        assert_eq!(m.map_normalized_to_original(6..11), 6..11);
        assert_eq!(m.map_original_to_normalized(0..5), 0..5);
    }

    #[test]
    fn proportional_without_breakpoints() {
        let m = mapper("Dr. Smith", "doctor smith", &[]);
        // 9 original chars over 12 normalized chars.
        let mapped = m.map_normalized_to_original(7..12);
        assert_eq!(mapped.end, 9);
        assert!(mapped.start <= 6);
    }

    #[test]
    fn breakpoints_anchor_expansions() {
        let m = mapper("Dr. Smith", "doctor smith", &[(0, 0), (4, 7)]);
        assert_eq!(m.map_normalized_to_original(7..12), 4..9);
        let doctor = m.map_normalized_to_original(0..6);
        assert_eq!(doctor.start, 0);
        assert!(doctor.end <= 4);
        assert_eq!(m.map_original_to_normalized(4..9), 7..12);
    }

    #[test]
    fn detects_constant_offset() {
        // Engine reports positions shifted by one.
        let m = mapper("Dr. Smith", "doctor smith", &[(1, 1), (5, 8)]);
        assert_eq!(m.breakpoints()[0], Breakpoint::new(0, 0));
        assert!(m.breakpoints().contains(&Breakpoint::new(4, 7)));
        assert_eq!(m.map_normalized_to_original(7..12), 4..9);
    }

    #[test]
    fn fixed_offset_clamps_negative_to_zero() {
        let config = MappingConfig {
            offset_correction: OffsetCorrection::Fixed(2),
        };
        let bps = [Breakpoint::new(1, 0), Breakpoint::new(6, 7)];
        let m = TextNormalizationMapper::new("Dr. Smith", "doctor smith", &bps, &config);
        // original axis shifted by 2 (1 -> 0 after clamping), normalized axis untouched.
        assert!(m.breakpoints().contains(&Breakpoint::new(4, 7)));
        assert!(m.breakpoints().iter().all(|p| p.original <= 9));
    }

    #[test]
    fn disabled_correction_keeps_offsets() {
        let config = MappingConfig {
            offset_correction: OffsetCorrection::Disabled,
        };
        let bps = [Breakpoint::new(2, 2)];
        let m = TextNormalizationMapper::new("abcdef", "abcdef", &bps, &config);
        assert!(m.breakpoints().contains(&Breakpoint::new(2, 2)));
    }

    #[test]
    fn non_monotonic_breakpoints_are_repaired() {
        let m = mapper("aaaa bbbb cccc", "aaaa bbbb cccc", &[(0, 0), (5, 9), (10, 4)]);
        let points = m.breakpoints();
        assert!(points
            .windows(2)
            .all(|w| w[0].original <= w[1].original && w[0].normalized <= w[1].normalized));
        let mut last = 0;
        for i in 0..=14 {
            let mapped = m.map_original_to_normalized(i..i);
            assert!(mapped.start >= last, "mapping decreased at {i}");
            last = mapped.start;
        }
    }

    #[test]
    fn out_of_bounds_returns_empty_sentinel() {
        let m = mapper("abc", "abcdef", &[]);
        assert_eq!(m.map_normalized_to_original(10..20), 3..3);
        assert_eq!(m.map_original_to_normalized(3..5), 6..6);
    }

    #[test]
    fn overlong_end_is_clamped() {
        let m = mapper("abc", "abc", &[]);
        assert_eq!(m.map_normalized_to_original(1..99), 1..3);
        assert_eq!(m.map_normalized_to_original(2..1), 2..2);
    }

    #[test]
    fn breakpoints_past_text_end_are_clamped() {
        let m = mapper("abc", "abcd", &[(0, 0), (10, 40)]);
        assert!(m
            .breakpoints()
            .iter()
            .all(|p| p.original <= 3 && p.normalized <= 4));
    }

    #[test]
    fn empty_texts_map_to_empty() {
        let m = mapper("", "", &[(3, 3)]);
        assert_eq!(m.map_normalized_to_original(0..2), 0..0);
    }
}
