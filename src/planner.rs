//! Slide count and per-slide duration from a target duration.
//!
//! Pure arithmetic. Every input is clamped, so there is no error path.

use crate::model::{LessonPackage, SlideTiming};

/// Seconds of narration one slide is expected to carry when sizing an outline.
pub const SECONDS_PER_SLIDE_HINT: u32 = 15;
pub const MIN_SLIDES: usize = 3;
pub const MAX_SLIDES: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlidePlan {
    pub slide_count: usize,
    pub per_slide_duration_seconds: u32,
}

impl SlidePlan {
    /// Sum of all slide durations. Always `>= target` because of ceiling division.
    /// Computed in `u64`: a large target spread over several slides can exceed `u32`.
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.per_slide_duration_seconds).saturating_mul(self.slide_count as u64)
    }

    pub fn timings(&self) -> Vec<SlideTiming> {
        (0..self.slide_count)
            .map(|slide_index| SlideTiming {
                slide_index,
                duration_seconds: self.per_slide_duration_seconds,
            })
            .collect()
    }
}

/// How many slides an outline of `target_duration_seconds` should have, clamped to
/// `[MIN_SLIDES, MAX_SLIDES]`. Used by upstream drafting to size its request.
pub fn slide_count_hint(target_duration_seconds: u32) -> usize {
    let raw = target_duration_seconds
        .max(1)
        .div_ceil(SECONDS_PER_SLIDE_HINT) as usize;
    raw.clamp(MIN_SLIDES, MAX_SLIDES)
}

/// `ceil(target / slide_count)`, never below one second.
pub fn per_slide_duration(target_duration_seconds: u32, slide_count: usize) -> u32 {
    let count = u32::try_from(slide_count.max(1)).unwrap_or(u32::MAX);
    target_duration_seconds.max(1).div_ceil(count).max(1)
}

/// Plan for an outline that has not been drafted yet.
pub fn plan_for_duration(target_duration_seconds: u32) -> SlidePlan {
    let slide_count = slide_count_hint(target_duration_seconds);
    SlidePlan {
        slide_count,
        per_slide_duration_seconds: per_slide_duration(target_duration_seconds, slide_count),
    }
}

/// Plan for a drafted package: the package's own slide count wins over the hint, since those are
/// the frames that will actually be encoded.
pub fn plan_for_package(package: &LessonPackage) -> SlidePlan {
    let slide_count = package.slides.len().max(1);
    SlidePlan {
        slide_count,
        per_slide_duration_seconds: per_slide_duration(
            package.target_duration_seconds,
            slide_count,
        ),
    }
}

#[cfg(test)]
#[path = "../tests/unit/planner.rs"]
mod tests;
