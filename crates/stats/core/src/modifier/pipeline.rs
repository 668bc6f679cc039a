//! Attribute value pipeline.
//!
//! Folds the magnitudes of attached modifiers into a base value in ascending
//! priority order. Callers pass modifiers already ordered by
//! `(priority, ModifierId)`; the attached list on an attribute is kept in that
//! order so ties resolve the same way on every recomputation.

use super::CombinationKind;

/// One entry of the fold: how to combine, and by how much.
///
/// `magnitude == None` marks an inactive modifier (one of its reference
/// arguments is unresolved); it is skipped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Step {
    pub priority: i32,
    pub kind: CombinationKind,
    pub magnitude: Option<f64>,
}

/// Folds `steps` into `base`.
///
/// # Example
/// ```
/// # use stats_core::modifier::CombinationKind;
/// # use stats_core::modifier::pipeline::{fold, Step};
/// let steps = [
///     Step { priority: 0, kind: CombinationKind::Additive, magnitude: Some(5.0) },
///     Step { priority: 1, kind: CombinationKind::Multiplicative, magnitude: Some(2.0) },
///     Step { priority: 2, kind: CombinationKind::Additive, magnitude: None },
/// ];
/// // (10 + 5) × 2, the inactive step is skipped
/// assert_eq!(fold(10.0, &steps), 30.0);
/// ```
pub fn fold(base: f64, steps: &[Step]) -> f64 {
    debug_assert!(
        steps.windows(2).all(|pair| pair[0].priority <= pair[1].priority),
        "pipeline steps must be ordered by priority"
    );

    steps
        .iter()
        .filter_map(|step| step.magnitude.map(|magnitude| (step.kind, magnitude)))
        .fold(base, |acc, (kind, magnitude)| kind.apply(acc, magnitude))
}

/// Returns true if two computed values differ for notification purposes.
///
/// NaN compares equal to NaN so a stuck NaN does not re-notify forever.
#[inline]
pub(crate) fn value_changed(old: f64, new: f64) -> bool {
    if old.is_nan() && new.is_nan() {
        return false;
    }
    old != new
}
