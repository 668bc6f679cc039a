//! Stock modifier logic types registered by [`super::ModifierRegistry::with_defaults`].

use super::ModifierLogic;

#[inline]
fn arg(args: &[f64], index: usize) -> f64 {
    args.get(index).copied().unwrap_or(0.0)
}

/// `value`
#[derive(Clone, Copy, Debug, Default)]
pub struct Flat;

impl ModifierLogic for Flat {
    fn name(&self) -> &str {
        "flat"
    }

    fn parameters(&self) -> &[&'static str] {
        &["value"]
    }

    fn compute(&self, args: &[f64]) -> f64 {
        arg(args, 0)
    }
}

/// `value × factor`
#[derive(Clone, Copy, Debug, Default)]
pub struct Scaled;

impl ModifierLogic for Scaled {
    fn name(&self) -> &str {
        "scaled"
    }

    fn parameters(&self) -> &[&'static str] {
        &["value", "factor"]
    }

    fn compute(&self, args: &[f64]) -> f64 {
        arg(args, 0) * arg(args, 1)
    }
}

/// `input × slope + intercept`
#[derive(Clone, Copy, Debug, Default)]
pub struct Linear;

impl ModifierLogic for Linear {
    fn name(&self) -> &str {
        "linear"
    }

    fn parameters(&self) -> &[&'static str] {
        &["input", "slope", "intercept"]
    }

    fn compute(&self, args: &[f64]) -> f64 {
        arg(args, 0) * arg(args, 1) + arg(args, 2)
    }
}

/// `clamp(input, min, max)`; an inverted range collapses to `min`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Clamp;

impl ModifierLogic for Clamp {
    fn name(&self) -> &str {
        "clamp"
    }

    fn parameters(&self) -> &[&'static str] {
        &["input", "min", "max"]
    }

    fn compute(&self, args: &[f64]) -> f64 {
        let (input, min, max) = (arg(args, 0), arg(args, 1), arg(args, 2));
        if max < min {
            return min;
        }
        input.clamp(min, max)
    }
}

/// Always `0.0`. Paired with [`super::CombinationKind::Additive`] it leaves the
/// attribute untouched; used as the fallback for unknown logic types.
#[derive(Clone, Copy, Debug, Default)]
pub struct Neutral;

impl ModifierLogic for Neutral {
    fn name(&self) -> &str {
        "neutral"
    }

    fn compute(&self, _args: &[f64]) -> f64 {
        0.0
    }
}
