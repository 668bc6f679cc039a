//! Modifier contract - the pluggable unit of computation.
//!
//! A modifier resolves its [`ValueSource`] arguments, hands the resulting
//! numbers to its [`ModifierLogic`], and folds the returned magnitude into an
//! attribute according to its [`CombinationKind`]:
//!
//! ```text
//! result = base
//! for modifier in attached (priority ascending):
//!     Additive        result += magnitude
//!     Multiplicative  result *= magnitude
//!     Override        result  = magnitude
//! ```
//!
//! Concrete math (linear, clamp, ...) lives behind the [`ModifierLogic`] trait
//! and is looked up by name through a [`ModifierRegistry`].

pub mod logic;
pub mod pipeline;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use crate::value::ValueSource;

pub use registry::{ArgumentDefinition, ModifierDefinition, ModifierRegistry};

/// How a modifier's magnitude combines with the running value.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CombinationKind {
    /// `result += magnitude`
    #[default]
    Additive,
    /// `result *= magnitude`
    Multiplicative,
    /// `result = magnitude`
    Override,
}

impl CombinationKind {
    /// Folds `magnitude` into `value`.
    #[inline]
    pub fn apply(self, value: f64, magnitude: f64) -> f64 {
        match self {
            Self::Additive => value + magnitude,
            Self::Multiplicative => value * magnitude,
            Self::Override => magnitude,
        }
    }
}

/// Pure function from resolved arguments to a magnitude.
///
/// # Implementation Rules
/// 1. `compute` MUST be pure: same arguments, same magnitude
/// 2. `parameters` names the arguments in the order `compute` expects them;
///    definitions with named arguments are reordered to match
/// 3. Missing trailing arguments should be treated as `0.0`
pub trait ModifierLogic: Send + Sync {
    /// Logic type name used for registry lookup (e.g. `"linear"`).
    fn name(&self) -> &str;

    /// Declared argument names, in positional order.
    fn parameters(&self) -> &[&'static str] {
        &[]
    }

    fn compute(&self, args: &[f64]) -> f64;
}

/// Adapts a closure into a [`ModifierLogic`].
pub struct FnLogic<F> {
    name: &'static str,
    compute: F,
}

impl<F> FnLogic<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    pub fn new(name: &'static str, compute: F) -> Self {
        Self { name, compute }
    }
}

impl<F> ModifierLogic for FnLogic<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    fn compute(&self, args: &[f64]) -> f64 {
        (self.compute)(args)
    }
}

/// A modifier ready to be attached to an attribute.
///
/// Cloning is cheap: the logic is shared behind an `Arc`.
#[derive(Clone)]
pub struct ModifierInstance {
    pub priority: i32,
    pub kind: CombinationKind,
    pub arguments: Vec<ValueSource>,
    logic: Arc<dyn ModifierLogic>,
}

impl ModifierInstance {
    pub fn new(kind: CombinationKind, logic: Arc<dyn ModifierLogic>) -> Self {
        Self {
            priority: 0,
            kind,
            arguments: Vec::new(),
            logic,
        }
    }

    /// Modifier contributing a fixed magnitude.
    ///
    /// ```
    /// # use stats_core::modifier::{CombinationKind, ModifierInstance};
    /// let bonus = ModifierInstance::constant(CombinationKind::Additive, 5.0);
    /// assert_eq!(bonus.compute(&[5.0]), 5.0);
    /// ```
    pub fn constant(kind: CombinationKind, magnitude: f64) -> Self {
        Self::new(kind, Arc::new(logic::Flat)).with_arguments([ValueSource::Constant(magnitude)])
    }

    /// Modifier contributing `source × factor`.
    pub fn scaled(kind: CombinationKind, source: impl Into<ValueSource>, factor: f64) -> Self {
        Self::new(kind, Arc::new(logic::Scaled))
            .with_arguments([source.into(), ValueSource::Constant(factor)])
    }

    /// Modifier computed by an arbitrary closure over its arguments.
    pub fn from_fn<F>(kind: CombinationKind, name: &'static str, compute: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::new(kind, Arc::new(FnLogic::new(name, compute)))
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_arguments(mut self, arguments: impl IntoIterator<Item = ValueSource>) -> Self {
        self.arguments = arguments.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_argument(mut self, argument: impl Into<ValueSource>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn logic(&self) -> &dyn ModifierLogic {
        self.logic.as_ref()
    }

    pub fn logic_name(&self) -> &str {
        self.logic.name()
    }

    /// Runs the logic over already-resolved argument values.
    pub fn compute(&self, args: &[f64]) -> f64 {
        self.logic.compute(args)
    }
}

impl fmt::Debug for ModifierInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierInstance")
            .field("logic", &self.logic.name())
            .field("priority", &self.priority)
            .field("kind", &self.kind)
            .field("arguments", &self.arguments)
            .finish()
    }
}
