//! Boolean conditions observed as live signals.
//!
//! A [`Condition`] is pure data; [`crate::AttributeGraph::observe_condition`]
//! compiles it against a context processor into a signal that re-evaluates
//! whenever a tag, attribute value, or link it depends on changes.
//!
//! # Evaluation rules
//!
//! - `Always` is constant true
//! - `Tag` is false when its path does not resolve, regardless of `invert`
//! - `Comparison` is false while either referenced attribute is unresolved;
//!   `Equal`/`NotEqual` honor `tolerance`, ordering operators compare raw
//! - `Composite` with no children is vacuously true for both `And` and `Or`

use crate::ids::{LinkName, LinkPath, Tag};
use crate::value::ValueSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
}

impl ComparisonOp {
    pub fn compare(self, a: f64, b: f64, tolerance: f64) -> bool {
        match self {
            Self::Equal => (a - b).abs() <= tolerance,
            Self::NotEqual => (a - b).abs() > tolerance,
            Self::Greater => a > b,
            Self::Less => a < b,
            Self::GreaterOrEqual => a >= b,
            Self::LessOrEqual => a <= b,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CompositeOp {
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Condition {
    Always,
    Tag {
        tag: Tag,
        #[cfg_attr(feature = "serde", serde(default))]
        path: LinkPath,
        #[cfg_attr(feature = "serde", serde(default))]
        invert: bool,
    },
    Comparison {
        a: ValueSource,
        op: ComparisonOp,
        b: ValueSource,
        #[cfg_attr(feature = "serde", serde(default))]
        tolerance: f64,
    },
    Composite {
        op: CompositeOp,
        conditions: Vec<Condition>,
    },
}

impl Condition {
    /// Context processor has `tag`.
    pub fn has_tag(tag: impl Into<Tag>) -> Self {
        Self::Tag {
            tag: tag.into(),
            path: LinkPath::new(),
            invert: false,
        }
    }

    /// Context processor lacks `tag`.
    pub fn lacks_tag(tag: impl Into<Tag>) -> Self {
        Self::Tag {
            tag: tag.into(),
            path: LinkPath::new(),
            invert: true,
        }
    }

    /// Processor reached through `path` has `tag`.
    pub fn remote_tag<I, S>(tag: impl Into<Tag>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<LinkName>,
    {
        Self::Tag {
            tag: tag.into(),
            path: crate::ids::path(path),
            invert: false,
        }
    }

    pub fn compare(a: impl Into<ValueSource>, op: ComparisonOp, b: impl Into<ValueSource>) -> Self {
        Self::Comparison {
            a: a.into(),
            op,
            b: b.into(),
            tolerance: 0.0,
        }
    }

    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::Composite {
            op: CompositeOp::And,
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::Composite {
            op: CompositeOp::Or,
            conditions: conditions.into_iter().collect(),
        }
    }

    /// Sets the equality tolerance of a comparison; other variants are
    /// returned unchanged.
    #[must_use]
    pub fn with_tolerance(self, tolerance: f64) -> Self {
        match self {
            Self::Comparison { a, op, b, .. } => Self::Comparison {
                a,
                op,
                b,
                tolerance,
            },
            other => other,
        }
    }
}
