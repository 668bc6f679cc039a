//! Resolvable scalars used as modifier arguments and condition operands.

use crate::ids::{AttributeKey, LinkPath, LinkName};

/// Reference to an attribute reached through an optional link path.
///
/// The path is always followed from the processor that owns the registration
/// using the reference (the "context"), not from the attribute being modified.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeRef {
    pub key: AttributeKey,
    #[cfg_attr(feature = "serde", serde(default))]
    pub path: LinkPath,
}

impl AttributeRef {
    /// Reference to an attribute on the context processor itself.
    pub fn local(key: impl Into<AttributeKey>) -> Self {
        Self {
            key: key.into(),
            path: LinkPath::new(),
        }
    }

    /// Reference to an attribute on a processor reached through `path`.
    pub fn remote<I, S>(key: impl Into<AttributeKey>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<LinkName>,
    {
        Self {
            key: key.into(),
            path: crate::ids::path(path),
        }
    }

    pub fn is_local(&self) -> bool {
        self.path.is_empty()
    }
}

impl From<&str> for AttributeRef {
    fn from(key: &str) -> Self {
        Self::local(key)
    }
}

impl From<AttributeKey> for AttributeRef {
    fn from(key: AttributeKey) -> Self {
        Self::local(key)
    }
}

/// A literal constant or a (possibly remote) attribute reference.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ValueSource {
    Constant(f64),
    Reference(AttributeRef),
}

impl ValueSource {
    pub fn constant(value: f64) -> Self {
        Self::Constant(value)
    }

    pub fn local(key: impl Into<AttributeKey>) -> Self {
        Self::Reference(AttributeRef::local(key))
    }

    pub fn remote<I, S>(key: impl Into<AttributeKey>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<LinkName>,
    {
        Self::Reference(AttributeRef::remote(key, path))
    }

    /// Returns the referenced attribute, if this is not a constant.
    pub fn reference(&self) -> Option<&AttributeRef> {
        match self {
            Self::Constant(_) => None,
            Self::Reference(reference) => Some(reference),
        }
    }
}

impl From<f64> for ValueSource {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl From<AttributeRef> for ValueSource {
    fn from(reference: AttributeRef) -> Self {
        Self::Reference(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_reference_keeps_path_order() {
        let source = ValueSource::remote("Strength", ["Owner", "Mount"]);
        let reference = source.reference().expect("reference");
        assert_eq!(reference.key.as_str(), "Strength");
        assert_eq!(reference.path[0].as_str(), "Owner");
        assert_eq!(reference.path[1].as_str(), "Mount");
        assert!(!reference.is_local());
    }

    #[test]
    fn constants_have_no_reference() {
        assert!(ValueSource::constant(3.0).reference().is_none());
        assert!(AttributeRef::from("Damage").is_local());
    }
}
