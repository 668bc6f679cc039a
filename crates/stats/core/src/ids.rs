//! Identifiers and names shared across the graph.
//!
//! Names (`AttributeKey`, `LinkName`, `Tag`, `SourceId`) are string newtypes so
//! that an attribute key can never be passed where a link name is expected.
//! Handles (`ProcessorId`, `ModifierId`, ...) are opaque sequential numbers
//! allocated by [`crate::AttributeGraph`] and never reused within one graph.

use core::borrow::Borrow;
use core::fmt;

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&$name> for $name {
            fn from(value: &$name) -> Self {
                value.clone()
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl core::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub(crate) u64);

        impl $name {
            /// Raw numeric value (for logging and debugging).
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

name_type!(
    /// Name of an attribute slot on a processor (e.g. `"Strength"`).
    AttributeKey
);
name_type!(
    /// Name of an outbound link on a processor (e.g. `"Owner"`).
    LinkName
);
name_type!(
    /// Reference-counted marker placed on a processor.
    Tag
);
name_type!(
    /// Groups modifiers added together so they can be removed in bulk.
    SourceId
);

handle_type!(
    /// Handle to a processor owned by an [`crate::AttributeGraph`].
    ProcessorId,
    "processor"
);
handle_type!(
    /// Handle to a modifier registration.
    ModifierId,
    "modifier"
);
handle_type!(
    /// Handle to a value subscription.
    SubscriptionId,
    "subscription"
);
handle_type!(
    /// Handle to an observed condition signal.
    ConditionId,
    "condition"
);
handle_type!(
    /// Handle to a condition-gated stat block.
    StatBlockId,
    "stat_block"
);
handle_type!(
    /// Handle to a dynamic path binding (internal bookkeeping).
    BindingId,
    "binding"
);
handle_type!(
    /// Handle to a tag placed through a path by a bundle.
    PlacementId,
    "placement"
);

/// Ordered list of link names traversed from a root processor.
///
/// An empty path means "the root itself".
pub type LinkPath = Vec<LinkName>;

/// Builds a [`LinkPath`] from string-like segments.
///
/// ```
/// # use stats_core::ids::{path, LinkName};
/// let p = path(["Owner", "Guild"]);
/// assert_eq!(p, vec![LinkName::from("Owner"), LinkName::from("Guild")]);
/// ```
pub fn path<I, S>(segments: I) -> LinkPath
where
    I: IntoIterator<Item = S>,
    S: Into<LinkName>,
{
    segments.into_iter().map(Into::into).collect()
}

/// Location of a concrete attribute slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrAddress {
    pub processor: ProcessorId,
    pub key: AttributeKey,
}

impl AttrAddress {
    pub fn new(processor: ProcessorId, key: impl Into<AttributeKey>) -> Self {
        Self {
            processor,
            key: key.into(),
        }
    }
}

impl fmt::Display for AttrAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.processor, self.key)
    }
}

/// Monotonic allocator for handle types.
#[derive(Clone, Debug, Default)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub(crate) fn next(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}
