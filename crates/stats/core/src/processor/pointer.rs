//! Alias binding stored in an attribute slot.

use crate::ids::{AttributeKey, LinkPath};

/// Redirects an attribute key to another attribute, local or via a path.
///
/// `id` is unique per graph; bundles use it to remove only the pointer they
/// installed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointerState {
    pub(crate) id: u64,
    pub target: AttributeKey,
    pub path: LinkPath,
}

impl PointerState {
    pub(crate) fn new(id: u64, target: AttributeKey, path: LinkPath) -> Self {
        Self { id, target, path }
    }

    pub fn is_local(&self) -> bool {
        self.path.is_empty()
    }
}
