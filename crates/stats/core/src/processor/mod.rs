//! Processors - nodes of the entity graph.
//!
//! A processor owns a keyed set of attribute slots, named outbound links to
//! other processors, and a reference-counted tag set. Each slot is either a
//! concrete [`Attribute`] or an alias ([`PointerState`]); the tagged variant
//! makes the two mutually exclusive per key.
//!
//! Links are non-owning: a processor never keeps another alive. Lifetime is
//! managed by [`crate::AttributeGraph`], and a link to a removed processor is
//! dropped with it.
//!
//! Processors are read through [`crate::AttributeGraph::processor`]; every
//! mutation goes through the graph so it can propagate.

pub mod attribute;
pub mod pointer;
pub mod tags;

use std::collections::HashMap;

use crate::ids::{AttributeKey, LinkName, ProcessorId, Tag};

pub use attribute::{AttachedModifier, Attribute};
pub use pointer::PointerState;
pub use tags::TagSet;

/// Contents of an attribute key.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeSlot {
    Concrete(Attribute),
    Alias(PointerState),
}

impl AttributeSlot {
    pub fn as_attribute(&self) -> Option<&Attribute> {
        match self {
            Self::Concrete(attribute) => Some(attribute),
            Self::Alias(_) => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&PointerState> {
        match self {
            Self::Concrete(_) => None,
            Self::Alias(pointer) => Some(pointer),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Processor {
    id: ProcessorId,
    name: String,
    pub(crate) slots: HashMap<AttributeKey, AttributeSlot>,
    pub(crate) links: HashMap<LinkName, ProcessorId>,
    pub(crate) tags: TagSet,
}

impl Processor {
    pub(crate) fn new(id: ProcessorId, name: String) -> Self {
        Self {
            id,
            name,
            slots: HashMap::new(),
            links: HashMap::new(),
            tags: TagSet::new(),
        }
    }

    pub fn id(&self) -> ProcessorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot(&self, key: &str) -> Option<&AttributeSlot> {
        self.slots.get(key)
    }

    /// Concrete attribute stored at `key` (aliases are not followed).
    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.slots.get(key).and_then(AttributeSlot::as_attribute)
    }

    /// Alias stored at `key`, if the key is a pointer.
    pub fn pointer(&self, key: &str) -> Option<&PointerState> {
        self.slots.get(key).and_then(AttributeSlot::as_pointer)
    }

    pub fn is_pointer(&self, key: &str) -> bool {
        self.pointer(key).is_some()
    }

    /// Keys of every slot, concrete or alias.
    pub fn keys(&self) -> impl Iterator<Item = &AttributeKey> + '_ {
        self.slots.keys()
    }

    pub fn link(&self, name: &str) -> Option<ProcessorId> {
        self.links.get(name).copied()
    }

    pub fn links(&self) -> impl Iterator<Item = (&LinkName, ProcessorId)> + '_ {
        self.links.iter().map(|(name, target)| (name, *target))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn tag_count(&self, tag: &str) -> u32 {
        self.tags.count(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = (&Tag, u32)> + '_ {
        self.tags.iter()
    }

    pub(crate) fn attribute_mut(&mut self, key: &str) -> Option<&mut Attribute> {
        match self.slots.get_mut(key) {
            Some(AttributeSlot::Concrete(attribute)) => Some(attribute),
            _ => None,
        }
    }
}
