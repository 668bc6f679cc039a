//! Bundles - groups of registrations applied and reverted together.
//!
//! A [`BundleSpec`] describes what one configuration (an equipped item, a
//! status effect) contributes: modifiers, tags, pointers and links.
//! [`crate::AttributeGraph::apply_bundle`] turns it into an [`ActiveBundle`]
//! that remembers every registration it made; disposing the bundle reverses
//! each one exactly once.
//!
//! A [`StatBlock`] wraps a bundle in a [`Condition`]: the graph applies the
//! bundle while the condition holds and disposes it when it stops holding.

use crate::condition::Condition;
use crate::graph::AttributeGraph;
use crate::ids::{AttributeKey, LinkName, LinkPath, ModifierId, PlacementId, ProcessorId, SourceId, Tag};
use crate::modifier::ModifierInstance;

/// A modifier pushed onto `target` (reached through `path` from the context).
#[derive(Clone, Debug)]
pub struct ModifierSpec {
    pub target: AttributeKey,
    pub path: LinkPath,
    pub instance: ModifierInstance,
}

impl ModifierSpec {
    pub fn local(target: impl Into<AttributeKey>, instance: ModifierInstance) -> Self {
        Self {
            target: target.into(),
            path: LinkPath::new(),
            instance,
        }
    }

    pub fn remote<I, S>(target: impl Into<AttributeKey>, path: I, instance: ModifierInstance) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<LinkName>,
    {
        Self {
            target: target.into(),
            path: crate::ids::path(path),
            instance,
        }
    }
}

/// A tag placed on the processor reached through `path`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagSpec {
    pub tag: Tag,
    pub path: LinkPath,
}

impl TagSpec {
    pub fn local(tag: impl Into<Tag>) -> Self {
        Self {
            tag: tag.into(),
            path: LinkPath::new(),
        }
    }

    pub fn remote<I, S>(tag: impl Into<Tag>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<LinkName>,
    {
        Self {
            tag: tag.into(),
            path: crate::ids::path(path),
        }
    }
}

/// A pointer installed on the context processor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointerSpec {
    pub alias: AttributeKey,
    pub target: AttributeKey,
    pub path: LinkPath,
}

impl PointerSpec {
    pub fn new(alias: impl Into<AttributeKey>, target: impl Into<AttributeKey>, path: LinkPath) -> Self {
        Self {
            alias: alias.into(),
            target: target.into(),
            path,
        }
    }
}

/// A link registered on the context processor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkSpec {
    pub name: LinkName,
    pub target: ProcessorId,
}

impl LinkSpec {
    pub fn new(name: impl Into<LinkName>, target: ProcessorId) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BundleSpec {
    pub modifiers: Vec<ModifierSpec>,
    pub tags: Vec<TagSpec>,
    pub pointers: Vec<PointerSpec>,
    pub links: Vec<LinkSpec>,
}

impl BundleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn modifier(mut self, spec: ModifierSpec) -> Self {
        self.modifiers.push(spec);
        self
    }

    #[must_use]
    pub fn tag(mut self, spec: TagSpec) -> Self {
        self.tags.push(spec);
        self
    }

    #[must_use]
    pub fn pointer(mut self, spec: PointerSpec) -> Self {
        self.pointers.push(spec);
        self
    }

    #[must_use]
    pub fn link(mut self, spec: LinkSpec) -> Self {
        self.links.push(spec);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
            && self.tags.is_empty()
            && self.pointers.is_empty()
            && self.links.is_empty()
    }
}

/// One registration made while applying a bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Registration {
    Modifier(ModifierId),
    Tag(PlacementId),
    Pointer {
        processor: ProcessorId,
        alias: AttributeKey,
        pointer: u64,
    },
    Link {
        processor: ProcessorId,
        name: LinkName,
        target: ProcessorId,
    },
}

/// Disposable handle over the registrations made by one applied bundle.
///
/// Disposal is explicit (it needs the graph): dropping an undisposed bundle
/// leaves its registrations in place.
#[derive(Debug)]
#[must_use = "an ActiveBundle must be disposed to revert its registrations"]
pub struct ActiveBundle {
    source: SourceId,
    context: ProcessorId,
    registrations: Vec<Registration>,
    disposed: bool,
}

impl ActiveBundle {
    pub(crate) fn new(source: SourceId, context: ProcessorId) -> Self {
        Self {
            source,
            context,
            registrations: Vec::new(),
            disposed: false,
        }
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn context(&self) -> ProcessorId {
        self.context
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub(crate) fn record(&mut self, registration: Registration) {
        self.registrations.push(registration);
    }

    /// Hands the registrations over for reversal, exactly once.
    pub(crate) fn take_registrations(&mut self) -> Vec<Registration> {
        self.disposed = true;
        std::mem::take(&mut self.registrations)
    }

    /// Reverses every registration. A second call is a no-op.
    pub fn dispose(&mut self, graph: &mut AttributeGraph) {
        graph.dispose_bundle(self);
    }
}

/// Condition-gated bundle.
#[derive(Clone, Debug)]
pub struct StatBlock {
    pub source: SourceId,
    pub condition: Condition,
    pub bundle: BundleSpec,
}

impl StatBlock {
    pub fn new(source: impl Into<SourceId>, condition: Condition, bundle: BundleSpec) -> Self {
        Self {
            source: source.into(),
            condition,
            bundle,
        }
    }

    /// Stat block that is always applied.
    pub fn unconditional(source: impl Into<SourceId>, bundle: BundleSpec) -> Self {
        Self::new(source, Condition::Always, bundle)
    }
}
