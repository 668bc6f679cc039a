//! Dynamic bindings - one per reference that must follow topology changes.
//!
//! Every registration whose meaning depends on links or pointers owns exactly
//! one [`Binding`]: a modifier's target, each of its reference arguments, a
//! value subscription, a condition leaf, a tag placed through a path.
//!
//! A binding records what its last resolution consulted ([`Dependency`]) in
//! the graph's [`WatchIndex`]. When any of those links or slots change, the
//! binding is queued for re-resolution; the old registrations are removed
//! before the new ones are installed, so a binding never watches two
//! resolutions at once.

use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use super::AttributeGraph;
use super::path::Trace;
use crate::ids::{
    AttrAddress, AttributeKey, BindingId, ConditionId, LinkName, LinkPath, ModifierId,
    PlacementId, ProcessorId, SubscriptionId, Tag,
};

/// What sits at the end of the binding's path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BindingTarget {
    /// A concrete attribute, following aliases (created on demand).
    Attribute(AttributeKey),
    /// The processor itself.
    Processor,
    /// The processor, watched for presence changes of one tag.
    Tag(Tag),
}

/// Registration that owns the binding and reacts to its changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BindingConsumer {
    ModifierTarget(ModifierId),
    ModifierArgument(ModifierId),
    Subscription(SubscriptionId),
    Condition(ConditionId),
    Placement(PlacementId),
}

impl BindingConsumer {
    /// Whether value changes at the endpoint matter (not only retargets).
    fn watches_value(self) -> bool {
        !matches!(self, Self::ModifierTarget(_) | Self::Placement(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Attribute(AttrAddress),
    Processor(ProcessorId),
}

impl Endpoint {
    pub(crate) fn attribute(self) -> Option<AttrAddress> {
        match self {
            Self::Attribute(address) => Some(address),
            Self::Processor(_) => None,
        }
    }

    pub(crate) fn processor(self) -> Option<ProcessorId> {
        match self {
            Self::Processor(processor) => Some(processor),
            Self::Attribute(_) => None,
        }
    }
}

/// Topology consulted by a resolution.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Dependency {
    Link(ProcessorId, LinkName),
    Slot(AttrAddress),
}

#[derive(Clone, Debug)]
pub(crate) struct Binding {
    pub(crate) root: ProcessorId,
    pub(crate) path: LinkPath,
    pub(crate) target: BindingTarget,
    pub(crate) consumer: BindingConsumer,
    pub(crate) resolved: Option<Endpoint>,
    deps: Vec<Dependency>,
}

/// Reverse indices from topology and values to the bindings that care.
#[derive(Debug, Default)]
pub(crate) struct WatchIndex {
    links: HashMap<(ProcessorId, LinkName), BTreeSet<BindingId>>,
    slots: HashMap<AttrAddress, BTreeSet<BindingId>>,
    values: HashMap<AttrAddress, BTreeSet<BindingId>>,
    tags: HashMap<(ProcessorId, Tag), BTreeSet<BindingId>>,
}

fn insert<K: std::hash::Hash + Eq>(map: &mut HashMap<K, BTreeSet<BindingId>>, key: K, id: BindingId) {
    map.entry(key).or_default().insert(id);
}

fn remove<K: std::hash::Hash + Eq>(map: &mut HashMap<K, BTreeSet<BindingId>>, key: &K, id: BindingId) {
    if let Some(set) = map.get_mut(key) {
        set.remove(&id);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

fn collect<K: std::hash::Hash + Eq>(map: &HashMap<K, BTreeSet<BindingId>>, key: &K) -> Vec<BindingId> {
    map.get(key)
        .map(|set| set.iter().copied().collect())
        .unwrap_or_default()
}

impl WatchIndex {
    fn watch_deps(&mut self, id: BindingId, deps: &[Dependency]) {
        for dep in deps {
            match dep {
                Dependency::Link(processor, name) => {
                    insert(&mut self.links, (*processor, name.clone()), id)
                }
                Dependency::Slot(address) => insert(&mut self.slots, address.clone(), id),
            }
        }
    }

    fn unwatch_deps(&mut self, id: BindingId, deps: &[Dependency]) {
        for dep in deps {
            match dep {
                Dependency::Link(processor, name) => {
                    remove(&mut self.links, &(*processor, name.clone()), id)
                }
                Dependency::Slot(address) => remove(&mut self.slots, address, id),
            }
        }
    }

    fn watch_endpoint(
        &mut self,
        id: BindingId,
        binding: &Binding,
        endpoint: &Endpoint,
    ) {
        match (endpoint, &binding.target) {
            (Endpoint::Attribute(address), _) if binding.consumer.watches_value() => {
                insert(&mut self.values, address.clone(), id)
            }
            (Endpoint::Processor(processor), BindingTarget::Tag(tag)) => {
                insert(&mut self.tags, (*processor, tag.clone()), id)
            }
            _ => {}
        }
    }

    fn unwatch_endpoint(&mut self, id: BindingId, target: &BindingTarget, endpoint: &Endpoint) {
        match (endpoint, target) {
            (Endpoint::Attribute(address), _) => remove(&mut self.values, address, id),
            (Endpoint::Processor(processor), BindingTarget::Tag(tag)) => {
                remove(&mut self.tags, &(*processor, tag.clone()), id)
            }
            _ => {}
        }
    }

    pub(crate) fn link_watchers(&self, processor: ProcessorId, name: &LinkName) -> Vec<BindingId> {
        collect(&self.links, &(processor, name.clone()))
    }

    pub(crate) fn slot_watchers(&self, address: &AttrAddress) -> Vec<BindingId> {
        collect(&self.slots, address)
    }

    pub(crate) fn value_watchers(&self, address: &AttrAddress) -> Vec<BindingId> {
        collect(&self.values, address)
    }

    pub(crate) fn tag_watchers(&self, processor: ProcessorId, tag: &Tag) -> Vec<BindingId> {
        collect(&self.tags, &(processor, tag.clone()))
    }

    /// Every binding whose resolution or value involves `processor`.
    pub(crate) fn touching(&self, processor: ProcessorId) -> BTreeSet<BindingId> {
        let mut ids = BTreeSet::new();
        for ((owner, _), set) in &self.links {
            if *owner == processor {
                ids.extend(set.iter().copied());
            }
        }
        for (address, set) in self.slots.iter().chain(self.values.iter()) {
            if address.processor == processor {
                ids.extend(set.iter().copied());
            }
        }
        for ((owner, _), set) in &self.tags {
            if *owner == processor {
                ids.extend(set.iter().copied());
            }
        }
        ids
    }
}

impl AttributeGraph {
    /// Creates a binding and queues its first resolution.
    pub(crate) fn bind(
        &mut self,
        root: ProcessorId,
        path: LinkPath,
        target: BindingTarget,
        consumer: BindingConsumer,
    ) -> BindingId {
        let id = BindingId(self.ids.next());
        self.bindings.insert(
            id,
            Binding {
                root,
                path,
                target,
                consumer,
                resolved: None,
                deps: Vec::new(),
            },
        );
        self.queue.bindings.insert(id);
        id
    }

    /// Drops a binding and every watch registration it owns.
    pub(crate) fn unbind(&mut self, id: BindingId) {
        let Some(binding) = self.bindings.remove(&id) else {
            return;
        };
        self.watch.unwatch_deps(id, &binding.deps);
        if let Some(endpoint) = &binding.resolved {
            self.watch.unwatch_endpoint(id, &binding.target, endpoint);
        }
        self.queue.bindings.remove(&id);
    }

    pub(crate) fn binding_endpoint(&self, id: BindingId) -> Option<&Endpoint> {
        self.bindings.get(&id).and_then(|b| b.resolved.as_ref())
    }

    /// Current value behind an attribute binding; `None` while unresolved.
    pub(crate) fn binding_value(&self, id: BindingId) -> Option<f64> {
        match self.binding_endpoint(id)? {
            Endpoint::Attribute(address) => self
                .processors
                .get(&address.processor)
                .and_then(|p| p.attribute(&address.key))
                .map(|attribute| attribute.value()),
            Endpoint::Processor(_) => None,
        }
    }

    /// Resolves the binding again, swapping its watch registrations and
    /// notifying its consumer if the endpoint moved.
    pub(crate) fn reresolve(&mut self, id: BindingId) {
        let Some(binding) = self.bindings.get_mut(&id) else {
            return;
        };
        let old_deps = std::mem::take(&mut binding.deps);
        let root = binding.root;
        let path = binding.path.clone();
        let target = binding.target.clone();
        let consumer = binding.consumer;
        self.watch.unwatch_deps(id, &old_deps);

        let mut deps = Vec::new();
        let endpoint = self.resolve_endpoint(root, &path, &target, &mut deps);
        self.watch.watch_deps(id, &deps);

        let Some(binding) = self.bindings.get_mut(&id) else {
            return;
        };
        binding.deps = deps;

        if binding.resolved == endpoint {
            if let BindingConsumer::ModifierTarget(modifier) = consumer {
                // The slot may have been replaced under an unchanged address.
                let attached = self.modifiers.get(&modifier).and_then(|m| m.attached_to.clone());
                let wanted = endpoint.and_then(Endpoint::attribute);
                if attached != wanted {
                    self.reattach(modifier, wanted);
                }
            }
            return;
        }

        let old = std::mem::replace(&mut binding.resolved, endpoint.clone());
        if let Some(old) = &old {
            self.watch.unwatch_endpoint(id, &target, old);
        }
        if let Some(new) = &endpoint {
            if let Some(binding) = self.bindings.get(&id) {
                self.watch.watch_endpoint(id, binding, new);
            }
        }

        trace!(
            target: "stats::graph",
            binding = %id,
            root = %root,
            ?old,
            new = ?endpoint,
            "Binding retargeted"
        );

        self.binding_moved(consumer, endpoint);
    }

    fn resolve_endpoint(
        &mut self,
        root: ProcessorId,
        path: &[LinkName],
        target: &BindingTarget,
        deps: &mut Vec<Dependency>,
    ) -> Option<Endpoint> {
        match target {
            BindingTarget::Attribute(key) => match self.trace(root, key, path, deps) {
                Trace::Concrete(address) => Some(Endpoint::Attribute(address)),
                Trace::Vacant(address) => {
                    self.create_attribute(address.clone(), 0.0);
                    Some(Endpoint::Attribute(address))
                }
                Trace::Unresolved(_) => None,
            },
            BindingTarget::Processor | BindingTarget::Tag(_) => {
                self.walk_path(root, path, deps).map(Endpoint::Processor)
            }
        }
    }

    fn binding_moved(&mut self, consumer: BindingConsumer, endpoint: Option<Endpoint>) {
        match consumer {
            BindingConsumer::ModifierTarget(modifier) => {
                self.reattach(modifier, endpoint.and_then(Endpoint::attribute))
            }
            BindingConsumer::Placement(placement) => {
                self.move_placement(placement, endpoint.and_then(Endpoint::processor))
            }
            other => self.binding_value_changed(other),
        }
    }

    /// The value behind a binding changed without the binding moving.
    pub(crate) fn binding_value_changed(&mut self, consumer: BindingConsumer) {
        match consumer {
            BindingConsumer::ModifierArgument(modifier) => self.mark_modifier_dirty(modifier),
            BindingConsumer::Subscription(subscription) => {
                self.queue.subscriptions.insert(subscription);
            }
            BindingConsumer::Condition(condition) => {
                self.queue.conditions.insert(condition);
            }
            BindingConsumer::ModifierTarget(_) | BindingConsumer::Placement(_) => {}
        }
    }

    pub(crate) fn consumer_of(&self, id: BindingId) -> Option<BindingConsumer> {
        self.bindings.get(&id).map(|b| b.consumer)
    }

    /// Queues every binding in `ids` for re-resolution.
    pub(crate) fn requeue(&mut self, ids: impl IntoIterator<Item = BindingId>) {
        self.queue.bindings.extend(ids);
    }
}
