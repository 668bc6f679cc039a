//! The attribute graph.
//!
//! [`AttributeGraph`] owns every processor and every registration made
//! against them. Processors refer to each other only by [`ProcessorId`], so
//! removing one never leaves a dangling reference: links to it are dropped
//! and every binding that went through it re-resolves.
//!
//! # Propagation model
//!
//! Every public mutation updates the structure, queues the consequences and
//! drains the queues before returning (see [`propagate`]). Reads therefore
//! always observe a fully propagated graph.
//!
//! Callbacks (subscriptions and condition listeners) cannot borrow the graph;
//! they receive values, not references.

mod alias;
mod binding;
mod bundles;
mod conditions;
mod errors;
mod modifiers;
mod path;
mod propagate;
mod subscription;

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::config::GraphConfig;
use crate::ids::{
    AttrAddress, AttributeKey, BindingId, ConditionId, IdAllocator, LinkName, ModifierId,
    PlacementId, ProcessorId, SourceId, StatBlockId, SubscriptionId, Tag,
};
use crate::modifier::ModifierRegistry;
use crate::processor::{Attribute, AttributeSlot, Processor};
use crate::value::AttributeRef;

use binding::{Binding, WatchIndex};
use bundles::{PlacementEntry, StatBlockEntry};
use conditions::ConditionEntry;
use modifiers::ModifierEntry;
use path::Trace;
use propagate::WorkQueue;
use subscription::{SubscriberFn, SubscriptionEntry};

pub use errors::GraphError;
pub use subscription::AttributeEvent;

pub struct AttributeGraph {
    config: GraphConfig,
    registry: ModifierRegistry,
    ids: IdAllocator,
    processors: HashMap<ProcessorId, Processor>,
    modifiers: HashMap<ModifierId, ModifierEntry>,
    modifiers_by_source: HashMap<SourceId, BTreeSet<ModifierId>>,
    bindings: HashMap<BindingId, Binding>,
    watch: WatchIndex,
    subscriptions: HashMap<SubscriptionId, SubscriptionEntry>,
    conditions: HashMap<ConditionId, ConditionEntry>,
    placements: HashMap<PlacementId, PlacementEntry>,
    stat_blocks: HashMap<StatBlockId, StatBlockEntry>,
    queue: WorkQueue,
    removed_subscriptions: Vec<SubscriberFn>,
}

impl std::fmt::Debug for AttributeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeGraph")
            .field("config", &self.config)
            .field("processors", &self.processors.len())
            .field("modifiers", &self.modifiers.len())
            .field("bindings", &self.bindings.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("conditions", &self.conditions.len())
            .field("stat_blocks", &self.stat_blocks.len())
            .finish_non_exhaustive()
    }
}

impl Default for AttributeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeGraph {
    /// Empty graph with default configuration and the built-in modifier
    /// logic types.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            config,
            registry: ModifierRegistry::with_defaults(),
            ids: IdAllocator::default(),
            processors: HashMap::new(),
            modifiers: HashMap::new(),
            modifiers_by_source: HashMap::new(),
            bindings: HashMap::new(),
            watch: WatchIndex::default(),
            subscriptions: HashMap::new(),
            conditions: HashMap::new(),
            placements: HashMap::new(),
            stat_blocks: HashMap::new(),
            queue: WorkQueue::default(),
            removed_subscriptions: Vec::new(),
        }
    }

    /// Replaces the modifier registry used by [`Self::add_definition`].
    #[must_use]
    pub fn with_registry(mut self, registry: ModifierRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModifierRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModifierRegistry {
        &mut self.registry
    }

    // ========================================================================
    // Processors
    // ========================================================================

    pub fn create_processor(&mut self, name: impl Into<String>) -> ProcessorId {
        let id = ProcessorId(self.ids.next());
        let processor = Processor::new(id, name.into());
        debug!(target: "stats::graph", processor = %id, name = processor.name(), "Processor created");
        self.processors.insert(id, processor);
        id
    }

    /// Removes a processor together with everything rooted at it: its stat
    /// blocks, the modifiers and tags it registered, its conditions and its
    /// subscriptions (which receive [`AttributeEvent::Removed`]). Links from
    /// other processors to it are dropped.
    pub fn remove_processor(&mut self, id: ProcessorId) -> Result<(), GraphError> {
        self.require(id)?;

        self.close_stat_blocks_of(id);

        let owned: Vec<ModifierId> = self
            .modifiers
            .iter()
            .filter(|(_, entry)| entry.owner == id)
            .map(|(mid, _)| *mid)
            .collect();
        for modifier in owned {
            self.drop_modifier(modifier);
        }

        let placed: Vec<PlacementId> = self
            .placements
            .iter()
            .filter(|(_, entry)| entry.owner == id)
            .map(|(pid, _)| *pid)
            .collect();
        for placement in placed {
            self.lift_tag(placement);
        }

        self.close_conditions_rooted_at(id);
        self.end_subscriptions_rooted_at(id);

        let Some(removed) = self.processors.remove(&id) else {
            return Err(GraphError::UnknownProcessor(id));
        };
        for slot in removed.slots.values() {
            if let AttributeSlot::Concrete(attribute) = slot {
                for modifier in attribute.modifier_ids() {
                    if let Some(entry) = self.modifiers.get_mut(&modifier) {
                        entry.attached_to = None;
                    }
                }
            }
        }

        let inbound: Vec<(ProcessorId, LinkName)> = self
            .processors
            .values()
            .flat_map(|p| {
                p.links()
                    .filter(|(_, target)| *target == id)
                    .map(|(name, _)| (p.id(), name.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (owner, name) in &inbound {
            self.clear_link(*owner, name);
        }

        let mut affected = self.watch.touching(id);
        affected.extend(
            self.bindings
                .iter()
                .filter(|(_, b)| b.root == id)
                .map(|(bid, _)| *bid),
        );
        self.requeue(affected);

        info!(
            target: "stats::graph",
            processor = %id,
            name = removed.name(),
            inbound_links = inbound.len(),
            "Processor removed"
        );
        self.flush();
        Ok(())
    }

    pub fn processor(&self, id: ProcessorId) -> Option<&Processor> {
        self.processors.get(&id)
    }

    pub fn contains_processor(&self, id: ProcessorId) -> bool {
        self.processors.contains_key(&id)
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    pub(crate) fn require(&self, id: ProcessorId) -> Result<(), GraphError> {
        if self.processors.contains_key(&id) {
            Ok(())
        } else {
            Err(GraphError::UnknownProcessor(id))
        }
    }

    // ========================================================================
    // Links
    // ========================================================================

    /// Points `name` on `processor` at `target`, replacing any previous link
    /// of that name. Everything resolved through the link follows it.
    pub fn register_link(
        &mut self,
        processor: ProcessorId,
        name: impl Into<LinkName>,
        target: ProcessorId,
    ) -> Result<(), GraphError> {
        self.require(processor)?;
        self.require(target)?;
        self.set_link(processor, name.into(), target);
        self.flush();
        Ok(())
    }

    /// Removes a link, returning its previous target.
    pub fn unregister_link(&mut self, processor: ProcessorId, name: &str) -> Option<ProcessorId> {
        let name = LinkName::from(name);
        let previous = self.clear_link(processor, &name);
        if previous.is_some() {
            self.flush();
        }
        previous
    }

    pub(crate) fn set_link(&mut self, processor: ProcessorId, name: LinkName, target: ProcessorId) {
        let Some(owner) = self.processors.get_mut(&processor) else {
            return;
        };
        let previous = owner.links.insert(name.clone(), target);
        if previous == Some(target) {
            return;
        }
        debug!(
            target: "stats::graph",
            processor = %processor,
            link = %name,
            target_processor = %target,
            ?previous,
            "Link registered"
        );
        let watchers = self.watch.link_watchers(processor, &name);
        self.requeue(watchers);
    }

    pub(crate) fn clear_link(&mut self, processor: ProcessorId, name: &LinkName) -> Option<ProcessorId> {
        let previous = self.processors.get_mut(&processor)?.links.remove(name)?;
        debug!(target: "stats::graph", processor = %processor, link = %name, "Link removed");
        let watchers = self.watch.link_watchers(processor, name);
        self.requeue(watchers);
        Some(previous)
    }

    // ========================================================================
    // Tags
    // ========================================================================

    /// Adds one reference to `tag`.
    pub fn add_tag(&mut self, processor: ProcessorId, tag: impl Into<Tag>) -> Result<(), GraphError> {
        self.require(processor)?;
        self.increment_tag(processor, tag.into());
        self.flush();
        Ok(())
    }

    /// Drops one reference to `tag`. Returns false if the tag was absent.
    pub fn remove_tag(&mut self, processor: ProcessorId, tag: &str) -> bool {
        let present = self
            .processors
            .get(&processor)
            .is_some_and(|p| p.has_tag(tag));
        if !present {
            return false;
        }
        self.decrement_tag(processor, &Tag::from(tag));
        self.flush();
        true
    }

    pub fn has_tag(&self, processor: ProcessorId, tag: &str) -> bool {
        self.processors
            .get(&processor)
            .is_some_and(|p| p.has_tag(tag))
    }

    pub fn tag_count(&self, processor: ProcessorId, tag: &str) -> u32 {
        self.processors
            .get(&processor)
            .map_or(0, |p| p.tag_count(tag))
    }

    pub(crate) fn increment_tag(&mut self, processor: ProcessorId, tag: Tag) {
        let Some(owner) = self.processors.get_mut(&processor) else {
            return;
        };
        if owner.tags.add(tag.clone()) {
            debug!(target: "stats::graph", processor = %processor, tag = %tag, "Tag gained");
            self.tag_presence_changed(processor, &tag);
        }
    }

    pub(crate) fn decrement_tag(&mut self, processor: ProcessorId, tag: &Tag) {
        let Some(owner) = self.processors.get_mut(&processor) else {
            return;
        };
        if owner.tags.remove(tag) {
            debug!(target: "stats::graph", processor = %processor, tag = %tag, "Tag lost");
            self.tag_presence_changed(processor, tag);
        }
    }

    fn tag_presence_changed(&mut self, processor: ProcessorId, tag: &Tag) {
        for binding in self.watch.tag_watchers(processor, tag) {
            if let Some(consumer) = self.consumer_of(binding) {
                self.binding_value_changed(consumer);
            }
        }
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Sets the base value of `key`, following aliases to the concrete
    /// attribute. An empty slot becomes a concrete attribute.
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidTarget`] if `key` is an alias whose chain does
    /// not currently resolve; nothing is written.
    pub fn set_base_value(
        &mut self,
        processor: ProcessorId,
        key: impl Into<AttributeKey>,
        value: f64,
    ) -> Result<(), GraphError> {
        self.require(processor)?;
        let key = key.into();
        let address = match self.peek(processor, &key, &[]) {
            Trace::Concrete(address) => address,
            Trace::Vacant(address) => {
                self.create_attribute(address.clone(), value);
                address
            }
            Trace::Unresolved(_) => {
                warn!(
                    target: "stats::alias",
                    processor = %processor,
                    key = %key,
                    value,
                    "Base value written to an unresolved pointer was dropped"
                );
                return Err(GraphError::InvalidTarget { processor, key });
            }
        };

        if let Some(attribute) = self
            .processors
            .get_mut(&address.processor)
            .and_then(|p| p.attribute_mut(&address.key))
        {
            attribute.set_base(value);
        }
        self.queue.attributes.insert(address);
        self.flush();
        Ok(())
    }

    /// Concrete attribute `key` resolves to, following aliases.
    pub fn get(&self, processor: ProcessorId, key: &str) -> Option<&Attribute> {
        match self.peek(processor, &AttributeKey::from(key), &[]) {
            Trace::Concrete(address) => self.attribute_at(&address),
            _ => None,
        }
    }

    /// Like [`Self::get`], but an empty final slot is filled with a concrete
    /// attribute whose base is `default`.
    pub fn get_or_create(
        &mut self,
        processor: ProcessorId,
        key: impl Into<AttributeKey>,
        default: f64,
    ) -> Result<&Attribute, GraphError> {
        self.require(processor)?;
        let key = key.into();
        let address = match self.peek(processor, &key, &[]) {
            Trace::Concrete(address) => address,
            Trace::Vacant(address) => {
                self.create_attribute(address.clone(), default);
                self.flush();
                address
            }
            Trace::Unresolved(_) => return Err(GraphError::InvalidTarget { processor, key }),
        };
        self.attribute_at(&address)
            .ok_or(GraphError::InvalidTarget { processor, key })
    }

    /// Current value of `key`; `0.0` when it does not resolve to a concrete
    /// attribute.
    pub fn value(&self, processor: ProcessorId, key: &str) -> f64 {
        self.get(processor, key).map_or(0.0, Attribute::value)
    }

    /// Current value behind `reference` resolved from `processor`.
    pub fn value_of(&self, processor: ProcessorId, reference: &AttributeRef) -> f64 {
        match self.peek(processor, &reference.key, &reference.path) {
            Trace::Concrete(address) => self.attribute_at(&address).map_or(0.0, Attribute::value),
            _ => 0.0,
        }
    }

    pub fn base_value(&self, processor: ProcessorId, key: &str) -> Option<f64> {
        self.get(processor, key).map(Attribute::base)
    }

    pub fn attribute_at(&self, address: &AttrAddress) -> Option<&Attribute> {
        self.processors
            .get(&address.processor)
            .and_then(|p| p.attribute(&address.key))
    }

    /// Fills an empty slot with a concrete attribute.
    pub(crate) fn create_attribute(&mut self, address: AttrAddress, base: f64) {
        let Some(owner) = self.processors.get_mut(&address.processor) else {
            return;
        };
        if owner.slots.contains_key(&address.key) {
            return;
        }
        owner
            .slots
            .insert(address.key.clone(), AttributeSlot::Concrete(Attribute::new(base)));
        debug!(target: "stats::graph", attribute = %address, base, "Attribute created");
        let watchers = self.watch.slot_watchers(&address);
        self.requeue(watchers);
    }
}
