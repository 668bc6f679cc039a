//! Modifier registration, attachment and removal.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::binding::{BindingConsumer, BindingTarget};
use super::{AttributeGraph, GraphError};
use crate::ids::{AttrAddress, AttributeKey, BindingId, LinkPath, ModifierId, ProcessorId, SourceId};
use crate::modifier::{ModifierDefinition, ModifierInstance};
use crate::processor::AttachedModifier;
use crate::value::ValueSource;

#[derive(Clone, Copy, Debug)]
pub(crate) enum Argument {
    Constant(f64),
    Bound(BindingId),
}

/// Graph-side record of one modifier.
#[derive(Debug)]
pub(crate) struct ModifierEntry {
    pub(crate) source: SourceId,
    pub(crate) owner: ProcessorId,
    pub(crate) instance: ModifierInstance,
    pub(crate) target: BindingId,
    pub(crate) arguments: Vec<Argument>,
    /// Attribute the modifier currently sits on.
    pub(crate) attached_to: Option<AttrAddress>,
}

impl AttributeGraph {
    /// Registers a modifier owned by `processor`, targeting `target` reached
    /// through `path`. The target follows link and pointer changes; while it
    /// does not resolve the modifier stays registered but unattached.
    pub fn add_modifier(
        &mut self,
        processor: ProcessorId,
        source: impl Into<SourceId>,
        instance: ModifierInstance,
        target: impl Into<AttributeKey>,
        path: LinkPath,
    ) -> Result<ModifierId, GraphError> {
        self.require(processor)?;
        let id = self.insert_modifier(processor, source.into(), instance, target.into(), path);
        self.flush();
        Ok(id)
    }

    /// Instantiates a definition through the graph's registry and adds it.
    ///
    /// An unknown logic type registers a neutral modifier instead (see
    /// [`crate::ModifierRegistry::instantiate_or_neutral`]).
    pub fn add_definition(
        &mut self,
        processor: ProcessorId,
        definition: &ModifierDefinition,
    ) -> Result<ModifierId, GraphError> {
        self.require(processor)?;
        let instance = self.registry.instantiate_or_neutral(definition);
        let id = self.insert_modifier(
            processor,
            definition.source.clone(),
            instance,
            definition.target.clone(),
            definition.path.clone(),
        );
        self.flush();
        Ok(id)
    }

    pub fn remove_modifier(&mut self, id: ModifierId) -> bool {
        let removed = self.drop_modifier(id);
        if removed {
            self.flush();
        }
        removed
    }

    /// Removes every modifier from `source` owned by, or attached to, a
    /// processor reachable from `processor` through links. Returns the number
    /// removed.
    pub fn remove_modifiers_by_source(&mut self, processor: ProcessorId, source: &str) -> usize {
        let mut reachable = HashSet::new();
        let mut stack = vec![processor];
        while let Some(current) = stack.pop() {
            if !reachable.insert(current) {
                continue;
            }
            if let Some(p) = self.processors.get(&current) {
                stack.extend(p.links().map(|(_, target)| target).filter(|t| !reachable.contains(t)));
            }
        }

        let doomed: Vec<ModifierId> = self
            .modifiers_by_source
            .get(source)
            .into_iter()
            .flatten()
            .copied()
            .filter(|id| {
                self.modifiers.get(id).is_some_and(|entry| {
                    reachable.contains(&entry.owner)
                        || entry
                            .attached_to
                            .as_ref()
                            .is_some_and(|a| reachable.contains(&a.processor))
                })
            })
            .collect();

        for id in &doomed {
            self.drop_modifier(*id);
        }
        debug!(
            target: "stats::graph",
            root = %processor,
            source,
            removed = doomed.len(),
            reachable = reachable.len(),
            "Removed modifiers by source"
        );
        self.flush();
        doomed.len()
    }

    /// Attribute a modifier is currently attached to.
    pub fn modifier_target(&self, id: ModifierId) -> Option<&AttrAddress> {
        self.modifiers.get(&id).and_then(|m| m.attached_to.as_ref())
    }

    pub fn has_modifier(&self, id: ModifierId) -> bool {
        self.modifiers.contains_key(&id)
    }

    /// Ids of every live modifier from `source`, in registration order.
    pub fn modifiers_from(&self, source: &str) -> Vec<ModifierId> {
        self.modifiers_by_source
            .get(source)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn insert_modifier(
        &mut self,
        owner: ProcessorId,
        source: SourceId,
        instance: ModifierInstance,
        target_key: AttributeKey,
        path: LinkPath,
    ) -> ModifierId {
        let id = ModifierId(self.ids.next());
        let target = self.bind(
            owner,
            path,
            BindingTarget::Attribute(target_key),
            BindingConsumer::ModifierTarget(id),
        );
        let arguments = instance
            .arguments
            .iter()
            .map(|argument| match argument {
                ValueSource::Constant(value) => Argument::Constant(*value),
                ValueSource::Reference(reference) => Argument::Bound(self.bind(
                    owner,
                    reference.path.clone(),
                    BindingTarget::Attribute(reference.key.clone()),
                    BindingConsumer::ModifierArgument(id),
                )),
            })
            .collect();

        trace!(
            target: "stats::graph",
            modifier = %id,
            owner = %owner,
            source = %source,
            logic = instance.logic_name(),
            "Modifier registered"
        );
        self.modifiers_by_source
            .entry(source.clone())
            .or_default()
            .insert(id);
        self.modifiers.insert(
            id,
            ModifierEntry {
                source,
                owner,
                instance,
                target,
                arguments,
                attached_to: None,
            },
        );
        id
    }

    pub(crate) fn drop_modifier(&mut self, id: ModifierId) -> bool {
        let Some(entry) = self.modifiers.remove(&id) else {
            return false;
        };
        if let Some(ids) = self.modifiers_by_source.get_mut(&entry.source) {
            ids.remove(&id);
            if ids.is_empty() {
                self.modifiers_by_source.remove(&entry.source);
            }
        }
        if let Some(address) = entry.attached_to {
            self.detach_from(id, address);
        }
        self.unbind(entry.target);
        for argument in entry.arguments {
            if let Argument::Bound(binding) = argument {
                self.unbind(binding);
            }
        }
        true
    }

    /// Moves a modifier to `address` (or leaves it unattached).
    pub(crate) fn reattach(&mut self, id: ModifierId, address: Option<AttrAddress>) {
        let Some(entry) = self.modifiers.get_mut(&id) else {
            return;
        };
        let previous = entry.attached_to.take();
        let attached = AttachedModifier {
            id,
            source: entry.source.clone(),
            priority: entry.instance.priority,
            kind: entry.instance.kind,
            magnitude: None,
        };

        if let Some(previous) = previous {
            self.detach_from(id, previous);
        }
        let Some(address) = address else {
            return;
        };
        let Some(attribute) = self
            .processors
            .get_mut(&address.processor)
            .and_then(|p| p.attribute_mut(&address.key))
        else {
            return;
        };
        attribute.attach(attached);
        if let Some(entry) = self.modifiers.get_mut(&id) {
            entry.attached_to = Some(address.clone());
        }
        self.queue.attributes.insert(address);
    }

    fn detach_from(&mut self, id: ModifierId, address: AttrAddress) {
        if let Some(attribute) = self
            .processors
            .get_mut(&address.processor)
            .and_then(|p| p.attribute_mut(&address.key))
        {
            attribute.detach(id);
            self.queue.attributes.insert(address);
        }
    }

    pub(crate) fn mark_modifier_dirty(&mut self, id: ModifierId) {
        if let Some(address) = self.modifiers.get(&id).and_then(|m| m.attached_to.clone()) {
            self.queue.attributes.insert(address);
        }
    }

    /// Current magnitude; `None` while a reference argument is unresolved.
    pub(crate) fn magnitude(&self, id: ModifierId) -> Option<f64> {
        let entry = self.modifiers.get(&id)?;
        let arguments = entry
            .arguments
            .iter()
            .map(|argument| match argument {
                Argument::Constant(value) => Some(*value),
                Argument::Bound(binding) => self.binding_value(*binding),
            })
            .collect::<Option<Vec<f64>>>()?;
        Some(entry.instance.compute(&arguments))
    }
}
