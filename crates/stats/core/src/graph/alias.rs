//! Pointer (alias) installation and removal.
//!
//! Installing a pointer replaces whatever the slot held. If a concrete
//! attribute was there, its modifiers lose their attachment and follow their
//! target binding to wherever the alias now resolves.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::{AttributeGraph, GraphError};
use crate::bundle::{LinkSpec, PointerSpec};
use crate::ids::{AttrAddress, AttributeKey, LinkName, LinkPath, ProcessorId};
use crate::processor::{AttributeSlot, PointerState};

impl AttributeGraph {
    /// Turns `alias` on `processor` into a pointer to `target` reached
    /// through `path`.
    ///
    /// # Errors
    ///
    /// - [`GraphError::SelfReference`] for a local pointer to its own key
    /// - [`GraphError::CircularPointer`] if the alias chain from the target
    ///   currently leads back to `alias`
    pub fn set_pointer(
        &mut self,
        processor: ProcessorId,
        alias: impl Into<AttributeKey>,
        target: impl Into<AttributeKey>,
        path: LinkPath,
    ) -> Result<(), GraphError> {
        self.install_pointer(processor, alias.into(), target.into(), path)?;
        self.flush();
        Ok(())
    }

    /// Reverts `alias` to an empty slot. Returns false if it was not a
    /// pointer.
    pub fn remove_pointer(&mut self, processor: ProcessorId, alias: &str) -> bool {
        let removed = self.uninstall_pointer(processor, alias, None);
        if removed {
            self.flush();
        }
        removed
    }

    /// Installs a pointer without propagating. Returns the pointer's id.
    pub(crate) fn install_pointer(
        &mut self,
        processor: ProcessorId,
        alias: AttributeKey,
        target: AttributeKey,
        path: LinkPath,
    ) -> Result<u64, GraphError> {
        self.check_pointer(processor, &alias, &target, &path, &[], &[])?;

        let id = self.ids.next();
        let pointer = PointerState::new(id, target, path);
        let Some(owner) = self.processors.get_mut(&processor) else {
            return Err(GraphError::UnknownProcessor(processor));
        };
        debug!(
            target: "stats::alias",
            processor = %processor,
            alias = %alias,
            target_key = %pointer.target,
            path = ?pointer.path,
            "Pointer installed"
        );
        let previous = owner.slots.insert(alias.clone(), AttributeSlot::Alias(pointer));

        let address = AttrAddress::new(processor, alias);
        if let Some(AttributeSlot::Concrete(attribute)) = previous {
            for modifier in attribute.modifier_ids() {
                if let Some(entry) = self.modifiers.get_mut(&modifier) {
                    entry.attached_to = None;
                }
            }
        }
        let watchers = self.watch.slot_watchers(&address);
        self.requeue(watchers);
        Ok(id)
    }

    /// Removes the pointer at `alias`, only if it is still the one with id
    /// `expected` when given.
    pub(crate) fn uninstall_pointer(
        &mut self,
        processor: ProcessorId,
        alias: &str,
        expected: Option<u64>,
    ) -> bool {
        let Some(owner) = self.processors.get_mut(&processor) else {
            return false;
        };
        let matches = match owner.slots.get(alias) {
            Some(AttributeSlot::Alias(pointer)) => expected.is_none_or(|id| pointer.id == id),
            _ => false,
        };
        if !matches {
            return false;
        }
        owner.slots.remove(alias);
        debug!(target: "stats::alias", processor = %processor, alias, "Pointer removed");

        let address = AttrAddress::new(processor, alias);
        let watchers = self.watch.slot_watchers(&address);
        self.requeue(watchers);
        true
    }

    /// Validates a pointer against the current graph, with `pending`
    /// pointers and `links` on `processor` taken as already installed.
    pub(crate) fn check_pointer(
        &self,
        processor: ProcessorId,
        alias: &AttributeKey,
        target: &AttributeKey,
        path: &[LinkName],
        pending: &[PointerSpec],
        links: &[LinkSpec],
    ) -> Result<(), GraphError> {
        self.require(processor)?;
        if path.is_empty() && alias == target {
            warn!(
                target: "stats::alias",
                processor = %processor,
                alias = %alias,
                "Rejected self-referencing pointer"
            );
            return Err(GraphError::SelfReference {
                processor,
                key: alias.clone(),
            });
        }

        if self.chain_reaches(processor, alias, target, path, pending, links) {
            warn!(
                target: "stats::alias",
                processor = %processor,
                alias = %alias,
                target_key = %target,
                ?path,
                "Rejected pointer that would close an alias cycle"
            );
            return Err(GraphError::CircularPointer {
                processor,
                alias: alias.clone(),
                target: target.clone(),
                path: path.to_vec(),
            });
        }
        Ok(())
    }

    /// Whether following the chain that starts at `path`/`target` from
    /// `processor` returns to `(processor, alias)`.
    fn chain_reaches(
        &self,
        processor: ProcessorId,
        alias: &AttributeKey,
        target: &AttributeKey,
        path: &[LinkName],
        pending: &[PointerSpec],
        links: &[LinkSpec],
    ) -> bool {
        let origin = AttrAddress::new(processor, alias.clone());
        let mut visited = HashSet::new();
        let Some(mut current) = self.walk_overlaid(processor, processor, path, links) else {
            return false;
        };
        let mut key = target.clone();

        loop {
            let address = AttrAddress::new(current, key.clone());
            if address == origin {
                return true;
            }
            if !visited.insert(address) {
                // An existing loop that does not pass through the origin.
                return false;
            }

            let overlay = (current == processor)
                .then(|| pending.iter().rev().find(|p| p.alias == key))
                .flatten();
            let (next_key, next_path) = match overlay {
                Some(spec) => (spec.target.clone(), spec.path.clone()),
                None => match self
                    .processors
                    .get(&current)
                    .and_then(|p| p.pointer(&key))
                {
                    Some(pointer) => (pointer.target.clone(), pointer.path.clone()),
                    None => return false,
                },
            };
            let Some(next) = self.walk_overlaid(processor, current, &next_path, links) else {
                return false;
            };
            current = next;
            key = next_key;
        }
    }

    /// Like [`Self::resolve_path`], with `links` replacing the links of
    /// `context` of the same name.
    fn walk_overlaid(
        &self,
        context: ProcessorId,
        from: ProcessorId,
        path: &[LinkName],
        links: &[LinkSpec],
    ) -> Option<ProcessorId> {
        let mut current = self.processors.get(&from)?;
        for name in path {
            let overlay = (current.id() == context)
                .then(|| links.iter().rev().find(|link| link.name == *name))
                .flatten();
            let next = match overlay {
                Some(link) => link.target,
                None => current.link(name)?,
            };
            current = self.processors.get(&next)?;
        }
        Some(current.id())
    }
}
