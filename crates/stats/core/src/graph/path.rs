//! Path walking and alias chasing.

use std::collections::HashSet;

use tracing::warn;

use super::AttributeGraph;
use super::binding::Dependency;
use super::GraphError;
use crate::ids::{AttrAddress, AttributeKey, LinkName, ProcessorId};
use crate::processor::AttributeSlot;
use crate::value::AttributeRef;

/// Where an attribute reference ends up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Trace {
    /// A concrete attribute lives here.
    Concrete(AttrAddress),
    /// The slot reached is empty; a concrete attribute could be created here.
    Vacant(AttrAddress),
    Unresolved(Break),
}

/// Why a trace stopped short.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Break {
    /// The initial path did not resolve.
    Path,
    /// The pointer at this slot has an unresolved path.
    Alias(AttrAddress),
    /// The alias chain returned to this slot.
    Cycle(AttrAddress),
}

impl AttributeGraph {
    /// Follows `path` link by link from `root`, recording every link
    /// consulted (including the one that was missing).
    pub(crate) fn walk_path(
        &self,
        root: ProcessorId,
        path: &[LinkName],
        deps: &mut Vec<Dependency>,
    ) -> Option<ProcessorId> {
        let mut current = self.processors.get(&root)?;
        for name in path {
            deps.push(Dependency::Link(current.id(), name.clone()));
            let next = current.link(name)?;
            current = self.processors.get(&next)?;
        }
        Some(current.id())
    }

    /// Resolves `key` reached through `path`, chasing aliases to the slot
    /// that would hold the concrete attribute.
    pub(crate) fn trace(
        &self,
        root: ProcessorId,
        key: &AttributeKey,
        path: &[LinkName],
        deps: &mut Vec<Dependency>,
    ) -> Trace {
        let Some(mut processor) = self.walk_path(root, path, deps) else {
            return Trace::Unresolved(Break::Path);
        };
        let mut key = key.clone();
        let mut visited = HashSet::new();

        loop {
            let address = AttrAddress {
                processor,
                key: key.clone(),
            };
            deps.push(Dependency::Slot(address.clone()));
            if !visited.insert(address.clone()) {
                warn!(
                    target: "stats::alias",
                    slot = %address,
                    "Alias chain loops back on itself; treating as unresolved"
                );
                return Trace::Unresolved(Break::Cycle(address));
            }

            let Some(owner) = self.processors.get(&processor) else {
                return Trace::Unresolved(Break::Path);
            };
            match owner.slots.get(&key) {
                None => return Trace::Vacant(address),
                Some(AttributeSlot::Concrete(_)) => return Trace::Concrete(address),
                Some(AttributeSlot::Alias(pointer)) => {
                    match self.walk_path(processor, &pointer.path, deps) {
                        Some(next) => {
                            processor = next;
                            key = pointer.target.clone();
                        }
                        None => return Trace::Unresolved(Break::Alias(address)),
                    }
                }
            }
        }
    }

    /// Trace for reads; the dependencies are discarded.
    pub(crate) fn peek(&self, root: ProcessorId, key: &AttributeKey, path: &[LinkName]) -> Trace {
        self.trace(root, key, path, &mut Vec::new())
    }

    /// Processor reached by following `path` from `root`.
    pub fn resolve_path(&self, root: ProcessorId, path: &[LinkName]) -> Option<ProcessorId> {
        self.walk_path(root, path, &mut Vec::new())
    }

    /// Address a reference currently resolves to.
    ///
    /// Resolves through aliases; a vacant final slot is returned as the
    /// address a concrete attribute would be created at.
    pub fn locate(&self, root: ProcessorId, reference: &AttributeRef) -> Result<AttrAddress, GraphError> {
        self.require(root)?;
        match self.peek(root, &reference.key, &reference.path) {
            Trace::Concrete(address) | Trace::Vacant(address) => Ok(address),
            Trace::Unresolved(Break::Path) => Err(GraphError::UnresolvedPath {
                root,
                path: reference.path.clone(),
            }),
            Trace::Unresolved(Break::Alias(address) | Break::Cycle(address)) => {
                Err(GraphError::InvalidTarget {
                    processor: address.processor,
                    key: address.key,
                })
            }
        }
    }
}
