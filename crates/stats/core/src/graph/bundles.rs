//! Bundle application, reversal and condition-gated stat blocks.

use tracing::{debug, info, warn};

use super::binding::{BindingConsumer, BindingTarget};
use super::conditions::ConditionOwner;
use super::{AttributeGraph, GraphError};
use crate::bundle::{ActiveBundle, BundleSpec, Registration, StatBlock, TagSpec};
use crate::ids::{BindingId, ConditionId, LinkName, PlacementId, ProcessorId, SourceId, StatBlockId, Tag};

/// A tag placed through a path; it follows the path as links change.
#[derive(Debug)]
pub(crate) struct PlacementEntry {
    pub(crate) owner: ProcessorId,
    pub(crate) tag: Tag,
    pub(crate) binding: BindingId,
    pub(crate) applied_to: Option<ProcessorId>,
}

#[derive(Debug)]
pub(crate) struct StatBlockEntry {
    pub(crate) context: ProcessorId,
    pub(crate) block: StatBlock,
    pub(crate) condition: ConditionId,
    pub(crate) active: Option<ActiveBundle>,
}

impl AttributeGraph {
    /// Applies every registration in `spec` with `context` as the root
    /// processor, attributing modifiers to `source`.
    ///
    /// Pointers and links are validated before anything is registered; on
    /// error the graph is left unchanged.
    pub fn apply_bundle(
        &mut self,
        context: ProcessorId,
        source: impl Into<SourceId>,
        spec: &BundleSpec,
    ) -> Result<ActiveBundle, GraphError> {
        let bundle = self.build_bundle(context, source.into(), spec);
        self.flush();
        bundle
    }

    /// Reverts a bundle's registrations in reverse order. Idempotent.
    pub fn dispose_bundle(&mut self, bundle: &mut ActiveBundle) {
        if bundle.is_disposed() {
            return;
        }
        self.revert_bundle(bundle);
        self.flush();
    }

    /// Attaches a stat block to `context`. Its bundle is applied while the
    /// block's condition holds.
    pub fn attach_stat_block(
        &mut self,
        context: ProcessorId,
        block: StatBlock,
    ) -> Result<StatBlockId, GraphError> {
        self.require(context)?;
        let id = StatBlockId(self.ids.next());
        let condition = self.open_condition(context, &block.condition, ConditionOwner::StatBlock(id));
        debug!(
            target: "stats::graph",
            stat_block = %id,
            context = %context,
            source = %block.source,
            "Stat block attached"
        );
        self.stat_blocks.insert(
            id,
            StatBlockEntry {
                context,
                block,
                condition,
                active: None,
            },
        );
        self.flush();
        Ok(id)
    }

    /// Detaches a stat block, disposing its bundle if applied.
    pub fn detach_stat_block(&mut self, id: StatBlockId) -> bool {
        if !self.close_stat_block(id) {
            return false;
        }
        self.flush();
        true
    }

    pub fn stat_block_active(&self, id: StatBlockId) -> bool {
        self.stat_blocks
            .get(&id)
            .is_some_and(|entry| entry.active.is_some())
    }

    /// Condition signal driving a stat block.
    pub fn stat_block_condition(&self, id: StatBlockId) -> Option<ConditionId> {
        self.stat_blocks.get(&id).map(|entry| entry.condition)
    }

    pub(crate) fn close_stat_block(&mut self, id: StatBlockId) -> bool {
        let Some(mut entry) = self.stat_blocks.remove(&id) else {
            return false;
        };
        if let Some(mut bundle) = entry.active.take() {
            self.revert_bundle(&mut bundle);
        }
        self.close_condition(entry.condition);
        true
    }

    pub(crate) fn close_stat_blocks_of(&mut self, context: ProcessorId) {
        let ids: Vec<StatBlockId> = self
            .stat_blocks
            .iter()
            .filter(|(_, entry)| entry.context == context)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.close_stat_block(id);
        }
    }

    /// Brings a stat block in line with its condition.
    pub(crate) fn sync_stat_block(&mut self, id: StatBlockId, met: bool) {
        let Some(entry) = self.stat_blocks.get_mut(&id) else {
            return;
        };

        if !met {
            if let Some(mut bundle) = entry.active.take() {
                info!(target: "stats::graph", stat_block = %id, "Stat block deactivated");
                self.revert_bundle(&mut bundle);
            }
            return;
        }
        if entry.active.is_some() {
            return;
        }

        let context = entry.context;
        let source = entry.block.source.clone();
        let spec = entry.block.bundle.clone();
        match self.build_bundle(context, source, &spec) {
            Ok(bundle) => {
                info!(target: "stats::graph", stat_block = %id, "Stat block activated");
                if let Some(entry) = self.stat_blocks.get_mut(&id) {
                    entry.active = Some(bundle);
                }
            }
            Err(error) => warn!(
                target: "stats::graph",
                stat_block = %id,
                %error,
                "Stat block condition holds but its bundle could not be applied"
            ),
        }
    }

    fn build_bundle(
        &mut self,
        context: ProcessorId,
        source: SourceId,
        spec: &BundleSpec,
    ) -> Result<ActiveBundle, GraphError> {
        self.require(context)?;
        for link in &spec.links {
            self.require(link.target)?;
        }
        for (index, pointer) in spec.pointers.iter().enumerate() {
            self.check_pointer(
                context,
                &pointer.alias,
                &pointer.target,
                &pointer.path,
                &spec.pointers[..index],
                &spec.links,
            )?;
        }

        let mut bundle = ActiveBundle::new(source.clone(), context);
        let mut replaced = Vec::new();

        for link in &spec.links {
            let previous = self.processors.get(&context).and_then(|p| p.link(&link.name));
            replaced.push((link.name.clone(), previous));
            self.set_link(context, link.name.clone(), link.target);
            bundle.record(Registration::Link {
                processor: context,
                name: link.name.clone(),
                target: link.target,
            });
        }

        for pointer in &spec.pointers {
            match self.install_pointer(
                context,
                pointer.alias.clone(),
                pointer.target.clone(),
                pointer.path.clone(),
            ) {
                Ok(id) => bundle.record(Registration::Pointer {
                    processor: context,
                    alias: pointer.alias.clone(),
                    pointer: id,
                }),
                Err(error) => {
                    self.revert_bundle(&mut bundle);
                    for (name, previous) in replaced.into_iter().rev() {
                        if let Some(target) = previous {
                            self.set_link(context, name, target);
                        }
                    }
                    return Err(error);
                }
            }
        }

        for modifier in &spec.modifiers {
            let id = self.insert_modifier(
                context,
                source.clone(),
                modifier.instance.clone(),
                modifier.target.clone(),
                modifier.path.clone(),
            );
            bundle.record(Registration::Modifier(id));
        }

        for tag in &spec.tags {
            let id = self.place_tag(context, tag);
            bundle.record(Registration::Tag(id));
        }

        debug!(
            target: "stats::graph",
            context = %context,
            source = %source,
            registrations = bundle.registrations().len(),
            "Bundle applied"
        );
        Ok(bundle)
    }

    /// Reverses a bundle without propagating.
    pub(crate) fn revert_bundle(&mut self, bundle: &mut ActiveBundle) {
        let registrations = bundle.take_registrations();
        let count = registrations.len();
        for registration in registrations.into_iter().rev() {
            match registration {
                Registration::Modifier(id) => {
                    self.drop_modifier(id);
                }
                Registration::Tag(id) => self.lift_tag(id),
                Registration::Pointer {
                    processor,
                    alias,
                    pointer,
                } => {
                    self.uninstall_pointer(processor, &alias, Some(pointer));
                }
                Registration::Link {
                    processor,
                    name,
                    target,
                } => self.clear_link_if(processor, &name, target),
            }
        }
        debug!(
            target: "stats::graph",
            context = %bundle.context(),
            source = %bundle.source(),
            registrations = count,
            "Bundle disposed"
        );
    }

    fn clear_link_if(&mut self, processor: ProcessorId, name: &LinkName, target: ProcessorId) {
        let current = self.processors.get(&processor).and_then(|p| p.link(name));
        if current == Some(target) {
            self.clear_link(processor, name);
        }
    }

    fn place_tag(&mut self, context: ProcessorId, spec: &TagSpec) -> PlacementId {
        let id = PlacementId(self.ids.next());
        let binding = self.bind(
            context,
            spec.path.clone(),
            BindingTarget::Processor,
            BindingConsumer::Placement(id),
        );
        self.placements.insert(
            id,
            PlacementEntry {
                owner: context,
                tag: spec.tag.clone(),
                binding,
                applied_to: None,
            },
        );
        id
    }

    pub(crate) fn lift_tag(&mut self, id: PlacementId) {
        let Some(entry) = self.placements.remove(&id) else {
            return;
        };
        if let Some(processor) = entry.applied_to {
            self.decrement_tag(processor, &entry.tag);
        }
        self.unbind(entry.binding);
    }

    /// Moves a placed tag reference to `processor` (or nowhere).
    pub(crate) fn move_placement(&mut self, id: PlacementId, processor: Option<ProcessorId>) {
        let Some(entry) = self.placements.get_mut(&id) else {
            return;
        };
        let previous = std::mem::replace(&mut entry.applied_to, processor);
        let tag = entry.tag.clone();
        if let Some(previous) = previous {
            self.decrement_tag(previous, &tag);
        }
        if let Some(next) = processor {
            self.increment_tag(next, tag);
        }
    }
}
