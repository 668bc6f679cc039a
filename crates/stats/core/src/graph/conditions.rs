//! Compiled condition signals.
//!
//! Observing a [`Condition`] compiles it into a [`ConditionNode`] tree whose
//! tag and attribute leaves are bindings. Leaf changes queue the condition
//! for re-evaluation; a flip notifies listeners and toggles the stat block
//! that owns the condition, if any.

use tracing::{debug, trace};

use super::binding::{BindingConsumer, BindingTarget, Endpoint};
use super::propagate::FlushBudget;
use super::{AttributeGraph, GraphError};
use crate::condition::{ComparisonOp, CompositeOp, Condition};
use crate::ids::{BindingId, ConditionId, ProcessorId, StatBlockId, Tag};
use crate::value::ValueSource;

#[derive(Clone, Copy, Debug)]
pub(crate) enum Operand {
    Constant(f64),
    Bound(BindingId),
}

#[derive(Clone, Debug)]
pub(crate) enum ConditionNode {
    Always,
    Tag {
        binding: BindingId,
        tag: Tag,
        invert: bool,
    },
    Comparison {
        a: Operand,
        op: ComparisonOp,
        b: Operand,
        tolerance: f64,
    },
    Composite {
        op: CompositeOp,
        children: Vec<ConditionNode>,
    },
}

impl ConditionNode {
    fn collect_bindings(&self, out: &mut Vec<BindingId>) {
        match self {
            Self::Always => {}
            Self::Tag { binding, .. } => out.push(*binding),
            Self::Comparison { a, b, .. } => {
                for operand in [a, b] {
                    if let Operand::Bound(binding) = operand {
                        out.push(*binding);
                    }
                }
            }
            Self::Composite { children, .. } => {
                for child in children {
                    child.collect_bindings(out);
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConditionOwner {
    External,
    StatBlock(StatBlockId),
}

pub(crate) struct ConditionListener {
    pub(crate) last: Option<bool>,
    pub(crate) callback: Box<dyn FnMut(bool)>,
}

pub(crate) struct ConditionEntry {
    pub(crate) root: ProcessorId,
    pub(crate) node: ConditionNode,
    /// `None` until the first evaluation.
    pub(crate) value: Option<bool>,
    pub(crate) owner: ConditionOwner,
    pub(crate) listeners: Vec<ConditionListener>,
}

impl std::fmt::Debug for ConditionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionEntry")
            .field("root", &self.root)
            .field("node", &self.node)
            .field("value", &self.value)
            .field("owner", &self.owner)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl AttributeGraph {
    /// Compiles `condition` against `processor` into a live signal.
    pub fn observe_condition(
        &mut self,
        processor: ProcessorId,
        condition: &Condition,
    ) -> Result<ConditionId, GraphError> {
        self.require(processor)?;
        let id = self.open_condition(processor, condition, ConditionOwner::External);
        self.flush();
        Ok(id)
    }

    /// Current truth value of an observed condition.
    pub fn condition_met(&self, id: ConditionId) -> Option<bool> {
        self.conditions.get(&id).and_then(|entry| entry.value)
    }

    /// Registers a listener called with the current value and then on every
    /// flip. Returns false for an unknown condition.
    pub fn on_condition_change<F>(&mut self, id: ConditionId, listener: F) -> bool
    where
        F: FnMut(bool) + 'static,
    {
        let Some(entry) = self.conditions.get_mut(&id) else {
            return false;
        };
        entry.listeners.push(ConditionListener {
            last: None,
            callback: Box::new(listener),
        });
        self.queue.condition_listeners.insert(id);
        self.flush();
        true
    }

    /// Stops observing a condition. Conditions owned by a stat block are
    /// released with the block and are refused here.
    pub fn release_condition(&mut self, id: ConditionId) -> bool {
        match self.conditions.get(&id).map(|entry| entry.owner) {
            Some(ConditionOwner::External) => {
                self.close_condition(id);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn open_condition(
        &mut self,
        root: ProcessorId,
        condition: &Condition,
        owner: ConditionOwner,
    ) -> ConditionId {
        let id = ConditionId(self.ids.next());
        let node = self.compile(root, id, condition);
        self.conditions.insert(
            id,
            ConditionEntry {
                root,
                node,
                value: None,
                owner,
                listeners: Vec::new(),
            },
        );
        debug!(target: "stats::graph", condition = %id, root = %root, ?owner, "Condition observed");
        self.queue.conditions.insert(id);
        id
    }

    pub(crate) fn close_condition(&mut self, id: ConditionId) {
        let Some(entry) = self.conditions.remove(&id) else {
            return;
        };
        let mut bindings = Vec::new();
        entry.node.collect_bindings(&mut bindings);
        for binding in bindings {
            self.unbind(binding);
        }
        self.queue.conditions.remove(&id);
        self.queue.condition_listeners.remove(&id);
    }

    /// Releases external conditions rooted at `processor`.
    pub(crate) fn close_conditions_rooted_at(&mut self, processor: ProcessorId) {
        let ids: Vec<ConditionId> = self
            .conditions
            .iter()
            .filter(|(_, e)| e.root == processor && e.owner == ConditionOwner::External)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.close_condition(id);
        }
    }

    fn compile(&mut self, root: ProcessorId, id: ConditionId, condition: &Condition) -> ConditionNode {
        match condition {
            Condition::Always => ConditionNode::Always,
            Condition::Tag { tag, path, invert } => ConditionNode::Tag {
                binding: self.bind(
                    root,
                    path.clone(),
                    BindingTarget::Tag(tag.clone()),
                    BindingConsumer::Condition(id),
                ),
                tag: tag.clone(),
                invert: *invert,
            },
            Condition::Comparison {
                a,
                op,
                b,
                tolerance,
            } => ConditionNode::Comparison {
                a: self.compile_operand(root, id, a),
                op: *op,
                b: self.compile_operand(root, id, b),
                tolerance: *tolerance,
            },
            Condition::Composite { op, conditions } => ConditionNode::Composite {
                op: *op,
                children: conditions
                    .iter()
                    .map(|child| self.compile(root, id, child))
                    .collect(),
            },
        }
    }

    fn compile_operand(&mut self, root: ProcessorId, id: ConditionId, source: &ValueSource) -> Operand {
        match source {
            ValueSource::Constant(value) => Operand::Constant(*value),
            ValueSource::Reference(reference) => Operand::Bound(self.bind(
                root,
                reference.path.clone(),
                BindingTarget::Attribute(reference.key.clone()),
                BindingConsumer::Condition(id),
            )),
        }
    }

    fn evaluate(&self, node: &ConditionNode) -> bool {
        match node {
            ConditionNode::Always => true,
            ConditionNode::Tag {
                binding,
                tag,
                invert,
            } => match self.binding_endpoint(*binding) {
                Some(Endpoint::Processor(processor)) => {
                    let present = self
                        .processors
                        .get(processor)
                        .is_some_and(|p| p.has_tag(tag));
                    present != *invert
                }
                _ => false,
            },
            ConditionNode::Comparison {
                a,
                op,
                b,
                tolerance,
            } => match (self.operand_value(*a), self.operand_value(*b)) {
                (Some(a), Some(b)) => op.compare(a, b, *tolerance),
                _ => false,
            },
            ConditionNode::Composite { op, children } => match op {
                CompositeOp::And => children.iter().all(|child| self.evaluate(child)),
                CompositeOp::Or => {
                    children.is_empty() || children.iter().any(|child| self.evaluate(child))
                }
            },
        }
    }

    fn operand_value(&self, operand: Operand) -> Option<f64> {
        match operand {
            Operand::Constant(value) => Some(value),
            Operand::Bound(binding) => self.binding_value(binding),
        }
    }

    pub(crate) fn reevaluate_condition(&mut self, id: ConditionId, budget: &mut FlushBudget) {
        let Some(entry) = self.conditions.get(&id) else {
            return;
        };
        let value = self.evaluate(&entry.node);
        let previous = entry.value;
        if previous == Some(value) {
            return;
        }
        if previous.is_some() && !budget.allow_toggle(id, self.config.max_condition_toggles) {
            return;
        }

        let Some(entry) = self.conditions.get_mut(&id) else {
            return;
        };
        entry.value = Some(value);
        let owner = entry.owner;
        if !entry.listeners.is_empty() {
            self.queue.condition_listeners.insert(id);
        }
        trace!(target: "stats::propagate", condition = %id, ?previous, value, "Condition evaluated");

        if let ConditionOwner::StatBlock(block) = owner {
            self.sync_stat_block(block, value);
        }
    }
}
