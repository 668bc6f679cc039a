//! Concrete attribute storage.

use crate::ids::{ModifierId, SourceId};
use crate::modifier::CombinationKind;
use crate::modifier::pipeline::{self, Step};

/// A modifier as seen from the attribute it is attached to.
#[derive(Clone, Debug, PartialEq)]
pub struct AttachedModifier {
    pub id: ModifierId,
    pub source: SourceId,
    pub priority: i32,
    pub kind: CombinationKind,
    /// Magnitude from the last recomputation; `None` while an argument is
    /// unresolved (the modifier is skipped).
    pub magnitude: Option<f64>,
}

impl AttachedModifier {
    fn order_key(&self) -> (i32, ModifierId) {
        (self.priority, self.id)
    }
}

/// Named value cell: base value, ordered modifiers, computed value.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    base: f64,
    value: f64,
    modifiers: Vec<AttachedModifier>,
}

impl Attribute {
    pub(crate) fn new(base: f64) -> Self {
        Self {
            base,
            value: base,
            modifiers: Vec::new(),
        }
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    /// Value after folding every active modifier into the base.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Attached modifiers in application order.
    pub fn modifiers(&self) -> &[AttachedModifier] {
        &self.modifiers
    }

    pub fn modifier_count(&self) -> usize {
        self.modifiers.len()
    }

    pub fn has_modifier(&self, id: ModifierId) -> bool {
        self.modifiers.iter().any(|m| m.id == id)
    }

    pub(crate) fn set_base(&mut self, base: f64) {
        self.base = base;
    }

    /// Inserts keeping `(priority, id)` order. Attaching the same id twice
    /// replaces the earlier entry.
    pub(crate) fn attach(&mut self, modifier: AttachedModifier) {
        self.detach(modifier.id);
        let key = modifier.order_key();
        let index = self
            .modifiers
            .partition_point(|existing| existing.order_key() < key);
        self.modifiers.insert(index, modifier);
    }

    pub(crate) fn detach(&mut self, id: ModifierId) -> bool {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| m.id != id);
        self.modifiers.len() != before
    }

    pub(crate) fn modifier_ids(&self) -> Vec<ModifierId> {
        self.modifiers.iter().map(|m| m.id).collect()
    }

    /// Stores fresh magnitudes and refolds. Returns true if the value changed.
    pub(crate) fn refold(&mut self, magnitudes: &[(ModifierId, Option<f64>)]) -> bool {
        for modifier in &mut self.modifiers {
            modifier.magnitude = magnitudes
                .iter()
                .find(|(id, _)| *id == modifier.id)
                .and_then(|(_, magnitude)| *magnitude);
        }

        let steps: Vec<Step> = self
            .modifiers
            .iter()
            .map(|m| Step {
                priority: m.priority,
                kind: m.kind,
                magnitude: m.magnitude,
            })
            .collect();

        let value = pipeline::fold(self.base, &steps);
        let changed = pipeline::value_changed(self.value, value);
        self.value = value;
        changed
    }
}
