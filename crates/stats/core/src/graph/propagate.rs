//! Change propagation.
//!
//! Mutations only enqueue work; [`AttributeGraph::flush`] drains it before a
//! public operation returns. The loop always settles topology first
//! (binding re-resolution), then attribute values, then conditions, so a
//! value is never recomputed against a half-updated link structure. Callbacks
//! run only after every queue is empty and therefore observe a consistent
//! graph.
//!
//! Attributes are recomputed in waves. An attribute with many inputs that
//! change together is recomputed once per wave, not once per input, so the
//! pass budget only trips when values keep feeding back into themselves.

use std::collections::{BTreeSet, HashMap};

use tracing::{trace, warn};

use super::AttributeGraph;
use super::subscription::AttributeEvent;
use crate::ids::{AttrAddress, BindingId, ConditionId, SubscriptionId};
use crate::modifier::pipeline;

#[derive(Debug, Default)]
pub(crate) struct WorkQueue {
    pub(crate) bindings: BTreeSet<BindingId>,
    pub(crate) attributes: BTreeSet<AttrAddress>,
    pub(crate) conditions: BTreeSet<ConditionId>,
    pub(crate) subscriptions: BTreeSet<SubscriptionId>,
    pub(crate) condition_listeners: BTreeSet<ConditionId>,
}

/// Per-flush counters bounding feedback loops.
#[derive(Debug, Default)]
pub(crate) struct FlushBudget {
    recomputes: HashMap<AttrAddress, u32>,
    toggles: HashMap<ConditionId, u32>,
}

impl FlushBudget {
    /// Counts one wave in which `address` was recomputed; false once the
    /// limit is exceeded.
    fn allow_recompute(&mut self, address: &AttrAddress, limit: u32) -> bool {
        let passes = self.recomputes.entry(address.clone()).or_insert(0);
        *passes += 1;
        if *passes == limit + 1 {
            warn!(
                target: "stats::propagate",
                attribute = %address,
                limit,
                "Attribute keeps changing within one propagation; leaving it at its last value"
            );
        }
        *passes <= limit
    }

    /// Counts one condition flip; false once the limit is exceeded.
    pub(crate) fn allow_toggle(&mut self, condition: ConditionId, limit: u32) -> bool {
        let toggles = self.toggles.entry(condition).or_insert(0);
        *toggles += 1;
        if *toggles == limit + 1 {
            warn!(
                target: "stats::propagate",
                condition = %condition,
                limit,
                "Condition oscillates within one propagation; ignoring further flips"
            );
        }
        *toggles <= limit
    }
}

impl AttributeGraph {
    /// Drains every queue until the graph is consistent, then delivers
    /// notifications.
    pub(crate) fn flush(&mut self) {
        let mut budget = FlushBudget::default();
        let mut steps = 0usize;

        loop {
            if let Some(id) = self.queue.bindings.pop_first() {
                self.reresolve(id);
            } else if !self.queue.attributes.is_empty() {
                // One wave: everything dirty now is recomputed once; what it
                // dirties in turn waits for the next wave.
                for address in std::mem::take(&mut self.queue.attributes) {
                    if budget.allow_recompute(&address, self.config.max_recompute_passes) {
                        self.recompute(&address);
                    }
                }
            } else if let Some(id) = self.queue.conditions.pop_first() {
                self.reevaluate_condition(id, &mut budget);
            } else {
                break;
            }
            steps += 1;
        }

        if steps > 0 {
            trace!(target: "stats::propagate", steps, "Propagation settled");
        }
        self.deliver();
    }

    /// Refolds one attribute from its modifiers' current magnitudes.
    pub(crate) fn recompute(&mut self, address: &AttrAddress) {
        let Some(attribute) = self
            .processors
            .get(&address.processor)
            .and_then(|p| p.attribute(&address.key))
        else {
            return;
        };

        let magnitudes: Vec<_> = attribute
            .modifier_ids()
            .into_iter()
            .map(|id| (id, self.magnitude(id)))
            .collect();

        let Some(attribute) = self
            .processors
            .get_mut(&address.processor)
            .and_then(|p| p.attribute_mut(&address.key))
        else {
            return;
        };
        let before = attribute.value();
        if !attribute.refold(&magnitudes) {
            return;
        }

        trace!(
            target: "stats::propagate",
            attribute = %address,
            before,
            after = attribute.value(),
            "Attribute value changed"
        );
        for binding in self.watch.value_watchers(address) {
            if let Some(consumer) = self.consumer_of(binding) {
                self.binding_value_changed(consumer);
            }
        }
    }

    fn deliver(&mut self) {
        for mut callback in std::mem::take(&mut self.removed_subscriptions) {
            callback(AttributeEvent::Removed);
        }

        for id in std::mem::take(&mut self.queue.subscriptions) {
            let Some(binding) = self.subscriptions.get(&id).map(|s| s.binding) else {
                continue;
            };
            let value = self.binding_value(binding).unwrap_or(0.0);
            let Some(subscription) = self.subscriptions.get_mut(&id) else {
                continue;
            };
            let changed = subscription
                .last
                .is_none_or(|last| pipeline::value_changed(last, value));
            if changed {
                subscription.last = Some(value);
                (subscription.callback)(AttributeEvent::Changed(value));
            }
        }

        for id in std::mem::take(&mut self.queue.condition_listeners) {
            let Some(entry) = self.conditions.get_mut(&id) else {
                continue;
            };
            let Some(value) = entry.value else {
                continue;
            };
            for listener in &mut entry.listeners {
                if listener.last != Some(value) {
                    listener.last = Some(value);
                    (listener.callback)(value);
                }
            }
        }
    }
}
