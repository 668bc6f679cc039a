//! Value subscriptions.
//!
//! A subscription follows an attribute reference exactly like a modifier
//! argument does: retargeting through links or pointers moves it, and the
//! callback sees the value at the new endpoint. Callbacks run after
//! propagation has settled and only when the observed value actually changed.

use tracing::debug;

use super::binding::{BindingConsumer, BindingTarget};
use super::{AttributeGraph, GraphError};
use crate::ids::{BindingId, ProcessorId, SubscriptionId};
use crate::value::AttributeRef;

/// What a subscriber is told.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttributeEvent {
    /// Current value at the subscribed reference (`0.0` while unresolved).
    Changed(f64),
    /// The subscription's root processor was removed; no further events.
    Removed,
}

pub(crate) type SubscriberFn = Box<dyn FnMut(AttributeEvent)>;

pub(crate) struct SubscriptionEntry {
    pub(crate) root: ProcessorId,
    pub(crate) binding: BindingId,
    pub(crate) last: Option<f64>,
    pub(crate) callback: SubscriberFn,
}

impl std::fmt::Debug for SubscriptionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionEntry")
            .field("root", &self.root)
            .field("binding", &self.binding)
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

impl AttributeGraph {
    /// Delivers the current value of `reference` (resolved from `processor`)
    /// now, and again every time it changes.
    pub fn subscribe<F>(
        &mut self,
        processor: ProcessorId,
        reference: impl Into<AttributeRef>,
        callback: F,
    ) -> Result<SubscriptionId, GraphError>
    where
        F: FnMut(AttributeEvent) + 'static,
    {
        self.require(processor)?;
        let reference = reference.into();
        let id = SubscriptionId(self.ids.next());
        let binding = self.bind(
            processor,
            reference.path.clone(),
            BindingTarget::Attribute(reference.key.clone()),
            BindingConsumer::Subscription(id),
        );
        self.subscriptions.insert(
            id,
            SubscriptionEntry {
                root: processor,
                binding,
                last: None,
                callback: Box::new(callback),
            },
        );
        debug!(
            target: "stats::graph",
            subscription = %id,
            processor = %processor,
            attribute = %reference.key,
            path = ?reference.path,
            "Subscribed"
        );
        self.queue.subscriptions.insert(id);
        self.flush();
        Ok(id)
    }

    /// Stops a subscription. The callback is dropped without a final event.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(entry) = self.subscriptions.remove(&id) else {
            return false;
        };
        self.unbind(entry.binding);
        self.queue.subscriptions.remove(&id);
        true
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Removes subscriptions rooted at `processor`, scheduling their final
    /// `Removed` event.
    pub(crate) fn end_subscriptions_rooted_at(&mut self, processor: ProcessorId) {
        let mut ids: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .filter(|(_, entry)| entry.root == processor)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(entry) = self.subscriptions.remove(&id) {
                self.unbind(entry.binding);
                self.queue.subscriptions.remove(&id);
                self.removed_subscriptions.push(entry.callback);
            }
        }
    }
}
