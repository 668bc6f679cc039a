//! Reactive attribute computation over a graph of linked processors.
//!
//! `stats-core` keeps numeric attributes (Strength, Damage, ...) on
//! processors that refer to each other through named links (`Owner`,
//! `MainHand`). Modifiers, pointers, subscriptions and conditions address
//! attributes by link *paths*, and every one of them follows the path as the
//! topology changes: re-linking a sword to a new owner moves every bonus that
//! reached through `Owner` in the same call.
//!
//! All state lives in [`AttributeGraph`]; every mutation propagates before it
//! returns, so reads never see a stale value.
//!
//! ```
//! use stats_core::{AttributeGraph, CombinationKind, LinkPath, ModifierInstance, ValueSource};
//!
//! let mut graph = AttributeGraph::new();
//! let hero = graph.create_processor("hero");
//! let sword = graph.create_processor("sword");
//! graph.set_base_value(hero, "Strength", 10.0).unwrap();
//!
//! // Sword damage scales with whoever owns it.
//! let scaling = ModifierInstance::scaled(
//!     CombinationKind::Additive,
//!     ValueSource::remote("Strength", ["Owner"]),
//!     0.5,
//! );
//! graph.add_modifier(sword, "sword", scaling, "Damage", LinkPath::new()).unwrap();
//! assert_eq!(graph.value(sword, "Damage"), 0.0);
//!
//! graph.register_link(sword, "Owner", hero).unwrap();
//! assert_eq!(graph.value(sword, "Damage"), 5.0);
//! ```
pub mod bundle;
pub mod condition;
pub mod config;
pub mod error;
pub mod graph;
pub mod ids;
pub mod modifier;
pub mod processor;
pub mod value;

pub use bundle::{
    ActiveBundle, BundleSpec, LinkSpec, ModifierSpec, PointerSpec, Registration, StatBlock, TagSpec,
};
pub use condition::{ComparisonOp, CompositeOp, Condition};
pub use config::GraphConfig;
pub use error::{ErrorSeverity, StatsError};
pub use graph::{AttributeEvent, AttributeGraph, GraphError};
pub use ids::{
    AttrAddress, AttributeKey, ConditionId, LinkName, LinkPath, ModifierId, ProcessorId,
    SourceId, StatBlockId, SubscriptionId, Tag, path,
};
pub use modifier::{
    ArgumentDefinition, CombinationKind, ModifierDefinition, ModifierInstance, ModifierLogic,
    ModifierRegistry,
};
pub use processor::{AttachedModifier, Attribute, AttributeSlot, PointerState, Processor};
pub use value::{AttributeRef, ValueSource};
