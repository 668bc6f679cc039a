//! Registry of named modifier logic types.
//!
//! Content loaders describe modifiers declaratively ([`ModifierDefinition`]):
//! target, source id, priority, combination kind, a logic type name, and named
//! arguments. The registry turns that shape into a [`ModifierInstance`].
//!
//! The registry is an explicit value owned by the graph (see
//! [`crate::AttributeGraph::with_registry`]); there is no global table, so
//! tests can build isolated registries.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::{CombinationKind, ModifierInstance, ModifierLogic, logic};
use crate::graph::GraphError;
use crate::ids::{AttributeKey, LinkPath, SourceId};
use crate::value::ValueSource;

/// Named argument of a modifier definition.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArgumentDefinition {
    pub name: String,
    pub value: ValueSource,
}

impl ArgumentDefinition {
    pub fn new(name: impl Into<String>, value: impl Into<ValueSource>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Declarative modifier, as produced by a content loader.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModifierDefinition {
    pub target: AttributeKey,
    #[cfg_attr(feature = "serde", serde(default))]
    pub path: LinkPath,
    pub source: SourceId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: i32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: CombinationKind,
    pub logic: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub arguments: Vec<ArgumentDefinition>,
}

/// Lookup table from logic type name to implementation.
///
/// Names are matched case-insensitively.
#[derive(Clone, Default)]
pub struct ModifierRegistry {
    logic: HashMap<String, Arc<dyn ModifierLogic>>,
}

impl ModifierRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the stock logic types
    /// (`flat`, `scaled`, `linear`, `clamp`).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(logic::Flat));
        registry.register(Arc::new(logic::Scaled));
        registry.register(Arc::new(logic::Linear));
        registry.register(Arc::new(logic::Clamp));
        registry
    }

    /// Registers (or replaces) a logic type under its own name.
    pub fn register(&mut self, logic: Arc<dyn ModifierLogic>) -> Option<Arc<dyn ModifierLogic>> {
        self.logic.insert(logic.name().to_ascii_lowercase(), logic)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ModifierLogic>> {
        self.logic.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.logic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logic.is_empty()
    }

    /// Iterates registered logic names (for debugging).
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.logic.keys().map(String::as_str)
    }

    /// Builds the instance described by `definition`.
    ///
    /// Arguments are reordered to match the logic's declared parameters. A
    /// declared parameter without a matching argument reads as `0.0`.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownModifierType`] if the logic name is not registered.
    pub fn instantiate(
        &self,
        definition: &ModifierDefinition,
    ) -> Result<ModifierInstance, GraphError> {
        let logic = self
            .get(&definition.logic)
            .cloned()
            .ok_or_else(|| GraphError::UnknownModifierType(definition.logic.clone()))?;

        let arguments = order_arguments(logic.as_ref(), definition);

        Ok(ModifierInstance::new(definition.kind, logic)
            .with_priority(definition.priority)
            .with_arguments(arguments))
    }

    /// Like [`Self::instantiate`], but an unknown logic type degrades to a
    /// neutral modifier (additive zero) and a warning instead of an error.
    pub fn instantiate_or_neutral(&self, definition: &ModifierDefinition) -> ModifierInstance {
        match self.instantiate(definition) {
            Ok(instance) => instance,
            Err(error) => {
                warn!(
                    target: "stats::registry",
                    logic = %definition.logic,
                    source = %definition.source,
                    attribute = %definition.target,
                    error = %error,
                    "Unknown modifier logic, substituting neutral modifier"
                );
                neutral(definition.priority)
            }
        }
    }
}

impl std::fmt::Debug for ModifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ModifierRegistry")
            .field("logic", &names)
            .finish()
    }
}

/// Additive zero: leaves any attribute unchanged.
pub fn neutral(priority: i32) -> ModifierInstance {
    ModifierInstance::new(CombinationKind::Additive, Arc::new(logic::Neutral)).with_priority(priority)
}

fn order_arguments(logic: &dyn ModifierLogic, definition: &ModifierDefinition) -> Vec<ValueSource> {
    let parameters = logic.parameters();
    if parameters.is_empty() {
        return definition
            .arguments
            .iter()
            .map(|argument| argument.value.clone())
            .collect();
    }

    for argument in &definition.arguments {
        if !parameters
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&argument.name))
        {
            warn!(
                target: "stats::registry",
                logic = logic.name(),
                argument = %argument.name,
                "Ignoring argument not declared by modifier logic"
            );
        }
    }

    parameters
        .iter()
        .map(|parameter| {
            definition
                .arguments
                .iter()
                .find(|argument| argument.name.eq_ignore_ascii_case(parameter))
                .map(|argument| argument.value.clone())
                .unwrap_or_else(|| {
                    warn!(
                        target: "stats::registry",
                        logic = logic.name(),
                        parameter = *parameter,
                        "Missing modifier argument, defaulting to 0"
                    );
                    ValueSource::Constant(0.0)
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(logic: &str, arguments: Vec<ArgumentDefinition>) -> ModifierDefinition {
        ModifierDefinition {
            target: "Damage".into(),
            path: LinkPath::new(),
            source: "sword".into(),
            priority: 2,
            kind: CombinationKind::Additive,
            logic: logic.to_owned(),
            arguments,
        }
    }

    #[test]
    fn arguments_are_reordered_by_declared_parameters() {
        let registry = ModifierRegistry::with_defaults();
        let def = definition(
            "Linear",
            vec![
                ArgumentDefinition::new("intercept", 1.0),
                ArgumentDefinition::new("input", ValueSource::local("Strength")),
                ArgumentDefinition::new("slope", 2.0),
            ],
        );

        let instance = registry.instantiate(&def).unwrap();
        assert_eq!(instance.logic_name(), "linear");
        assert_eq!(instance.priority, 2);
        assert_eq!(
            instance.arguments,
            vec![
                ValueSource::local("Strength"),
                ValueSource::Constant(2.0),
                ValueSource::Constant(1.0),
            ]
        );
    }

    #[test]
    fn missing_argument_defaults_to_zero() {
        let registry = ModifierRegistry::with_defaults();
        let def = definition("scaled", vec![ArgumentDefinition::new("value", 4.0)]);

        let instance = registry.instantiate(&def).unwrap();
        assert_eq!(instance.arguments[1], ValueSource::Constant(0.0));
    }

    #[test]
    fn unknown_logic_is_an_error_or_neutral() {
        let registry = ModifierRegistry::with_defaults();
        let def = definition("exponential", vec![]);

        assert_eq!(
            registry.instantiate(&def).unwrap_err(),
            GraphError::UnknownModifierType("exponential".into())
        );

        let fallback = registry.instantiate_or_neutral(&def);
        assert_eq!(fallback.logic_name(), "neutral");
        assert_eq!(fallback.kind, CombinationKind::Additive);
        assert_eq!(fallback.priority, 2);
    }

    #[test]
    fn registries_are_isolated() {
        let mut custom = ModifierRegistry::new();
        custom.register(Arc::new(crate::modifier::FnLogic::new("double", |args| {
            args.first().copied().unwrap_or(0.0) * 2.0
        })));

        assert!(custom.contains("DOUBLE"));
        assert!(!ModifierRegistry::with_defaults().contains("double"));
        assert_eq!(custom.len(), 1);
        assert_eq!(custom.names().collect::<Vec<_>>(), vec!["double"]);

        let defaults = ModifierRegistry::with_defaults();
        let mut stock: Vec<&str> = defaults.names().collect();
        stock.sort_unstable();
        assert_eq!(stock, vec!["clamp", "flat", "linear", "scaled"]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn definition_deserializes_from_loader_shape() {
        let json = r#"{
            "target": "Damage",
            "source": "sword",
            "kind": "additive",
            "logic": "scaled",
            "arguments": [
                { "name": "value", "value": { "reference": { "key": "Strength", "path": ["Owner"] } } },
                { "name": "factor", "value": { "constant": 1.0 } }
            ]
        }"#;

        let def: ModifierDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.priority, 0);
        assert!(def.path.is_empty());
        assert_eq!(
            def.arguments[0].value,
            ValueSource::remote("Strength", ["Owner"])
        );
    }
}
