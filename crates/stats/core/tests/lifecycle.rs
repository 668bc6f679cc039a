use std::cell::RefCell;
use std::rc::Rc;

use stats_core::{
    ArgumentDefinition, AttributeEvent, AttributeGraph, AttributeRef, CombinationKind,
    GraphConfig, GraphError, LinkPath, ModifierDefinition, ModifierInstance, ModifierRegistry,
    ValueSource, path,
};

fn flat(amount: f64) -> ModifierInstance {
    ModifierInstance::constant(CombinationKind::Additive, amount)
}

fn recorder() -> (
    Rc<RefCell<Vec<AttributeEvent>>>,
    impl FnMut(AttributeEvent) + 'static,
) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |event| sink.borrow_mut().push(event))
}

#[test]
fn subscription_reports_initial_and_distinct_values() {
    let mut graph = AttributeGraph::new();
    let hero = graph.create_processor("hero");
    graph.set_base_value(hero, "Strength", 10.0).expect("base write");

    let (seen, callback) = recorder();
    let id = graph.subscribe(hero, "Strength", callback).expect("subscribe");

    graph.set_base_value(hero, "Strength", 10.0).expect("same value");
    let buff = graph
        .add_modifier(hero, "buff", flat(2.0), "Strength", LinkPath::new())
        .expect("modifier");
    graph.remove_modifier(buff);

    assert!(graph.unsubscribe(id));
    assert!(!graph.unsubscribe(id));
    graph.set_base_value(hero, "Strength", 1.0).expect("after unsubscribe");

    assert_eq!(
        *seen.borrow(),
        vec![
            AttributeEvent::Changed(10.0),
            AttributeEvent::Changed(12.0),
            AttributeEvent::Changed(10.0),
        ]
    );
}

#[test]
fn modifiers_fold_in_priority_order() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");
    graph.set_base_value(p, "Power", 10.0).expect("base write");

    graph
        .add_modifier(
            p,
            "gear",
            ModifierInstance::constant(CombinationKind::Multiplicative, 2.0).with_priority(10),
            "Power",
            LinkPath::new(),
        )
        .expect("multiply");
    graph
        .add_modifier(p, "gear", flat(5.0), "Power", LinkPath::new())
        .expect("add");
    assert_eq!(graph.value(p, "Power"), 30.0);

    graph
        .add_modifier(
            p,
            "curse",
            ModifierInstance::constant(CombinationKind::Override, 100.0).with_priority(5),
            "Power",
            LinkPath::new(),
        )
        .expect("override");
    assert_eq!(graph.value(p, "Power"), 200.0);

    let order: Vec<CombinationKind> = graph
        .get(p, "Power")
        .expect("attribute")
        .modifiers()
        .iter()
        .map(|m| m.kind)
        .collect();
    assert_eq!(
        order,
        vec![
            CombinationKind::Additive,
            CombinationKind::Override,
            CombinationKind::Multiplicative,
        ]
    );
}

#[test]
fn modifier_with_unresolved_argument_is_skipped() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");
    let mentor = graph.create_processor("mentor");
    graph.set_base_value(p, "Wisdom", 4.0).expect("base write");
    graph.set_base_value(mentor, "Wisdom", 6.0).expect("base write");

    // Override with an unresolved source must not zero the attribute
    let inherit = ModifierInstance::scaled(
        CombinationKind::Override,
        ValueSource::remote("Wisdom", ["Mentor"]),
        1.0,
    );
    graph
        .add_modifier(p, "lineage", inherit, "Wisdom", LinkPath::new())
        .expect("modifier");
    assert_eq!(graph.value(p, "Wisdom"), 4.0);
    let attached = graph.get(p, "Wisdom").expect("attribute").modifiers()[0].magnitude;
    assert_eq!(attached, None);

    graph.register_link(p, "Mentor", mentor).expect("link");
    assert_eq!(graph.value(p, "Wisdom"), 6.0);
}

#[test]
fn remove_by_source_walks_linked_processors_once() {
    let mut graph = AttributeGraph::new();
    let hero = graph.create_processor("hero");
    let sword = graph.create_processor("sword");
    let bystander = graph.create_processor("bystander");
    graph.register_link(hero, "MainHand", sword).expect("link");
    graph.register_link(sword, "Owner", hero).expect("link back");
    graph.set_base_value(hero, "Strength", 10.0).expect("base write");
    graph.set_base_value(sword, "Damage", 3.0).expect("base write");
    graph.set_base_value(bystander, "Damage", 1.0).expect("base write");

    graph
        .add_modifier(sword, "enchant", flat(4.0), "Strength", path(["Owner"]))
        .expect("remote");
    graph
        .add_modifier(sword, "enchant", flat(2.0), "Damage", LinkPath::new())
        .expect("local");
    graph
        .add_modifier(bystander, "enchant", flat(9.0), "Damage", LinkPath::new())
        .expect("unreachable");
    graph
        .add_modifier(hero, "training", flat(1.0), "Strength", LinkPath::new())
        .expect("other source");

    let removed = graph.remove_modifiers_by_source(hero, "enchant");

    assert_eq!(removed, 2);
    assert_eq!(graph.value(hero, "Strength"), 11.0);
    assert_eq!(graph.value(sword, "Damage"), 3.0);
    assert_eq!(graph.value(bystander, "Damage"), 10.0);
    assert_eq!(graph.modifiers_from("enchant").len(), 1);
}

#[test]
fn removing_a_processor_cleans_up_everything_rooted_at_it() {
    let mut graph = AttributeGraph::new();
    let hero = graph.create_processor("hero");
    let sword = graph.create_processor("sword");
    graph.register_link(hero, "MainHand", sword).expect("link");
    graph.register_link(sword, "Owner", hero).expect("link back");
    graph.set_base_value(hero, "Strength", 10.0).expect("base write");
    graph.set_base_value(sword, "Damage", 6.0).expect("base write");
    graph
        .add_modifier(sword, "sword", flat(3.0), "Strength", path(["Owner"]))
        .expect("sword buffs owner");
    graph.add_tag(sword, "Sharp").expect("tag");
    assert_eq!(graph.value(hero, "Strength"), 13.0);

    let (on_sword, sword_events) = recorder();
    graph.subscribe(sword, "Damage", sword_events).expect("subscribe");
    let (via_link, hero_events) = recorder();
    graph
        .subscribe(hero, AttributeRef::remote("Damage", ["MainHand"]), hero_events)
        .expect("subscribe");

    graph.remove_processor(sword).expect("remove");

    assert!(!graph.contains_processor(sword));
    assert_eq!(graph.value(hero, "Strength"), 10.0);
    assert_eq!(graph.resolve_path(hero, &path(["MainHand"])), None);
    assert_eq!(
        *on_sword.borrow(),
        vec![AttributeEvent::Changed(6.0), AttributeEvent::Removed]
    );
    assert_eq!(
        *via_link.borrow(),
        vec![AttributeEvent::Changed(6.0), AttributeEvent::Changed(0.0)]
    );
    assert_eq!(graph.subscription_count(), 1);

    assert_eq!(
        graph.remove_processor(sword),
        Err(GraphError::UnknownProcessor(sword))
    );
}

#[test]
fn definitions_are_built_through_the_registry() {
    let mut graph = AttributeGraph::new();
    let hero = graph.create_processor("hero");
    let cloak = graph.create_processor("cloak");
    graph.register_link(cloak, "Owner", hero).expect("link");
    graph.set_base_value(hero, "Agility", 10.0).expect("base write");
    graph.set_base_value(cloak, "Evasion", 1.0).expect("base write");

    let definition = ModifierDefinition {
        target: "Evasion".into(),
        path: LinkPath::new(),
        source: "cloak".into(),
        priority: 0,
        kind: CombinationKind::Additive,
        logic: "Linear".into(),
        arguments: vec![
            ArgumentDefinition::new("intercept", 2.0),
            ArgumentDefinition::new("input", ValueSource::remote("Agility", ["Owner"])),
            ArgumentDefinition::new("slope", 0.5),
        ],
    };
    graph.add_definition(cloak, &definition).expect("linear is built in");
    assert_eq!(graph.value(cloak, "Evasion"), 8.0);

    // Unknown logic degrades to a neutral modifier instead of failing
    let unknown = ModifierDefinition {
        logic: "teleport".into(),
        ..definition.clone()
    };
    assert_eq!(
        graph.registry().instantiate(&unknown).map(|_| ()),
        Err(GraphError::UnknownModifierType("teleport".into()))
    );
    let neutral = graph.add_definition(cloak, &unknown).expect("degrades");
    assert!(graph.has_modifier(neutral));
    assert_eq!(graph.value(cloak, "Evasion"), 8.0);

    // A registry without the built-ins degrades even "linear"
    let mut bare = AttributeGraph::new().with_registry(ModifierRegistry::new());
    let p = bare.create_processor("p");
    bare.set_base_value(p, "Evasion", 1.0).expect("base write");
    bare.add_definition(p, &definition).expect("degrades");
    assert_eq!(bare.value(p, "Evasion"), 1.0);
}

#[test]
fn runaway_modifier_loops_are_bounded() {
    let config = GraphConfig::new().with_max_recompute_passes(8);
    let mut graph = AttributeGraph::with_config(config);
    let p = graph.create_processor("p");
    graph.set_base_value(p, "A", 1.0).expect("base write");
    graph.set_base_value(p, "B", 1.0).expect("base write");

    graph
        .add_modifier(
            p,
            "loop",
            ModifierInstance::scaled(CombinationKind::Additive, ValueSource::local("B"), 1.0),
            "A",
            LinkPath::new(),
        )
        .expect("A depends on B");
    graph
        .add_modifier(
            p,
            "loop",
            ModifierInstance::scaled(CombinationKind::Additive, ValueSource::local("A"), 1.0),
            "B",
            LinkPath::new(),
        )
        .expect("B depends on A");

    assert!(graph.value(p, "A").is_finite());
    assert!(graph.value(p, "B").is_finite());

    // Removing one side settles the other
    assert_eq!(graph.remove_modifiers_by_source(p, "loop"), 2);
    assert_eq!(graph.value(p, "A"), 1.0);
    assert_eq!(graph.value(p, "B"), 1.0);
}

#[test]
fn wide_fan_in_settles_in_one_call() {
    let mut graph = AttributeGraph::new();
    let hero = graph.create_processor("hero");
    graph.set_base_value(hero, "Strength", 1.0).expect("base write");

    // More inputs than the default per-flush recompute budget
    let slots = GraphConfig::DEFAULT_MAX_RECOMPUTE_PASSES as usize + 6;
    for i in 0..slots {
        let slot = format!("Slot{i}");
        let item = graph.create_processor(slot.clone());
        graph.register_link(item, "Owner", hero).expect("owner link");
        graph.register_link(hero, slot.as_str(), item).expect("slot link");
        graph
            .add_modifier(
                item,
                "item",
                ModifierInstance::scaled(
                    CombinationKind::Additive,
                    ValueSource::remote("Strength", ["Owner"]),
                    1.0,
                ),
                "Armor",
                LinkPath::new(),
            )
            .expect("armor from owner");
        graph
            .add_modifier(
                hero,
                "gear",
                ModifierInstance::scaled(
                    CombinationKind::Additive,
                    ValueSource::remote("Armor", [slot.as_str()]),
                    1.0,
                ),
                "TotalArmor",
                LinkPath::new(),
            )
            .expect("sum slot armor");
    }
    assert_eq!(graph.value(hero, "TotalArmor"), slots as f64);

    graph.set_base_value(hero, "Strength", 2.0).expect("base write");
    assert_eq!(graph.value(hero, "TotalArmor"), 2.0 * slots as f64);
}
