use stats_core::{
    AttributeGraph, BundleSpec, CombinationKind, Condition, GraphError, LinkPath, ModifierInstance,
    ModifierSpec, StatBlock, ValueSource, path,
};

fn flat(amount: f64) -> ModifierInstance {
    ModifierInstance::constant(CombinationKind::Additive, amount)
}

fn here() -> LinkPath {
    LinkPath::new()
}

#[test]
fn base_value_is_visible_immediately() {
    let mut graph = AttributeGraph::new();
    let hero = graph.create_processor("hero");

    graph
        .set_base_value(hero, "Strength", 12.5)
        .expect("write to a fresh key should succeed");

    let strength = graph
        .get_or_create(hero, "Strength", 0.0)
        .expect("attribute should exist");
    assert_eq!(strength.base(), 12.5);
    assert_eq!(strength.value(), 12.5);
}

#[test]
fn pointer_cycle_is_rejected_without_side_effects() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");
    graph.set_base_value(p, "B", 3.0).expect("base write");

    graph
        .set_pointer(p, "A", "B", here())
        .expect("A -> B should be accepted");
    let error = graph
        .set_pointer(p, "B", "A", here())
        .expect_err("B -> A closes a cycle");

    assert!(matches!(error, GraphError::CircularPointer { .. }));
    assert_eq!(graph.value(p, "A"), 3.0);

    let processor = graph.processor(p).expect("processor exists");
    assert!(!processor.is_pointer("B"));
    assert_eq!(processor.attribute("B").map(|a| a.base()), Some(3.0));
}

#[test]
fn self_pointer_is_rejected() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");
    graph.set_base_value(p, "A", 4.0).expect("base write");

    let error = graph
        .set_pointer(p, "A", "A", here())
        .expect_err("self pointer must fail");

    assert!(matches!(error, GraphError::SelfReference { .. }));
    assert_eq!(graph.value(p, "A"), 4.0);
    assert!(!graph.processor(p).expect("processor exists").is_pointer("A"));
}

#[test]
fn diamond_aliases_share_one_attribute() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");
    graph.set_base_value(p, "T", 10.0).expect("base write");
    graph.set_pointer(p, "A", "T", here()).expect("A -> T");
    graph.set_pointer(p, "B", "T", here()).expect("B -> T");

    graph.set_base_value(p, "T", 20.0).expect("base write");
    for key in ["A", "B", "T"] {
        assert_eq!(graph.value(p, key), 20.0, "{key} after writing T");
    }

    // Writing through an alias lands on the target
    graph.set_base_value(p, "A", 30.0).expect("forwarded write");
    for key in ["A", "B", "T"] {
        assert_eq!(graph.value(p, key), 30.0, "{key} after writing A");
    }

    // So does a modifier added through an alias
    graph
        .add_modifier(p, "buff", flat(5.0), "B", here())
        .expect("modifier on alias");
    for key in ["A", "B", "T"] {
        assert_eq!(graph.value(p, key), 35.0, "{key} after modifying B");
    }
}

#[test]
fn retargeting_mid_chain_reaches_the_head() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");
    graph.set_base_value(p, "D", 10.0).expect("base write");
    graph.set_base_value(p, "E", 999.0).expect("base write");
    graph.set_pointer(p, "C", "D", here()).expect("C -> D");
    graph.set_pointer(p, "B", "C", here()).expect("B -> C");
    graph.set_pointer(p, "A", "B", here()).expect("A -> B");
    assert_eq!(graph.value(p, "A"), 10.0);

    graph.set_pointer(p, "B", "E", here()).expect("B -> E");

    assert_eq!(graph.value(p, "A"), 999.0);
    assert_eq!(graph.value(p, "C"), 10.0);
}

#[test]
fn removing_a_mid_chain_pointer_breaks_forwarding() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");
    graph.set_base_value(p, "C", 7.0).expect("base write");
    graph.set_pointer(p, "B", "C", here()).expect("B -> C");
    graph.set_pointer(p, "A", "B", here()).expect("A -> B");
    assert_eq!(graph.value(p, "A"), 7.0);

    assert!(graph.remove_pointer(p, "B"));
    assert_eq!(graph.value(p, "A"), 0.0);

    graph.set_base_value(p, "B", 50.0).expect("B is independent again");
    assert_eq!(graph.value(p, "A"), 50.0);
    assert_eq!(graph.value(p, "C"), 7.0);
}

#[test]
fn late_link_activates_remote_modifier() {
    let mut graph = AttributeGraph::new();
    let hero = graph.create_processor("hero");
    let sword = graph.create_processor("sword");
    graph.set_base_value(sword, "Damage", 10.0).expect("base write");

    let scaling = ModifierInstance::scaled(
        CombinationKind::Additive,
        ValueSource::remote("Strength", ["Owner"]),
        1.0,
    );
    graph
        .add_modifier(sword, "sword", scaling, "Damage", here())
        .expect("modifier registers before the link exists");
    assert_eq!(graph.value(sword, "Damage"), 10.0);

    graph.set_base_value(hero, "Strength", 5.0).expect("base write");
    graph
        .register_link(sword, "Owner", hero)
        .expect("link registration");

    assert_eq!(graph.value(sword, "Damage"), 15.0);

    // And it keeps tracking the owner's value
    graph.set_base_value(hero, "Strength", 8.0).expect("base write");
    assert_eq!(graph.value(sword, "Damage"), 18.0);
}

#[test]
fn tags_are_reference_counted() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");

    graph.add_tag(p, "Burning").expect("first add");
    graph.add_tag(p, "Burning").expect("second add");
    assert!(graph.remove_tag(p, "Burning"));
    assert!(graph.has_tag(p, "Burning"));
    assert_eq!(graph.tag_count(p, "Burning"), 1);

    assert!(graph.remove_tag(p, "Burning"));
    assert!(!graph.has_tag(p, "Burning"));
    assert_eq!(graph.tag_count(p, "Burning"), 0);
    assert!(!graph.remove_tag(p, "Burning"));
}

#[test]
fn conditional_bundle_toggles_without_accumulating() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");
    graph.set_base_value(p, "S", 0.0).expect("base write");

    let block = StatBlock::new(
        "rage",
        Condition::has_tag("X"),
        BundleSpec::new().modifier(ModifierSpec::local("S", flat(5.0))),
    );
    let block = graph.attach_stat_block(p, block).expect("attach");
    assert_eq!(graph.value(p, "S"), 0.0);
    assert!(!graph.stat_block_active(block));

    for _ in 0..4 {
        graph.add_tag(p, "X").expect("tag");
        assert_eq!(graph.value(p, "S"), 5.0);
        assert!(graph.stat_block_active(block));
        assert_eq!(graph.get(p, "S").map(|a| a.modifier_count()), Some(1));

        assert!(graph.remove_tag(p, "X"));
        assert_eq!(graph.value(p, "S"), 0.0);
        assert_eq!(graph.get(p, "S").map(|a| a.modifier_count()), Some(0));
    }
    assert!(graph.modifiers_from("rage").is_empty());
}

#[test]
fn swapping_a_link_moves_remote_modifiers() {
    let mut graph = AttributeGraph::new();
    let first = graph.create_processor("first");
    let second = graph.create_processor("second");
    let ring = graph.create_processor("ring");
    graph.set_base_value(first, "Strength", 10.0).expect("base write");
    graph.register_link(ring, "Owner", first).expect("link");

    let id = graph
        .add_modifier(ring, "ring", flat(7.0), "Strength", path(["Owner"]))
        .expect("remote modifier");
    assert_eq!(graph.value(first, "Strength"), 17.0);

    graph.register_link(ring, "Owner", second).expect("relink");

    assert_eq!(graph.value(first, "Strength"), 10.0);
    assert_eq!(graph.get(first, "Strength").map(|a| a.modifier_count()), Some(0));
    assert_eq!(graph.value(second, "Strength"), 7.0);
    assert_eq!(
        graph.modifier_target(id).map(|a| a.processor),
        Some(second)
    );

    // Unlinking leaves it registered but unattached
    assert_eq!(graph.unregister_link(ring, "Owner"), Some(second));
    assert_eq!(graph.value(second, "Strength"), 0.0);
    assert!(graph.has_modifier(id));
    assert!(graph.modifier_target(id).is_none());
}
