use std::cell::RefCell;
use std::rc::Rc;

use stats_core::{
    AttributeGraph, BundleSpec, ComparisonOp, Condition, StatBlock, ValueSource,
};

fn recorder() -> (Rc<RefCell<Vec<bool>>>, impl FnMut(bool) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |value| sink.borrow_mut().push(value))
}

#[test]
fn listeners_see_distinct_values_only() {
    let mut graph = AttributeGraph::new();
    let hero = graph.create_processor("hero");
    graph.set_base_value(hero, "Health", 20.0).expect("base write");

    let low = graph
        .observe_condition(
            hero,
            &Condition::compare(ValueSource::local("Health"), ComparisonOp::Less, 10.0),
        )
        .expect("observe");
    let (seen, listener) = recorder();
    assert!(graph.on_condition_change(low, listener));

    for health in [15.0, 5.0, 3.0, 12.0, 11.0] {
        graph.set_base_value(hero, "Health", health).expect("base write");
    }

    assert_eq!(*seen.borrow(), vec![false, true, false]);
    assert_eq!(graph.condition_met(low), Some(false));
}

#[test]
fn equality_honors_tolerance() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");
    graph.set_base_value(p, "Charge", 0.98).expect("base write");

    let full = graph
        .observe_condition(
            p,
            &Condition::compare(ValueSource::local("Charge"), ComparisonOp::Equal, 1.0)
                .with_tolerance(0.05),
        )
        .expect("observe");
    assert_eq!(graph.condition_met(full), Some(true));

    graph.set_base_value(p, "Charge", 0.9).expect("base write");
    assert_eq!(graph.condition_met(full), Some(false));
}

#[test]
fn unresolved_comparison_is_false_until_linked() {
    let mut graph = AttributeGraph::new();
    let hero = graph.create_processor("hero");
    let guild = graph.create_processor("guild");

    let ranked = graph
        .observe_condition(
            hero,
            &Condition::compare(
                ValueSource::remote("Level", ["Guild"]),
                ComparisonOp::GreaterOrEqual,
                0.0,
            ),
        )
        .expect("observe");
    assert_eq!(graph.condition_met(ranked), Some(false));

    graph.register_link(hero, "Guild", guild).expect("join");
    assert_eq!(graph.condition_met(ranked), Some(true));

    graph.unregister_link(hero, "Guild");
    assert_eq!(graph.condition_met(ranked), Some(false));
}

#[test]
fn inverted_tag_on_unresolved_path_is_false() {
    let mut graph = AttributeGraph::new();
    let sword = graph.create_processor("sword");
    let hero = graph.create_processor("hero");

    let calm_owner = graph
        .observe_condition(
            sword,
            &Condition::Tag {
                tag: "Enraged".into(),
                path: stats_core::path(["Owner"]),
                invert: true,
            },
        )
        .expect("observe");
    assert_eq!(graph.condition_met(calm_owner), Some(false));

    graph.register_link(sword, "Owner", hero).expect("equip");
    assert_eq!(graph.condition_met(calm_owner), Some(true));

    graph.add_tag(hero, "Enraged").expect("tag");
    assert_eq!(graph.condition_met(calm_owner), Some(false));
}

#[test]
fn composites_combine_live_children() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");

    let empty_all = graph.observe_condition(p, &Condition::all([])).expect("observe");
    let empty_any = graph.observe_condition(p, &Condition::any([])).expect("observe");
    assert_eq!(graph.condition_met(empty_all), Some(true));
    assert_eq!(graph.condition_met(empty_any), Some(true));

    let both = graph
        .observe_condition(
            p,
            &Condition::all([Condition::has_tag("A"), Condition::has_tag("B")]),
        )
        .expect("observe");
    let either = graph
        .observe_condition(
            p,
            &Condition::any([Condition::has_tag("A"), Condition::has_tag("B")]),
        )
        .expect("observe");
    assert_eq!(graph.condition_met(both), Some(false));
    assert_eq!(graph.condition_met(either), Some(false));

    graph.add_tag(p, "A").expect("tag");
    assert_eq!(graph.condition_met(both), Some(false));
    assert_eq!(graph.condition_met(either), Some(true));

    graph.add_tag(p, "B").expect("tag");
    assert_eq!(graph.condition_met(both), Some(true));
}

#[test]
fn release_stops_observation() {
    let mut graph = AttributeGraph::new();
    let p = graph.create_processor("p");

    let tagged = graph
        .observe_condition(p, &Condition::has_tag("A"))
        .expect("observe");
    let (seen, listener) = recorder();
    graph.on_condition_change(tagged, listener);

    assert!(graph.release_condition(tagged));
    assert!(!graph.release_condition(tagged));
    assert_eq!(graph.condition_met(tagged), None);

    graph.add_tag(p, "A").expect("tag");
    assert_eq!(*seen.borrow(), vec![false]);

    // A stat block's condition belongs to the block
    let block = graph
        .attach_stat_block(p, StatBlock::new("b", Condition::has_tag("A"), BundleSpec::new()))
        .expect("attach");
    let owned = graph.stat_block_condition(block).expect("block condition");
    assert!(!graph.release_condition(owned));
    assert_eq!(graph.condition_met(owned), Some(true));
}
