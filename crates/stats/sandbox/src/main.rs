//! Scripted walkthrough of the attribute graph.
//!
//! Builds a hero and two weapons, equips and swaps them, and logs how values
//! follow links, pointers and conditional stat blocks.
//!
//! ```bash
//! RUST_LOG=stats=debug cargo run -p stats-sandbox
//! ```

use std::env;

use anyhow::Result;
use stats_core::{
    AttributeEvent, AttributeGraph, BundleSpec, CombinationKind, ComparisonOp, Condition,
    GraphConfig, LinkPath, ModifierInstance, ModifierSpec, ProcessorId, StatBlock, TagSpec,
    ValueSource, path,
};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    setup_logging();

    let config = config_from_env();
    info!(
        max_recompute_passes = config.max_recompute_passes,
        max_condition_toggles = config.max_condition_toggles,
        "Starting stats sandbox"
    );

    run(AttributeGraph::with_config(config))
}

fn setup_logging() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn config_from_env() -> GraphConfig {
    let mut config = GraphConfig::new();
    if let Some(passes) = read_env::<u32>("STATS_MAX_RECOMPUTE_PASSES") {
        config = config.with_max_recompute_passes(passes);
    }
    if let Some(toggles) = read_env::<u32>("STATS_MAX_CONDITION_TOGGLES") {
        config = config.with_max_condition_toggles(toggles);
    }
    config
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

/// Sword whose damage scales with its owner's strength.
fn forge(graph: &mut AttributeGraph, name: &str, damage: f64) -> Result<ProcessorId> {
    let weapon = graph.create_processor(name);
    graph.set_base_value(weapon, "Damage", damage)?;
    graph.add_modifier(
        weapon,
        name,
        ModifierInstance::scaled(
            CombinationKind::Additive,
            ValueSource::remote("Strength", ["Owner"]),
            0.5,
        ),
        "Damage",
        LinkPath::new(),
    )?;
    Ok(weapon)
}

fn report(graph: &AttributeGraph, hero: ProcessorId, step: &str) {
    info!(
        step,
        strength = graph.value(hero, "Strength"),
        weapon_damage = graph.value(hero, "WeaponDamage"),
        enraged = graph.has_tag(hero, "Enraged"),
        "Hero"
    );
}

fn run(mut graph: AttributeGraph) -> Result<()> {
    let hero = graph.create_processor("hero");
    graph.set_base_value(hero, "Strength", 10.0)?;
    graph.set_base_value(hero, "Health", 100.0)?;
    graph.set_pointer(hero, "WeaponDamage", "Damage", path(["MainHand"]))?;

    let subscription = graph.subscribe(hero, "WeaponDamage", |event| match event {
        AttributeEvent::Changed(value) => info!(value, "WeaponDamage changed"),
        AttributeEvent::Removed => info!("WeaponDamage source removed"),
    })?;

    let sword = forge(&mut graph, "sword", 6.0)?;
    let axe = forge(&mut graph, "axe", 11.0)?;
    report(&graph, hero, "unarmed");

    graph.register_link(hero, "MainHand", sword)?;
    graph.register_link(sword, "Owner", hero)?;
    report(&graph, hero, "sword equipped");

    // Enraged while wounded: strength up, and the tag is visible to gear
    let rage = StatBlock::new(
        "rage",
        Condition::compare(ValueSource::local("Health"), ComparisonOp::Less, 30.0),
        BundleSpec::new()
            .modifier(ModifierSpec::local(
                "Strength",
                ModifierInstance::constant(CombinationKind::Multiplicative, 1.5),
            ))
            .tag(TagSpec::local("Enraged")),
    );
    let rage = graph.attach_stat_block(hero, rage)?;

    graph.set_base_value(hero, "Health", 20.0)?;
    report(&graph, hero, "wounded");

    graph.unregister_link(sword, "Owner");
    graph.register_link(hero, "MainHand", axe)?;
    graph.register_link(axe, "Owner", hero)?;
    report(&graph, hero, "axe equipped");

    let bloodthirst = graph.attach_stat_block(
        axe,
        StatBlock::new(
            "bloodthirst",
            Condition::remote_tag("Enraged", ["Owner"]),
            BundleSpec::new().modifier(ModifierSpec::local(
                "Damage",
                ModifierInstance::constant(CombinationKind::Additive, 4.0),
            )),
        ),
    )?;
    info!(active = graph.stat_block_active(bloodthirst), "Bloodthirst attached");
    report(&graph, hero, "bloodthirst");

    graph.set_base_value(hero, "Health", 90.0)?;
    report(&graph, hero, "healed");

    graph.detach_stat_block(rage);
    graph.remove_processor(axe)?;
    report(&graph, hero, "axe destroyed");

    graph.unsubscribe(subscription);
    info!(processors = graph.processor_count(), "Done");
    Ok(())
}
