use ecs_kernel::{Component, World, WorldConfig};

#[derive(Default, Clone, PartialEq, Debug)]
struct Position(f32, f32);
impl Component for Position {}

#[derive(Default, Clone, PartialEq, Debug)]
struct Velocity(f32, f32);
impl Component for Velocity {}

/// A filter that includes `Position` subscribes to `Position`'s pool resize
/// notifications on construction (§4.2/§4.6); growing the pool past its
/// initial capacity should fire that subscription.
#[test]
fn filter_observes_its_included_pool_growing() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut config = WorldConfig::default();
    config.world_component_pools_cache = 1;
    let mut world = World::with_config(config);

    let f = world.filter_builder().include::<Position>().build();
    assert_eq!(world.filter(f).resize_notifications(), 0);

    let e1 = world.new_entity();
    e1.replace(Position(0.0, 0.0));
    let e2 = world.new_entity();
    e2.replace(Position(1.0, 1.0));
    let e3 = world.new_entity();
    e3.replace(Position(2.0, 2.0));

    assert!(
        world.filter(f).resize_notifications() > 0,
        "growing past the initial pool capacity should have notified the filter"
    );
    assert_eq!(world.collect_filter(f).len(), 3);
    assert_eq!(*e2.get::<Position>(), Position(1.0, 1.0));
}

/// A filter that never touches a given component type should not hear about
/// that type's pool growing.
#[test]
fn unrelated_pool_growth_does_not_notify() {
    let mut config = WorldConfig::default();
    config.world_component_pools_cache = 1;
    let mut world = World::with_config(config);

    let f = world.filter_builder().include::<Position>().build();

    let e1 = world.new_entity();
    e1.replace(Velocity(0.0, 0.0));
    let e2 = world.new_entity();
    e2.replace(Velocity(1.0, 1.0));

    assert_eq!(
        world.filter(f).resize_notifications(),
        0,
        "Velocity's pool growing should not notify a filter that never included it"
    );
}

/// Destroying the world unsubscribes every filter from its pools; this is
/// mostly a "doesn't panic or leak" check, since there is no observable
/// effect once the world itself is gone.
#[test]
fn world_destroy_unsubscribes_filters() {
    let mut world = World::new();
    world.filter_builder().include::<Position>().build();
    world.destroy();
}
