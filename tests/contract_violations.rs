#![cfg(debug_assertions)]

use ecs_kernel::{Component, World};

#[derive(Default, Clone)]
struct A(i32);
impl Component for A {}

#[test]
#[should_panic(expected = "invalid entity handle")]
fn foreign_world_handle_panics() {
    let mut world_a = World::new();
    let mut world_b = World::new();
    let e_a = world_a.new_entity();
    e_a.replace(A(1));
    let e_b = world_b.new_entity();
    e_b.replace(A(2));

    // `e_b` belongs to `world_b`; using it as the source of a move against
    // `world_a`'s entity crosses worlds, which the debug contract forbids.
    e_b.move_to(e_a);
}

#[test]
#[should_panic(expected = "operation on a destroyed world")]
fn double_destroy_panics() {
    let mut world = World::new();
    world.destroy();
    world.destroy();
}

#[test]
#[should_panic(expected = "different declared order")]
fn duplicate_filter_with_different_order_panics() {
    let mut world = World::new();
    #[derive(Default, Clone)]
    struct B(i32);
    impl Component for B {}

    world.filter_builder().include::<A>().include::<B>().build();
    world.filter_builder().include::<B>().include::<A>().build();
}
