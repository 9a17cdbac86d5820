use ecs_kernel::{Component, World};

#[derive(Default, Clone, PartialEq, Debug)]
struct A(i32);
impl Component for A {}

#[derive(Default, Clone, PartialEq, Debug)]
struct B(i32);
impl Component for B {}

#[derive(Default, Clone, PartialEq, Debug)]
struct C(i32);
impl Component for C {}

#[test]
fn attach_detach_refilters() {
    let mut world = World::new();
    let e1 = world.new_entity();
    e1.replace(A(1));

    let f = world
        .filter_builder()
        .include::<A>()
        .exclude::<B>()
        .build();

    assert_eq!(world.collect_filter(f), vec![e1]);

    e1.replace(B(1));
    assert!(world.collect_filter(f).is_empty());

    e1.del::<B>();
    assert_eq!(world.collect_filter(f), vec![e1]);
}

#[test]
fn generation_guards_stale_handles() {
    let mut world = World::new();
    let e1 = world.new_entity();
    e1.replace(A(1));
    e1.destroy();

    let e2 = world.new_entity();
    e2.replace(A(2));

    assert!(!e1.is_alive());
    assert!(e2.is_alive());
    assert_ne!(e1, e2);
}

#[test]
fn deferred_mutation_during_iteration() {
    let mut world = World::new();
    let e1 = world.new_entity();
    e1.replace(A(1));
    let e2 = world.new_entity();
    e2.replace(A(2));
    let e3 = world.new_entity();
    e3.replace(A(3));

    let f = world.filter_builder().include::<A>().build();

    let mut seen = Vec::new();
    {
        let mut iter = world.iter(f);
        while let Some(entity) = iter.next() {
            seen.push(entity);
            if entity == e2 {
                entity.del::<A>();
            }
        }
    }
    assert_eq!(seen, vec![e1, e2, e3]);
    assert_eq!(world.collect_filter(f), vec![e1, e3]);
}

#[test]
fn move_to_merges_and_destroys_source() {
    let mut world = World::new();
    let e1 = world.new_entity();
    e1.replace(A(1));
    e1.replace(B(10));
    let e2 = world.new_entity();
    e2.replace(B(20));
    e2.replace(C(2));

    e1.move_to(e2);

    assert!(!e1.is_alive());
    assert_eq!(*e2.get::<A>(), A(1));
    assert_eq!(*e2.get::<B>(), B(10));
    assert_eq!(*e2.get::<C>(), C(2));
}

#[test]
fn copy_duplicates_values_independently() {
    let mut world = World::new();
    let e1 = world.new_entity();
    e1.replace(A(1));
    e1.replace(B(2));

    let e2 = e1.copy();

    assert_eq!(*e2.get::<A>(), A(1));
    assert_eq!(*e2.get::<B>(), B(2));

    e2.replace(A(99));
    assert_eq!(*e1.get::<A>(), A(1));
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "different declared order")]
fn declaring_same_filter_with_different_order_panics_in_debug() {
    let mut world = World::new();
    world.filter_builder().include::<A>().include::<B>().build();
    world.filter_builder().include::<B>().include::<A>().build();
}
