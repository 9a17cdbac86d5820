use ecs_kernel::{Component, World};

#[derive(Default, Clone, PartialEq, Debug)]
struct A(i32);
impl Component for A {}

#[derive(Default, Clone, PartialEq, Debug)]
struct B(i32);
impl Component for B {}

/// Building a second filter while the first is mid-iteration (locked) is
/// permitted and safe: `get_or_create_filter`'s membership-seeding loop reads
/// `World::entities` directly and populates the *new* filter only, so it
/// cannot re-enter or perturb the locked filter's own state.
#[test]
fn filter_constructed_during_another_filters_iteration() {
    let mut world = World::new();
    let e1 = world.new_entity();
    e1.replace(A(1));
    let e2 = world.new_entity();
    e2.replace(A(2));
    e2.replace(B(20));
    let e3 = world.new_entity();
    e3.replace(A(3));

    let only_a = world.filter_builder().include::<A>().build();

    let mut seen = Vec::new();
    let mut nested_handle = None;
    {
        let mut iter = world.iter(only_a);
        while let Some(entity) = iter.next() {
            seen.push(entity);
            if entity == e2 && nested_handle.is_none() {
                // Construct a brand-new filter while `only_a`'s iterator is
                // still locked.
                nested_handle = Some(
                    world
                        .filter_builder()
                        .include::<A>()
                        .include::<B>()
                        .build(),
                );
            }
        }
    }

    assert_eq!(seen, vec![e1, e2, e3], "the locked filter's walk is undisturbed");

    let nested = nested_handle.expect("nested filter should have been built mid-iteration");
    assert_eq!(
        world.collect_filter(nested),
        vec![e2],
        "the new filter should be seeded correctly from existing entities"
    );

    // The original filter keeps working correctly after the nested
    // construction and the outer iterator's drop.
    assert_eq!(world.collect_filter(only_a), vec![e1, e2, e3]);

    e2.del::<B>();
    assert!(world.collect_filter(nested).is_empty());
}
