//! System lifecycle: ordered groups of systems run once per frame.

use crate::filter::FilterHandle;
use crate::registry::Component;
use crate::world::World;

/// A unit of per-frame logic over a [`World`]. Every method has a no-op
/// default; a system overrides only the lifecycle stages it needs, mirroring
/// the teacher crate's own dispatcher-building convention of "only pay for
/// what you implement".
#[allow(unused_variables)]
pub trait System {
    /// Runs once, before any system's [`System::init`], in registration
    /// order. Intended for systems that need to see every other system's
    /// `pre_init` side effects before committing their own state (building a
    /// shared filter, for instance) -- see §6 of the design.
    fn pre_init(&mut self, world: &mut World) {}

    /// Runs once, after every system's `pre_init` has completed, in
    /// registration order.
    fn init(&mut self, world: &mut World) {}

    /// Runs every frame, in registration order.
    fn run(&mut self, world: &mut World) {}

    /// Runs once when the owning [`SystemGroup`] is destroyed, in reverse
    /// registration order (mirroring typical teardown ordering: the last
    /// system to start is the first to unwind).
    fn destroy(&mut self, world: &mut World) {}

    /// Runs once after every system's `destroy` has completed, still in
    /// reverse registration order. Intended for teardown that depends on
    /// another system having already released its own state (releasing a
    /// shared resource only the last system still held a filter on, say).
    fn post_destroy(&mut self, world: &mut World) {}
}

/// An ordered collection of systems sharing one lifecycle: `pre_init`/`init`
/// run once at `SystemGroup::init`, `run` fires once per `SystemGroup::run`
/// call, and `destroy` tears down in reverse order.
pub struct SystemGroup {
    systems: Vec<Box<dyn System>>,
    initialized: bool,
}

impl SystemGroup {
    pub fn new() -> Self {
        SystemGroup {
            systems: Vec::new(),
            initialized: false,
        }
    }

    /// Appends a system. Returns `self` for chaining, matching the builder
    /// style the rest of this crate's construction APIs use.
    pub fn add(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn init(&mut self, world: &mut World) {
        if self.initialized {
            return;
        }
        for system in &mut self.systems {
            system.pre_init(world);
        }
        for system in &mut self.systems {
            system.init(world);
        }
        self.initialized = true;
        log::debug!("system group initialized with {} systems", self.systems.len());
    }

    pub fn run(&mut self, world: &mut World) {
        for system in &mut self.systems {
            system.run(world);
        }
    }

    pub fn destroy(&mut self, world: &mut World) {
        for system in self.systems.iter_mut().rev() {
            system.destroy(world);
        }
        for system in self.systems.iter_mut().rev() {
            system.post_destroy(world);
        }
        self.initialized = false;
        world.notify_systems_destroyed();
    }
}

impl Default for SystemGroup {
    fn default() -> Self {
        SystemGroup::new()
    }
}

/// A pseudo-system that detaches `T` from every entity carrying it at the
/// end of a frame, for single-frame event/flag components (§6 "one-frame
/// components"). Add it to a [`SystemGroup`] after the systems that read
/// `T`.
pub struct OneFrameCleanup<T: Component> {
    filter: Option<FilterHandle>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Component> OneFrameCleanup<T> {
    pub fn new() -> Self {
        OneFrameCleanup {
            filter: None,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Component> Default for OneFrameCleanup<T> {
    fn default() -> Self {
        OneFrameCleanup::new()
    }
}

impl<T: Component> System for OneFrameCleanup<T> {
    fn init(&mut self, world: &mut World) {
        self.filter = Some(world.filter_builder().include::<T>().build());
    }

    fn run(&mut self, world: &mut World) {
        let handle = self.filter.expect("OneFrameCleanup::init must run first");
        let entities = world.collect_filter(handle);
        for entity in entities {
            entity.del::<T>();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        log: std::rc::Rc<std::cell::RefCell<Vec<&'static str>>>,
        tag: &'static str,
    }

    impl System for Recorder {
        fn pre_init(&mut self, _world: &mut World) {
            self.log.borrow_mut().push("pre_init");
        }
        fn init(&mut self, _world: &mut World) {
            self.log.borrow_mut().push("init");
        }
        fn run(&mut self, _world: &mut World) {
            self.log.borrow_mut().push(self.tag);
        }
        fn destroy(&mut self, _world: &mut World) {
            self.log.borrow_mut().push("destroy");
        }
    }

    #[test]
    fn lifecycle_runs_in_declared_then_reverse_order() {
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut world = World::new();
        let mut group = SystemGroup::new()
            .add(Recorder {
                log: log.clone(),
                tag: "run-a",
            })
            .add(Recorder {
                log: log.clone(),
                tag: "run-b",
            });
        group.init(&mut world);
        group.run(&mut world);
        group.destroy(&mut world);

        let events = log.borrow();
        assert_eq!(
            events.as_slice(),
            &[
                "pre_init", "pre_init", "init", "init", "run-a", "run-b", "destroy", "destroy",
            ]
        );
    }

    #[derive(Default, Clone)]
    struct Hit;
    impl Component for Hit {}

    #[test]
    fn one_frame_cleanup_detaches_after_run() {
        let mut world = World::new();
        let e = world.new_entity();
        e.replace(Hit);
        assert!(e.has::<Hit>());

        let mut group = SystemGroup::new().add(OneFrameCleanup::<Hit>::new());
        group.init(&mut world);
        group.run(&mut world);
        assert!(!e.has::<Hit>(), "Hit should be stripped after one run");
    }
}
