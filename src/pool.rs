//! Per-type dense component storage.

use std::any::Any;

use crate::growable::GrowVec;
use crate::registry::Component;

/// Token returned by [`ComponentPool::add_resize_listener`]; pass it back to
/// [`ComponentPool::remove_resize_listener`] to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

/// A dense, pool-backed array of `T` values addressed by index, with a
/// free-list of recycled slots.
///
/// Indices returned by [`ComponentPool::new_slot`] are **not** stable across
/// recycling: an index is only meaningful while the component it names
/// remains attached to its owning entity.
pub struct ComponentPool<T> {
    items: GrowVec<T>,
    free: GrowVec<u32>,
    reset: Option<fn(&mut T)>,
    listeners: Vec<(ListenerId, Box<dyn FnMut()>)>,
    next_listener: u32,
    resize_epoch: u32,
}

impl<T: Component + Default> ComponentPool<T> {
    pub fn new(initial_capacity: usize) -> Self {
        ComponentPool {
            items: GrowVec::with_capacity(initial_capacity),
            free: GrowVec::default(),
            reset: T::auto_reset(),
            listeners: Vec::new(),
            next_listener: 0,
            resize_epoch: 0,
        }
    }

    /// Allocates a slot, returning its index: a reserved (previously
    /// recycled) slot if one is available, otherwise a freshly appended one.
    ///
    /// The reset routine (if any) only runs on freshly appended slots --
    /// reserved slots were already reset when they were recycled.
    pub fn new_slot(&mut self) -> u32 {
        if let Some(idx) = self.free.pop() {
            return idx;
        }
        let idx = self.items.len() as u32;
        let grew = self.items.push(T::default());
        if let Some(reset) = self.reset {
            reset(self.items.get_mut(idx as usize));
        }
        if grew {
            self.resize_epoch = self.resize_epoch.wrapping_add(1);
            self.notify_resize();
        }
        idx
    }

    pub fn get(&self, index: u32) -> &T {
        self.items.get(index as usize)
    }

    pub fn get_mut(&mut self, index: u32) -> &mut T {
        self.items.get_mut(index as usize)
    }

    /// Resets (or zero-initializes) the slot and pushes it onto the
    /// free-list.
    pub fn recycle(&mut self, index: u32) {
        match self.reset {
            Some(reset) => reset(self.items.get_mut(index as usize)),
            None => *self.items.get_mut(index as usize) = T::default(),
        }
        self.free.push(index);
    }

    pub fn copy_data(&mut self, src: u32, dst: u32)
    where
        T: Clone,
    {
        let value = self.items.get(src as usize).clone();
        *self.items.get_mut(dst as usize) = value;
    }

    /// Monotonically increasing counter bumped every time the backing array
    /// grows. Not needed for correctness in this crate's access pattern
    /// (readers always go through `World -> pool -> index`, never a cached
    /// raw pointer), but exposed so tests can observe the resize contract
    /// described in the design (§4.6).
    pub fn resize_epoch(&self) -> u32 {
        self.resize_epoch
    }

    /// Registers `callback` to run every time this pool's backing array
    /// grows (§4.6), so a subscriber (a [`Filter`](crate::filter::Filter))
    /// can rebind anything it cached that the grow invalidated.
    pub fn add_resize_listener(&mut self, callback: Box<dyn FnMut()>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, callback));
        id
    }

    pub fn remove_resize_listener(&mut self, id: ListenerId) {
        if let Some(pos) = self.listeners.iter().position(|(l, _)| *l == id) {
            self.listeners.swap_remove(pos);
        }
    }

    fn notify_resize(&mut self) {
        for (_, callback) in &mut self.listeners {
            callback();
        }
        log::trace!(
            "component pool for {} resized, {} listeners notified",
            std::any::type_name::<T>(),
            self.listeners.len()
        );
    }
}

/// Object-safe facade over `ComponentPool<T>` so a [`World`](crate::world::World)
/// can store pools for heterogeneous component types behind `Box<dyn AnyPool>`,
/// recycling a slot without knowing `T` (needed when destroying an entity or
/// detaching a component generically, e.g. from reflection helpers).
pub(crate) trait AnyPool: Any {
    fn recycle_dyn(&mut self, index: u32);
    /// Type-erased unsubscribe, for a caller (`World::unsubscribe_resize`)
    /// that only has the [`TypeIndex`](crate::registry::TypeIndex), not the
    /// concrete component type.
    fn remove_resize_listener_dyn(&mut self, id: ListenerId);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component + Default> AnyPool for ComponentPool<T> {
    fn recycle_dyn(&mut self, index: u32) {
        self.recycle(index);
    }

    fn remove_resize_listener_dyn(&mut self, id: ListenerId) {
        self.remove_resize_listener(id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone, PartialEq, Debug)]
    struct Pos(f32, f32);
    impl Component for Pos {}

    #[test]
    fn new_slot_reuses_recycled_indices() {
        let mut pool: ComponentPool<Pos> = ComponentPool::new(2);
        let a = pool.new_slot();
        let b = pool.new_slot();
        assert_ne!(a, b);
        pool.recycle(a);
        let c = pool.new_slot();
        assert_eq!(a, c, "recycled slot should be reused before growing");
    }

    #[test]
    fn recycle_resets_value() {
        #[derive(Clone, Default)]
        struct Counter(u32);
        impl Component for Counter {
            fn auto_reset() -> Option<fn(&mut Self)> {
                Some(|c| c.0 = 7)
            }
        }
        let mut pool: ComponentPool<Counter> = ComponentPool::new(1);
        let idx = pool.new_slot();
        assert_eq!(pool.get(idx).0, 7, "fresh slot runs the reset routine");
        pool.get_mut(idx).0 = 99;
        pool.recycle(idx);
        assert_eq!(pool.get(idx).0, 7, "recycle runs the reset routine again");
    }

    #[test]
    fn growth_bumps_epoch_and_notifies() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut pool: ComponentPool<Pos> = ComponentPool::new(1);
        let hits = Rc::new(Cell::new(0u32));
        let hits_for_callback = hits.clone();
        let id = pool.add_resize_listener(Box::new(move || {
            hits_for_callback.set(hits_for_callback.get() + 1);
        }));
        pool.new_slot();
        let epoch_before = pool.resize_epoch();
        pool.new_slot(); // exceeds capacity 1, triggers grow
        assert!(pool.resize_epoch() > epoch_before);
        assert_eq!(hits.get(), 1, "listener should fire exactly once on grow");
        pool.remove_resize_listener(id);
        assert!(pool.listeners.is_empty());
    }
}
