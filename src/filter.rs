//! Filters: incrementally maintained indexes of entities matching a fixed
//! include/exclude set of component types.

use std::cell::Cell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::entity::Entity;
use crate::error::{contract_violation, InvalidFilter, LockUnderflow};
use crate::growable::GrowVec;
use crate::pool::ListenerId;
use crate::registry::{type_index, Component, TypeIndex, TypeMeta};
use crate::world::World;

/// Opaque handle to a filter owned by a [`World`](crate::world::World).
/// Two filters built from the same include/exclude sets (regardless of
/// declared order) resolve to the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterHandle(pub(crate) usize);

#[derive(Debug)]
pub(crate) enum DeferredOp {
    Add(Entity),
    Remove(Entity),
}

/// An index of entities whose attached components satisfy a fixed
/// include/exclude query, with per-entity cached pool indices for O(1)
/// access from an active iteration.
pub struct Filter {
    pub(crate) include: Vec<TypeIndex>,
    pub(crate) exclude: Vec<TypeIndex>,
    /// `get_k_slot[i]` is `Some(k)` if `include[i]` is cached in
    /// `get_k[k]`, or `None` if that type is `ignore-in-filter`.
    get_k_slot: Vec<Option<usize>>,
    get_k: Vec<GrowVec<u32>>,
    entities: GrowVec<Entity>,
    entities_map: AHashMap<u32, u32>,
    lock_count: u32,
    deferred: Vec<DeferredOp>,
    /// Per-include-type resize-listener subscriptions, unsubscribed on
    /// [`Filter::destroy`] (§4.2/§4.6).
    subscriptions: Vec<(TypeIndex, ListenerId)>,
    /// Bumped by a subscription's callback every time one of this filter's
    /// included pools grows; exposed only for tests to observe that the
    /// subscribe/notify contract actually fires.
    resize_notifications: Rc<Cell<u32>>,
}

impl Filter {
    pub(crate) fn new(
        include: Vec<TypeIndex>,
        exclude: Vec<TypeIndex>,
        ignore_in_filter: &[bool],
        initial_capacity: usize,
        subscriptions: Vec<(TypeIndex, ListenerId)>,
        resize_notifications: Rc<Cell<u32>>,
    ) -> Self {
        let mut get_k_slot = Vec::with_capacity(include.len());
        let mut get_k = Vec::new();
        for &ignored in ignore_in_filter {
            if ignored {
                get_k_slot.push(None);
            } else {
                get_k_slot.push(Some(get_k.len()));
                get_k.push(GrowVec::with_capacity(initial_capacity));
            }
        }
        Filter {
            include,
            exclude,
            get_k_slot,
            get_k,
            entities: GrowVec::with_capacity(initial_capacity),
            entities_map: AHashMap::default(),
            lock_count: 0,
            deferred: Vec::new(),
            subscriptions,
            resize_notifications,
        }
    }

    /// Unsubscribes from every pool this filter registered a resize listener
    /// with. Called once, by [`World::destroy`](crate::world::World::destroy).
    pub(crate) fn destroy(&mut self, world: &mut World) {
        for (ti, id) in self.subscriptions.drain(..) {
            world.unsubscribe_resize(ti, id);
        }
    }

    /// Number of times one of this filter's included pools has grown since
    /// construction.
    pub fn resize_notifications(&self) -> u32 {
        self.resize_notifications.get()
    }

    pub fn include(&self) -> &[TypeIndex] {
        &self.include
    }

    pub fn exclude(&self) -> &[TypeIndex] {
        &self.exclude
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities_map.contains_key(&entity.id())
    }

    pub(crate) fn entity_at(&self, pos: usize) -> Entity {
        *self.entities.get(pos)
    }

    /// Returns the cached pool index of the `k`-th included component
    /// (`include()[k]`) for the entity at position `pos`. Calling this for a
    /// component type declared `ignore-in-filter` is a contract violation
    /// (§7): such a type is never cached, so there is nothing to return.
    pub(crate) fn pool_index_at(&self, k: usize, pos: usize) -> u32 {
        match self.get_k_slot[k] {
            Some(slot) => *self.get_k[slot].get(pos),
            None => {
                contract_violation!(InvalidFilter {
                    reason: "get_k on an ignore-in-filter component",
                });
                u32::MAX
            }
        }
    }

    pub(crate) fn position_of_include(&self, type_index: TypeIndex) -> Option<usize> {
        self.include.iter().position(|&t| t == type_index)
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.lock_count > 0
    }

    pub(crate) fn lock(&mut self) {
        self.lock_count += 1;
    }

    /// Decrements the lock counter and, if it has reached zero, returns the
    /// deferred operations to be replayed by the caller (the world, which
    /// has the context needed to look the entities' live component lists
    /// back up).
    pub(crate) fn unlock(&mut self) -> Option<Vec<DeferredOp>> {
        if self.lock_count == 0 {
            contract_violation!(LockUnderflow {});
            return None;
        }
        self.lock_count -= 1;
        if self.lock_count == 0 && !self.deferred.is_empty() {
            Some(std::mem::take(&mut self.deferred))
        } else {
            None
        }
    }

    pub(crate) fn push_deferred(&mut self, op: DeferredOp) {
        self.deferred.push(op);
    }

    /// Adds `entity` at a fresh position, capturing the pool index of each
    /// non-ignored included type from `components` (the entity's current
    /// `[type_index, pool_index, ...]` pairs). No-op if already a member.
    pub(crate) fn add_entity(&mut self, entity: Entity, components: &[u32]) {
        if self.entities_map.contains_key(&entity.id()) {
            return;
        }
        let pos = self.entities.len();
        self.entities.push(entity);
        self.entities_map.insert(entity.id(), pos as u32);
        for (i, &ti) in self.include.iter().enumerate() {
            let Some(slot) = self.get_k_slot[i] else {
                continue;
            };
            let pool_index = components
                .chunks_exact(2)
                .find(|pair| pair[0] == ti)
                .map(|pair| pair[1])
                .expect("entity must have the included component to be added to the filter");
            self.get_k[slot].push(pool_index);
        }
    }

    /// Removes `entity` from the filter via swap-remove. No-op if not a
    /// member.
    pub(crate) fn remove_entity(&mut self, entity: Entity) {
        let Some(pos) = self.entities_map.remove(&entity.id()) else {
            return;
        };
        let pos = pos as usize;
        let last = self.entities.len() - 1;
        if pos != last {
            let moved = *self.entities.get(last);
            self.entities.set(pos, moved);
            self.entities_map.insert(moved.id(), pos as u32);
            for arr in &mut self.get_k {
                let moved_val = *arr.get(last);
                arr.set(pos, moved_val);
            }
        }
        self.entities.truncate(last);
        for arr in &mut self.get_k {
            arr.truncate(last);
        }
    }
}

/// Builds an include/exclude query and resolves it to a [`FilterHandle`],
/// reusing an existing filter with the same type sets if one exists.
pub struct FilterBuilder<'w> {
    world: &'w mut World,
    include: Vec<TypeIndex>,
    exclude: Vec<TypeIndex>,
    ignore_in_filter: Vec<bool>,
    /// Resize-listener subscriptions taken out eagerly by `include::<T>()`,
    /// since only that call site has the concrete `T` needed to reach
    /// `ComponentPool<T>::add_resize_listener`. If `build()` resolves to an
    /// already-existing filter, these are redundant and get unsubscribed
    /// immediately; otherwise they are handed to the new `Filter`.
    subscriptions: Vec<(TypeIndex, ListenerId)>,
    resize_notifications: Rc<Cell<u32>>,
}

impl<'w> FilterBuilder<'w> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        FilterBuilder {
            world,
            include: Vec::new(),
            exclude: Vec::new(),
            ignore_in_filter: Vec::new(),
            subscriptions: Vec::new(),
            resize_notifications: Rc::new(Cell::new(0)),
        }
    }

    pub fn include<T: Component>(mut self) -> Self {
        let ti = type_index::<T>();
        self.include.push(ti);
        self.ignore_in_filter.push(TypeMeta::of::<T>().ignore_in_filter);
        let notifications = self.resize_notifications.clone();
        let id = self.world.subscribe_resize::<T>(Box::new(move || {
            notifications.set(notifications.get() + 1);
        }));
        self.subscriptions.push((ti, id));
        self
    }

    pub fn exclude<T: Component>(mut self) -> Self {
        self.exclude.push(type_index::<T>());
        self
    }

    pub fn build(self) -> FilterHandle {
        self.world.get_or_create_filter(
            self.include,
            self.exclude,
            self.ignore_in_filter,
            self.subscriptions,
            self.resize_notifications,
        )
    }
}

/// A locked, safe-to-mutate-during iteration walk over a filter's current
/// membership. Locking the filter for the iterator's lifetime defers any
/// structural change (an add/remove caused by code run between `next()`
/// calls) until the iterator is dropped, per §4.7.
pub struct FilterIter {
    world: *mut World,
    handle: FilterHandle,
    pos: usize,
    len: usize,
}

impl FilterIter {
    pub(crate) fn new(world: &mut World, handle: FilterHandle) -> Self {
        let len = world.lock_filter(handle);
        FilterIter {
            world: world as *mut World,
            handle,
            pos: 0,
            len,
        }
    }

    /// Cached pool index of the `k`-th included type (in declaration order)
    /// for the entity just returned by [`Iterator::next`]. Panics (in debug
    /// builds) if `k` names an `ignore-in-filter` component (§7), or if
    /// called before the first `next()`.
    pub fn get_k(&self, k: usize) -> u32 {
        let world = unsafe { &*self.world };
        world.filter(self.handle).pool_index_at(k, self.pos - 1)
    }
}

impl Iterator for FilterIter {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        if self.pos >= self.len {
            return None;
        }
        let world = unsafe { &*self.world };
        let entity = world.filter(self.handle).entity_at(self.pos);
        self.pos += 1;
        Some(entity)
    }
}

impl Drop for FilterIter {
    fn drop(&mut self) {
        let world = unsafe { &mut *self.world };
        world.unlock_filter(self.handle);
    }
}

/// Three-valued presence probe used by [`is_compatible`]: `0` for "use the
/// slot as-is", a positive type index to pretend that type is present, or a
/// negative type index to pretend it is absent.
pub(crate) type Probe = i64;

/// Checks whether a component list (the entity's `[type_index, pool_index,
/// ...]` pairs) satisfies `filter`'s include/exclude sets under `probe`.
///
/// `probe` lets `World::update_filters` reuse the *current* (not yet
/// physically edited) component list for both "about to add" and "about to
/// remove" decisions: passing `type_index` pretends that type present,
/// passing `-type_index` pretends it absent, `0` takes the list at face
/// value.
pub(crate) fn is_compatible(filter: &Filter, components: &[u32], probe: Probe) -> bool {
    let has = |ti: TypeIndex| components.chunks_exact(2).any(|pair| pair[0] == ti);

    for &ti in &filter.include {
        let present = has(ti);
        let pretend_absent = probe == -(ti as Probe);
        let pretend_present = probe == ti as Probe;
        if !((present && !pretend_absent) || pretend_present) {
            return false;
        }
    }
    for &tj in &filter.exclude {
        let present = has(tj);
        let pretend_absent = probe == -(tj as Probe);
        let pretend_present = probe == tj as Probe;
        if (present && !pretend_absent) || pretend_present {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(include: &[TypeIndex], exclude: &[TypeIndex]) -> Filter {
        let ignore = vec![false; include.len()];
        Filter::new(
            include.to_vec(),
            exclude.to_vec(),
            &ignore,
            4,
            Vec::new(),
            Rc::new(Cell::new(0)),
        )
    }

    #[test]
    fn compatible_requires_all_includes_none_of_excludes() {
        let f = filter(&[1], &[2]);
        assert!(is_compatible(&f, &[1, 0], 0));
        assert!(!is_compatible(&f, &[], 0), "missing include");
        assert!(!is_compatible(&f, &[1, 0, 2, 0], 0), "has exclude");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "get_k on an ignore-in-filter component")]
    fn get_k_on_ignore_in_filter_component_panics() {
        let f = Filter::new(
            vec![1],
            vec![],
            &[true],
            4,
            Vec::new(),
            Rc::new(Cell::new(0)),
        );
        f.pool_index_at(0, 0);
    }

    #[test]
    fn probe_pretends_presence_or_absence() {
        let f = filter(&[1], &[]);
        // component 1 not present, but probe=1 pretends it is.
        assert!(is_compatible(&f, &[], 1));
        // component 1 present, but probe=-1 pretends it's gone.
        assert!(!is_compatible(&f, &[1, 0], -1));
    }
}
