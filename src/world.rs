//! The world: owner of entities, component pools, and filters.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::entity::{Entity, Generation};
use crate::error::{contract_violation, InvalidFilter, InvalidHandle, InvalidState, LeakedEntity};
use crate::filter::{is_compatible, DeferredOp, Filter, FilterBuilder, FilterHandle, FilterIter};
use crate::pool::{AnyPool, ComponentPool, ListenerId};
use crate::registry::{type_index, Component, TypeIndex};

const RECYCLED: i32 = -2;

/// Initial-capacity configuration for a [`World`]. Every option is a
/// positive integer; `0` or a negative value selects the documented
/// default.
#[derive(Debug, Clone, Copy)]
pub struct WorldConfig {
    pub world_entities_cache: i64,
    pub world_filters_cache: i64,
    pub world_component_pools_cache: i64,
    pub entity_components_cache: i64,
    pub filter_entities_cache: i64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            world_entities_cache: 1024,
            world_filters_cache: 128,
            world_component_pools_cache: 512,
            entity_components_cache: 8,
            filter_entities_cache: 256,
        }
    }
}

impl WorldConfig {
    fn resolved(value: i64, default: i64) -> usize {
        if value > 0 {
            value as usize
        } else {
            default as usize
        }
    }
}

/// A point-in-time snapshot of world occupancy, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldStats {
    pub active: usize,
    pub reserved: usize,
    pub filters: usize,
    pub components: usize,
}

/// Optional debug-only lifecycle listener. Every method has a no-op default
/// so a host only overrides what it wants to observe. Fires only when debug
/// assertions are enabled, mirroring the fact that debug hooks in this
/// crate are a diagnostic, not a dependable feature of the public contract.
#[allow(unused_variables)]
pub trait DebugHook {
    fn on_entity_created(&mut self, entity: Entity) {}
    fn on_entity_destroyed(&mut self, entity: Entity) {}
    fn on_filter_created(&mut self, handle: FilterHandle) {}
    fn on_component_list_changed(&mut self, entity: Entity) {}
    fn on_world_destroyed(&mut self) {}
    fn on_systems_destroyed(&mut self) {}
}

pub(crate) struct EntitySlot {
    pub(crate) generation: Generation,
    /// Component count, pre-multiplied by two; `RECYCLED` (-2) marks a
    /// recycled, not-alive slot.
    pub(crate) component_count_x2: i32,
    /// Interleaved `[type_index, pool_index, type_index, pool_index, ...]`.
    pub(crate) components: Vec<u32>,
}

impl EntitySlot {
    fn new(capacity: usize) -> Self {
        EntitySlot {
            generation: Generation::first(),
            component_count_x2: 0,
            components: Vec::with_capacity(capacity * 2),
        }
    }

    fn find(&self, ti: TypeIndex) -> Option<usize> {
        self.components
            .chunks_exact(2)
            .position(|pair| pair[0] == ti)
    }

    fn is_alive_for(&self, generation: Generation) -> bool {
        self.component_count_x2 != RECYCLED && self.generation == generation
    }
}

/// Owner of all entities, component pools, and filters. The hard engineering
/// of this crate lives here: the rest of the public API (`Entity`,
/// `Filter`) are thin, `Copy`-friendly handles back into a `World`.
pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) entities: Vec<EntitySlot>,
    free_ids: Vec<u32>,
    pools: Vec<Option<Box<dyn AnyPool>>>,
    filters: Vec<Filter>,
    filter_lookup: AHashMap<(Vec<TypeIndex>, Vec<TypeIndex>), usize>,
    filters_by_include: AHashMap<TypeIndex, Vec<usize>>,
    filters_by_exclude: AHashMap<TypeIndex, Vec<usize>>,
    alive: bool,
    /// Debug-only audit of entities created but never given a component;
    /// see §7 `LeakedEntity`.
    in_flight: AHashMap<u32, ()>,
    hook: Option<Box<dyn DebugHook>>,
    /// Type-erased per-type operations, registered the first time
    /// `pool_mut::<T>()` runs for that type index. `AnyPool` cannot carry
    /// these as trait methods because `copy`/`move_to` need `T: Clone`
    /// plumbed through a concrete `World::replace::<T>` call, not just
    /// pool-internal bookkeeping.
    copiers: Vec<Option<fn(&mut World, u32, Entity)>>,
    movers: Vec<Option<fn(&mut World, u32, Entity)>>,
    recyclers: Vec<Option<fn(&mut World, u32)>>,
    /// Boxes a clone of a pool slot's value, type-erased, for
    /// `Entity::get_component_values` (§4.4).
    boxers: Vec<Option<fn(&World, u32) -> Box<dyn Any>>>,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        World {
            entities: Vec::with_capacity(WorldConfig::resolved(
                config.world_entities_cache,
                WorldConfig::default().world_entities_cache,
            )),
            free_ids: Vec::new(),
            pools: Vec::with_capacity(WorldConfig::resolved(
                config.world_component_pools_cache,
                WorldConfig::default().world_component_pools_cache,
            )),
            filters: Vec::with_capacity(WorldConfig::resolved(
                config.world_filters_cache,
                WorldConfig::default().world_filters_cache,
            )),
            filter_lookup: AHashMap::default(),
            filters_by_include: AHashMap::default(),
            filters_by_exclude: AHashMap::default(),
            alive: true,
            in_flight: AHashMap::default(),
            config,
            copiers: Vec::new(),
            movers: Vec::new(),
            recyclers: Vec::new(),
            boxers: Vec::new(),
        }
        .with_hook_slot()
    }

    fn with_hook_slot(mut self) -> Self {
        self.hook = None;
        self
    }

    pub fn set_debug_hook(&mut self, hook: Box<dyn DebugHook>) {
        self.hook = Some(hook);
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    fn entity_cache(&self) -> usize {
        WorldConfig::resolved(
            self.config.entity_components_cache,
            WorldConfig::default().entity_components_cache,
        )
    }

    // ---- entity lifecycle -------------------------------------------------

    pub fn new_entity(&mut self) -> Entity {
        self.assert_alive();
        let cap = self.entity_cache();
        let id = if let Some(id) = self.free_ids.pop() {
            let slot = &mut self.entities[id as usize];
            slot.component_count_x2 = 0;
            slot.components.clear();
            id
        } else {
            let id = self.entities.len() as u32;
            self.entities.push(EntitySlot::new(cap));
            id
        };
        let generation = self.entities[id as usize].generation;
        self.in_flight.insert(id, ());
        let entity = Entity::new(id, generation, self as *mut World);
        if let Some(hook) = &mut self.hook {
            hook.on_entity_created(entity);
        }
        log::trace!("created entity {id} generation {generation:?}");
        entity
    }

    pub(crate) fn is_entity_alive(&self, entity: Entity) -> bool {
        match self.entities.get(entity.id() as usize) {
            Some(slot) => self.alive && slot.is_alive_for(entity.generation()),
            None => false,
        }
    }

    fn assert_alive(&self) {
        if !self.alive {
            contract_violation!(InvalidState {
                reason: "operation on a destroyed world"
            });
        }
    }

    fn checked_slot(&mut self, entity: Entity) -> &mut EntitySlot {
        self.assert_alive();
        let idx = entity.id() as usize;
        if cfg!(debug_assertions) {
            match self.entities.get(idx) {
                Some(slot) if slot.is_alive_for(entity.generation()) => {}
                _ => contract_violation!(InvalidHandle {
                    entity,
                    reason: "stale or foreign entity handle",
                }),
            }
        }
        &mut self.entities[idx]
    }

    // ---- pools --------------------------------------------------------

    pub(crate) fn pool_mut<T: Component>(&mut self) -> &mut ComponentPool<T> {
        let ti = type_index::<T>() as usize;
        if self.pools.len() <= ti {
            self.pools.resize_with(ti + 1, || None);
            self.copiers.resize_with(ti + 1, || None);
            self.movers.resize_with(ti + 1, || None);
            self.recyclers.resize_with(ti + 1, || None);
            self.boxers.resize_with(ti + 1, || None);
        }
        if self.pools[ti].is_none() {
            let cap = WorldConfig::resolved(
                self.config.world_component_pools_cache,
                WorldConfig::default().world_component_pools_cache,
            );
            self.pools[ti] = Some(Box::new(ComponentPool::<T>::new(cap)));
            self.copiers[ti] = Some(Self::copier_fn::<T> as fn(&mut World, u32, Entity));
            self.movers[ti] = Some(Self::mover_fn::<T> as fn(&mut World, u32, Entity));
            self.recyclers[ti] = Some(Self::recycler_fn::<T> as fn(&mut World, u32));
            self.boxers[ti] = Some(Self::boxer_fn::<T> as fn(&World, u32) -> Box<dyn Any>);
        }
        self.pools[ti]
            .as_mut()
            .unwrap()
            .as_any_mut()
            .downcast_mut::<ComponentPool<T>>()
            .expect("pool slot type mismatch: type index reused for a different type")
    }

    fn copier_fn<T: Component>(world: &mut World, src_index: u32, target: Entity) {
        let value = world.pool_mut::<T>().get(src_index).clone();
        world.replace::<T>(target, value);
    }

    fn mover_fn<T: Component>(world: &mut World, src_index: u32, target: Entity) {
        let value = world.pool_mut::<T>().get(src_index).clone();
        world.replace::<T>(target, value);
    }

    fn recycler_fn<T: Component>(world: &mut World, pool_index: u32) {
        world.pool_mut::<T>().recycle(pool_index);
    }

    fn boxer_fn<T: Component>(world: &World, pool_index: u32) -> Box<dyn Any> {
        Box::new(world.pool_ref::<T>(pool_index).clone())
    }

    /// Immutable counterpart to [`World::pool_mut`] for reads that must not
    /// allocate a pool that should already exist (a live [`ComponentRef`]
    /// implies its pool was created when the component was attached).
    pub(crate) fn pool_ref<T: Component>(&self, index: u32) -> &T {
        let ti = type_index::<T>() as usize;
        self.pools[ti]
            .as_ref()
            .expect("pool_ref on a type with no pool")
            .as_any()
            .downcast_ref::<ComponentPool<T>>()
            .expect("pool slot type mismatch: type index reused for a different type")
            .get(index)
    }

    pub(crate) fn pool(&self, ti: TypeIndex) -> Option<&dyn AnyPool> {
        self.pools
            .get(ti as usize)
            .and_then(|p| p.as_ref())
            .map(|b| b.as_ref())
    }

    // ---- component operations ------------------------------------------

    pub(crate) fn replace<T: Component>(&mut self, entity: Entity, value: T) {
        if cfg!(debug_assertions) && T::auto_reset().is_some() {
            contract_violation!(InvalidFilter {
                reason: "replace() is not compatible with auto-reset components",
            });
        }
        let ti = type_index::<T>();
        let slot = self.checked_slot(entity);
        if let Some(pos) = slot.find(ti) {
            let pool_index = slot.components[pos * 2 + 1];
            *self.pool_mut::<T>().get_mut(pool_index) = value;
            return;
        }
        self.attach_new(entity, ti, value);
    }

    pub(crate) fn get_or_insert<T: Component>(&mut self, entity: Entity) -> &mut T {
        let ti = type_index::<T>();
        let slot = self.checked_slot(entity);
        if let Some(pos) = slot.find(ti) {
            let pool_index = slot.components[pos * 2 + 1];
            return self.pool_mut::<T>().get_mut(pool_index);
        }
        let pool_index = self.attach_new_slot_only(entity, ti);
        self.pool_mut::<T>().get_mut(pool_index)
    }

    /// Shared tail of `replace` and `get`: allocates a pool slot, appends
    /// the `[type_index, pool_index]` pair, fires the filter update, then
    /// writes `value`.
    fn attach_new<T: Component>(&mut self, entity: Entity, ti: TypeIndex, value: T) {
        let pool_index = self.attach_new_slot_only(entity, ti);
        *self.pool_mut::<T>().get_mut(pool_index) = value;
    }

    fn attach_new_slot_only<T: Component>(&mut self, entity: Entity, ti: TypeIndex) -> u32 {
        let pool_index = self.pool_mut::<T>().new_slot();
        let slot = self.checked_slot(entity);
        slot.components.push(ti);
        slot.components.push(pool_index);
        slot.component_count_x2 += 2;
        self.in_flight.remove(&entity.id());
        self.update_filters(ti as i64, entity);
        pool_index
    }

    pub(crate) fn has<T: Component>(&self, entity: Entity) -> bool {
        let ti = type_index::<T>();
        match self.entities.get(entity.id() as usize) {
            Some(slot) if slot.is_alive_for(entity.generation()) => slot.find(ti).is_some(),
            _ => false,
        }
    }

    pub(crate) fn del<T: Component>(&mut self, entity: Entity) {
        let ti = type_index::<T>();
        let slot = self.checked_slot(entity);
        let Some(pos) = slot.find(ti) else {
            return;
        };
        let pool_index = slot.components[pos * 2 + 1];
        // Fire before physical removal: compatibility checks still see the
        // component present, and use probe = -ti to mean "pretend absent".
        self.update_filters(-(ti as i64), entity);

        let slot = self.checked_slot(entity);
        let last = slot.components.len() - 2;
        let pos_raw = pos * 2;
        if pos_raw != last {
            slot.components[pos_raw] = slot.components[last];
            slot.components[pos_raw + 1] = slot.components[last + 1];
        }
        slot.components.truncate(last);
        slot.component_count_x2 -= 2;
        let remaining = slot.component_count_x2;

        self.pool_mut::<T>().recycle(pool_index);
        if remaining == 0 {
            self.recycle_entity(entity.id());
        }
    }

    pub(crate) fn component_index_in_pool<T: Component>(&self, entity: Entity) -> i32 {
        match self.entities.get(entity.id() as usize) {
            Some(slot) if slot.is_alive_for(entity.generation()) => slot
                .find(type_index::<T>())
                .map(|pos| slot.components[pos * 2 + 1] as i32)
                .unwrap_or(-1),
            _ => -1,
        }
    }

    pub(crate) fn component_types(&self, entity: Entity, out: &mut Vec<TypeIndex>) {
        out.clear();
        if let Some(slot) = self.entities.get(entity.id() as usize) {
            if slot.is_alive_for(entity.generation()) {
                out.extend(slot.components.chunks_exact(2).map(|pair| pair[0]));
            }
        }
    }

    pub(crate) fn component_values(&self, entity: Entity, out: &mut Vec<Box<dyn Any>>) {
        out.clear();
        if let Some(slot) = self.entities.get(entity.id() as usize) {
            if slot.is_alive_for(entity.generation()) {
                for pair in slot.components.chunks_exact(2) {
                    let (ti, pool_index) = (pair[0], pair[1]);
                    let boxer = self.boxers[ti as usize]
                        .expect("component type has no registered boxer");
                    out.push(boxer(self, pool_index));
                }
            }
        }
    }

    pub(crate) fn components_count(&self, entity: Entity) -> usize {
        match self.entities.get(entity.id() as usize) {
            Some(slot) if slot.is_alive_for(entity.generation()) => {
                (slot.component_count_x2 / 2) as usize
            }
            _ => 0,
        }
    }

    pub(crate) fn copy_entity(&mut self, source: Entity) -> Entity {
        let target = self.new_entity();
        let pairs = self.checked_slot(source).components.clone();
        for pair in pairs.chunks_exact(2) {
            let (ti, src_index) = (pair[0], pair[1]);
            self.copy_component_generic(ti, src_index, target);
        }
        target
    }

    /// Dispatches a type-erased copy by going back through the pool's
    /// `AnyPool` facade; `copy_data` itself stays generic on `T` so it can
    /// require `T: Clone`, which `AnyPool` cannot express as a trait object
    /// method.
    fn copy_component_generic(&mut self, ti: TypeIndex, src_index: u32, target: Entity) {
        let f = self.copiers[ti as usize].expect("component type has no registered copier");
        f(self, src_index, target);
    }

    pub(crate) fn move_to(&mut self, source: Entity, target: Entity) {
        if cfg!(debug_assertions) && (source == target || source.world_ptr() != target.world_ptr())
        {
            contract_violation!(InvalidHandle {
                entity: source,
                reason: "move_to requires two distinct entities in the same world",
            });
        }
        let pairs = self.checked_slot(source).components.clone();
        for pair in pairs.chunks_exact(2) {
            let (ti, src_index) = (pair[0], pair[1]);
            let f = self.movers[ti as usize].expect("component type has no registered mover");
            f(self, src_index, target);
        }
        self.destroy_entity(source);
    }

    pub(crate) fn destroy_entity(&mut self, entity: Entity) {
        let pairs = self.checked_slot(entity).components.clone();
        for pair in pairs.chunks_exact(2).rev() {
            let (ti, pool_index) = (pair[0], pair[1]);
            self.update_filters(-(ti as i64), entity);
            let f = self.recyclers[ti as usize].expect("component type has no registered recycler");
            f(self, pool_index);
        }
        let slot = self.checked_slot(entity);
        slot.components.clear();
        slot.component_count_x2 = 0;
        self.recycle_entity(entity.id());
        if let Some(hook) = &mut self.hook {
            hook.on_entity_destroyed(entity);
        }
    }

    fn recycle_entity(&mut self, id: u32) {
        self.in_flight.remove(&id);
        let slot = &mut self.entities[id as usize];
        debug_assert_eq!(slot.component_count_x2, 0);
        slot.component_count_x2 = RECYCLED;
        slot.generation = slot.generation.advance();
        self.free_ids.push(id);
    }

    pub fn get_all_entities(&mut self, out: &mut Vec<Entity>) -> usize {
        let world_ptr = self as *mut World;
        out.clear();
        for (id, slot) in self.entities.iter().enumerate() {
            if slot.component_count_x2 != RECYCLED {
                out.push(Entity::new(id as u32, slot.generation, world_ptr));
            }
        }
        out.len()
    }

    pub fn stats(&self) -> WorldStats {
        let active = self
            .entities
            .iter()
            .filter(|s| s.component_count_x2 != RECYCLED)
            .count();
        let components = self
            .entities
            .iter()
            .map(|s| (s.component_count_x2.max(0) / 2) as usize)
            .sum();
        WorldStats {
            active,
            reserved: self.free_ids.len(),
            filters: self.filters.len(),
            components,
        }
    }

    /// Entities created but never given a single component, as of this
    /// call, each reported as a [`LeakedEntity`] error value (§7). A host
    /// calls this at the end of a phase if it wants to catch the mistake;
    /// nothing in this crate raises it automatically, since a leaked entity
    /// is not itself a contract violation, merely a likely bug.
    pub fn audit_leaked_entities(&mut self) -> Vec<LeakedEntity> {
        let world_ptr = self as *mut World;
        self.in_flight
            .keys()
            .map(|&id| LeakedEntity {
                entity: Entity::new(id, self.entities[id as usize].generation, world_ptr),
            })
            .collect()
    }

    pub fn destroy(&mut self) {
        self.assert_alive();
        let mut all = Vec::new();
        self.get_all_entities(&mut all);
        for e in all {
            self.destroy_entity(e);
        }
        // Taken out so each filter's `destroy` can borrow `self` to
        // unsubscribe from its pools' resize notifications (§4.3).
        let mut filters = std::mem::take(&mut self.filters);
        for filter in &mut filters {
            filter.destroy(self);
        }
        self.filter_lookup.clear();
        self.filters_by_include.clear();
        self.filters_by_exclude.clear();
        self.alive = false;
        if let Some(hook) = &mut self.hook {
            hook.on_world_destroyed();
        }
        log::debug!("world destroyed");
    }

    /// Invoked once by [`SystemGroup::destroy`](crate::systems::SystemGroup::destroy)
    /// after every system's `destroy`/`post_destroy` has run.
    pub(crate) fn notify_systems_destroyed(&mut self) {
        if let Some(hook) = &mut self.hook {
            hook.on_systems_destroyed();
        }
    }

    /// Subscribes to `T`'s pool resize notifications; only callable where
    /// `T` is concrete, since only `ComponentPool<T>::add_resize_listener`
    /// can hand out a callback-carrying listener.
    pub(crate) fn subscribe_resize<T: Component>(&mut self, callback: Box<dyn FnMut()>) -> ListenerId {
        self.pool_mut::<T>().add_resize_listener(callback)
    }

    /// Type-erased unsubscribe, for code (like [`Filter::destroy`]) that
    /// only has a [`TypeIndex`], not the concrete `T`.
    pub(crate) fn unsubscribe_resize(&mut self, ti: TypeIndex, id: ListenerId) {
        if let Some(pool) = self.pools.get_mut(ti as usize).and_then(|p| p.as_mut()) {
            pool.remove_resize_listener_dyn(id);
        }
    }

    // ---- filters --------------------------------------------------------

    pub(crate) fn get_or_create_filter(
        &mut self,
        include: Vec<TypeIndex>,
        exclude: Vec<TypeIndex>,
        ignore_in_filter: Vec<bool>,
        subscriptions: Vec<(TypeIndex, ListenerId)>,
        notifications: Rc<Cell<u32>>,
    ) -> FilterHandle {
        self.assert_alive();
        let world_ptr = self as *mut World;
        if cfg!(debug_assertions) {
            if include.iter().any(|ti| exclude.contains(ti)) {
                contract_violation!(InvalidFilter {
                    reason: "a component type cannot be both included and excluded",
                });
            }
        }
        let mut sorted_include = include.clone();
        sorted_include.sort_unstable();
        let mut sorted_exclude = exclude.clone();
        sorted_exclude.sort_unstable();
        let key = (sorted_include, sorted_exclude);

        if let Some(&idx) = self.filter_lookup.get(&key) {
            if cfg!(debug_assertions)
                && (self.filters[idx].include() != include.as_slice()
                    || self.filters[idx].exclude() != exclude.as_slice())
            {
                contract_violation!(crate::error::DuplicateFilter {});
            }
            // This filter already exists and owns its own subscriptions from
            // when it was first built; the builder's eager ones are
            // redundant.
            for (ti, id) in subscriptions {
                self.unsubscribe_resize(ti, id);
            }
            return FilterHandle(idx);
        }

        let cap = WorldConfig::resolved(
            self.config.filter_entities_cache,
            WorldConfig::default().filter_entities_cache,
        );
        let filter = Filter::new(
            include.clone(),
            exclude.clone(),
            &ignore_in_filter,
            cap,
            subscriptions,
            notifications,
        );
        let idx = self.filters.len();
        self.filters.push(filter);
        self.filter_lookup.insert(key, idx);
        for &ti in &include {
            self.filters_by_include.entry(ti).or_default().push(idx);
        }
        for &ti in &exclude {
            self.filters_by_exclude.entry(ti).or_default().push(idx);
        }

        // Seed membership from existing entities. `add_entity` is called
        // directly (bypassing `update_filters`), so it can never re-enter
        // another filter's dispatch -- see the resolved open question in
        // the design notes.
        for (id, slot) in self.entities.iter().enumerate() {
            if slot.component_count_x2 == RECYCLED {
                continue;
            }
            if is_compatible(&self.filters[idx], &slot.components, 0) {
                let entity = Entity::new(id as u32, slot.generation, world_ptr);
                self.filters[idx].add_entity(entity, &slot.components);
            }
        }
        if let Some(hook) = &mut self.hook {
            hook.on_filter_created(FilterHandle(idx));
        }
        FilterHandle(idx)
    }

    /// Structural-change dispatch: `signed_type` is a type index carrying
    /// add/remove polarity in its sign. See §4.5 of the design for the
    /// include/exclude case analysis this implements.
    fn update_filters(&mut self, signed_type: i64, entity: Entity) {
        let t = signed_type.unsigned_abs() as TypeIndex;
        let components = self.entities[entity.id() as usize].components.clone();
        if let Some(hook) = &mut self.hook {
            hook.on_component_list_changed(entity);
        }

        if signed_type > 0 {
            if let Some(idxs) = self.filters_by_include.get(&t).cloned() {
                for fi in idxs {
                    if is_compatible(&self.filters[fi], &components, 0) {
                        self.dispatch_add(fi, entity, &components);
                    }
                }
            }
            if let Some(idxs) = self.filters_by_exclude.get(&t).cloned() {
                for fi in idxs {
                    if is_compatible(&self.filters[fi], &components, -(t as i64)) {
                        self.dispatch_remove(fi, entity);
                    }
                }
            }
        } else {
            if let Some(idxs) = self.filters_by_exclude.get(&t).cloned() {
                for fi in idxs {
                    if is_compatible(&self.filters[fi], &components, -(t as i64)) {
                        self.dispatch_add(fi, entity, &components);
                    }
                }
            }
            if let Some(idxs) = self.filters_by_include.get(&t).cloned() {
                for fi in idxs {
                    if !is_compatible(&self.filters[fi], &components, -(t as i64)) {
                        self.dispatch_remove(fi, entity);
                    }
                }
            }
        }
    }

    fn dispatch_add(&mut self, filter_idx: usize, entity: Entity, components: &[u32]) {
        if self.filters[filter_idx].is_locked() {
            self.filters[filter_idx].push_deferred(DeferredOp::Add(entity));
            return;
        }
        self.filters[filter_idx].add_entity(entity, components);
    }

    fn dispatch_remove(&mut self, filter_idx: usize, entity: Entity) {
        if self.filters[filter_idx].is_locked() {
            self.filters[filter_idx].push_deferred(DeferredOp::Remove(entity));
            return;
        }
        self.filters[filter_idx].remove_entity(entity);
    }

    pub(crate) fn lock_filter(&mut self, handle: FilterHandle) -> usize {
        self.filters[handle.0].lock();
        self.filters[handle.0].len()
    }

    pub(crate) fn unlock_filter(&mut self, handle: FilterHandle) {
        if let Some(deferred) = self.filters[handle.0].unlock() {
            for op in deferred {
                match op {
                    DeferredOp::Add(e) => {
                        if self.is_entity_alive(e) {
                            let components = self.entities[e.id() as usize].components.clone();
                            self.filters[handle.0].add_entity(e, &components);
                        }
                    }
                    DeferredOp::Remove(e) => self.filters[handle.0].remove_entity(e),
                }
            }
        }
    }

    /// The filter behind `handle`, e.g. to read its [`Filter::resize_notifications`].
    pub fn filter(&self, handle: FilterHandle) -> &Filter {
        &self.filters[handle.0]
    }

    /// Starts building an include/exclude query; see [`FilterBuilder`].
    pub fn filter_builder(&mut self) -> FilterBuilder<'_> {
        FilterBuilder::new(self)
    }

    /// A locked, safe-to-mutate-during walk over `handle`'s current members.
    pub fn iter(&mut self, handle: FilterHandle) -> FilterIter {
        FilterIter::new(self, handle)
    }

    /// Snapshots `handle`'s current members into a plain `Vec`. Convenient
    /// when the caller wants to mutate the world freely per-entity without
    /// juggling a locked iterator, at the cost of an allocation.
    pub fn collect_filter(&mut self, handle: FilterHandle) -> Vec<Entity> {
        self.iter(handle).collect()
    }
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}
