//! Entity handles: small, `Copy` values identifying a slot in a `World`.

use std::any::Any;
use std::fmt;

use crate::error::{contract_violation, InvalidHandle};
use crate::registry::{Component, TypeIndex};
use crate::world::World;

/// Per-slot counter, bumped on recycle, used to detect stale handles.
/// Wraps but skips `0`, which is reserved to keep the null handle unique.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Generation(u16);

impl Generation {
    pub(crate) fn first() -> Self {
        Generation(1)
    }

    pub(crate) fn advance(self) -> Self {
        let next = self.0.wrapping_add(1);
        Generation(if next == 0 { 1 } else { next })
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

/// An opaque identifier for a slot in a [`World`]: the pair `(id,
/// generation)` names one specific lifetime of that slot, and `world`
/// resolves which world it belongs to.
///
/// `Entity` is a small `Copy` value, like the teacher crate's own `Entity`
/// type, but additionally carries a back-reference to its owning world so
/// that `entity.get::<T>()`-style extension methods don't need the world
/// threaded through every call site. Dereferencing that back-reference is
/// confined to the two `world()`/`world_mut()` accessors below; the safety
/// argument is that a `World`'s address never changes after it is created
/// (the host owns a `World` directly and this crate never relocates one),
/// and that the generation check on every operation detects
/// use-after-entity-destroy. Using a handle after the *world itself* has
/// been dropped is the one hazard this cannot catch -- matching §5's "worlds
/// must outlive any handle that will be touched" -- which is why `Entity` is
/// neither `Send` nor `Sync` (a raw pointer already disables both) and
/// should not outlive the scope that owns the `World`.
#[derive(Clone, Copy)]
pub struct Entity {
    id: u32,
    generation: Generation,
    world: *mut World,
}

impl Entity {
    pub(crate) fn new(id: u32, generation: Generation, world: *mut World) -> Self {
        Entity {
            id,
            generation,
            world,
        }
    }

    /// The distinguished null handle: `id == 0 && generation == 0`. It never
    /// refers to a real slot (slots start at generation 1).
    pub fn null() -> Self {
        Entity {
            id: 0,
            generation: Generation(0),
            world: std::ptr::null_mut(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_null(&self) -> bool {
        self.id == 0 && self.generation.0 == 0
    }

    pub fn is_world_alive(&self) -> bool {
        !self.world.is_null() && unsafe { &*self.world }.is_alive()
    }

    pub fn is_alive(&self) -> bool {
        !self.world.is_null() && unsafe { &*self.world }.is_entity_alive(*self)
    }

    /// Same-id comparison, ignoring generation and world. Rarely what you
    /// want; see [`PartialEq`] for the usual notion of equality.
    pub fn are_id_equals(&self, other: &Entity) -> bool {
        self.id == other.id
    }

    pub(crate) fn world_ptr(&self) -> *mut World {
        self.world
    }

    fn world(&self) -> &World {
        debug_assert!(!self.world.is_null(), "dereferencing the null handle");
        unsafe { &*self.world }
    }

    #[allow(clippy::mut_from_ref)]
    fn world_mut(&self) -> &mut World {
        debug_assert!(!self.world.is_null(), "dereferencing the null handle");
        unsafe { &mut *self.world }
    }

    fn assert_valid(&self) {
        if cfg!(debug_assertions) && !self.is_alive() {
            contract_violation!(InvalidHandle {
                entity: *self,
                reason: "entity is not alive (stale generation, null, or destroyed world)",
            });
        }
    }

    /// Overwrites `T`'s value if already attached, otherwise attaches a
    /// fresh one. Not valid for components that declare an auto-reset
    /// routine (debug contract violation).
    pub fn replace<T: Component>(&self, value: T) {
        self.assert_valid();
        self.world_mut().replace(*self, value);
    }

    /// Returns the current value of `T`, attaching a fresh (reset-or-default)
    /// one first if not already present.
    pub fn get<T: Component>(&self) -> &mut T {
        self.assert_valid();
        self.world_mut().get_or_insert(*self)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.world().has::<T>(*self)
    }

    /// Detaches `T` if attached; a no-op (no filter updates fired) if not.
    pub fn del<T: Component>(&self) {
        self.assert_valid();
        self.world_mut().del::<T>(*self);
    }

    pub fn component_ref<T: Component>(&self) -> ComponentRef<T> {
        self.assert_valid();
        let pool_index = self.world_mut().component_index_in_pool::<T>(*self);
        debug_assert!(pool_index >= 0, "component_ref on an unattached component");
        ComponentRef {
            world: self.world,
            pool_index: pool_index as u32,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn get_component_index_in_pool<T: Component>(&self) -> i32 {
        self.world().component_index_in_pool::<T>(*self)
    }

    /// Allocates a new entity and value-copies every attached component
    /// type onto it, in the same order they appear on `self`.
    pub fn copy(&self) -> Entity {
        self.assert_valid();
        self.world_mut().copy_entity(*self)
    }

    /// Moves every component from `self` onto `target` (overwriting
    /// `target`'s existing value for a shared type), then destroys `self`.
    pub fn move_to(&self, target: Entity) {
        self.assert_valid();
        self.world_mut().move_to(*self, target);
    }

    pub fn destroy(&self) {
        self.assert_valid();
        self.world_mut().destroy_entity(*self);
    }

    pub fn get_component_types(&self, out: &mut Vec<TypeIndex>) {
        self.world().component_types(*self, out);
    }

    /// Reflection helper for debug/UI tooling (§4.4): boxes a clone of every
    /// attached component's current value, in the same order as
    /// [`Entity::get_component_types`]. Boxing on this path is acceptable --
    /// it only exists for inspection, never for the hot per-frame loop.
    pub fn get_component_values(&self, out: &mut Vec<Box<dyn Any>>) {
        self.world().component_values(*self, out);
    }

    /// Number of components currently attached, i.e. `count` of §2's entity
    /// extension operations.
    pub fn get_components_count(&self) -> usize {
        self.world().components_count(*self)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.generation == other.generation && self.world == other.world
    }
}

impl Eq for Entity {}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("generation", &self.generation.0)
            .field("world", &(self.world as usize))
            .finish()
    }
}

/// A stable-while-attached reference to a single component value, obtained
/// via [`Entity::component_ref`]. Valid only while the named component
/// remains attached; using it afterward is undefined in release builds and
/// a contract violation the caller is responsible for avoiding (this type
/// cannot check liveness itself without re-scanning the owning entity, which
/// would defeat its purpose).
pub struct ComponentRef<T: Component> {
    world: *mut World,
    pool_index: u32,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Component> ComponentRef<T> {
    pub fn get(&self) -> &T {
        unsafe { &*self.world }.pool_ref::<T>(self.pool_index)
    }

    pub fn get_mut(&mut self) -> &mut T {
        unsafe { &mut *self.world }
            .pool_mut::<T>()
            .get_mut(self.pool_index)
    }
}
