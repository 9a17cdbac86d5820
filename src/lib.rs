//! A data-oriented entity-component-system core.
//!
//! A [`World`] owns every entity, component pool, and filter. An [`Entity`]
//! is a small `Copy` handle into a world: attach data with
//! [`Entity::replace`] or [`Entity::get`], query structurally with
//! [`World::filter_builder`], and iterate safely -- even while attaching or
//! detaching components mid-walk -- with [`World::iter`].
//!
//! ```
//! use ecs_kernel::{Component, System, SystemGroup, World};
//!
//! #[derive(Default, Clone)]
//! struct Position { x: f32, y: f32 }
//! impl Component for Position {}
//!
//! #[derive(Default, Clone)]
//! struct Velocity { dx: f32, dy: f32 }
//! impl Component for Velocity {}
//!
//! #[derive(Default)]
//! struct Movement {
//!     moving: Option<ecs_kernel::FilterHandle>,
//! }
//!
//! impl System for Movement {
//!     fn init(&mut self, world: &mut World) {
//!         self.moving = Some(
//!             world.filter_builder().include::<Position>().include::<Velocity>().build(),
//!         );
//!     }
//!
//!     fn run(&mut self, world: &mut World) {
//!         let handle = self.moving.expect("init runs first");
//!         for entity in world.collect_filter(handle) {
//!             let delta = (entity.get::<Velocity>().dx, entity.get::<Velocity>().dy);
//!             let pos = entity.get::<Position>();
//!             pos.x += delta.0;
//!             pos.y += delta.1;
//!         }
//!     }
//! }
//!
//! let mut world = World::new();
//! let e = world.new_entity();
//! e.replace(Position { x: 0.0, y: 0.0 });
//! e.replace(Velocity { dx: 1.0, dy: 0.0 });
//!
//! let mut systems = SystemGroup::new().add(Movement::default());
//! systems.init(&mut world);
//! systems.run(&mut world);
//! assert_eq!(e.get::<Position>().x, 1.0);
//! ```

mod entity;
mod error;
mod filter;
mod growable;
mod pool;
mod registry;
mod systems;
mod world;

pub use entity::{ComponentRef, Entity, Generation};
pub use error::{
    DuplicateFilter, Error, InvalidFilter, InvalidHandle, InvalidState, LeakedEntity, LockUnderflow,
};
pub use filter::{Filter, FilterBuilder, FilterHandle, FilterIter};
pub use pool::ListenerId;
pub use registry::{Component, TypeIndex, TypeMeta};
pub use systems::{OneFrameCleanup, System, SystemGroup};
pub use world::{DebugHook, World, WorldConfig, WorldStats};
