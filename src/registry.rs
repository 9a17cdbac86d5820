//! Component type registry.
//!
//! Every component type is assigned a stable, process-wide positive integer
//! *type index* the first time [`type_index::<T>()`] is called for it. The
//! assignment is thread-safe (a single atomic counter) because the same
//! component type may be first touched from worlds living on different
//! threads, even though a given [`World`](crate::world::World) itself is
//! confined to one thread (see the crate's concurrency notes).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

/// Process-wide positive integer identifying a component type. Index `0` is
/// reserved to mean "no type" and is never handed out.
pub type TypeIndex = u32;

static NEXT_TYPE_INDEX: AtomicU32 = AtomicU32::new(1);

/// A plain value record that can be attached to an entity.
///
/// Implementors only need to be `'static`; the default trait methods cover
/// the metadata flags the filter and pool machinery consult:
///
/// - [`Component::IGNORE_IN_FILTER`] opts a type out of per-entity cached
///   pool indices in [`Filter`](crate::filter::Filter) (it can still appear
///   in an include/exclude set, it just isn't available through `get_k`).
/// - [`Component::auto_reset`] lets a type provide a reset routine run on
///   fresh pool allocation and on recycle, in place of zero/default
///   initialization.
pub trait Component: Sized + Default + Clone + 'static {
    /// When `true`, filters do not cache this type's pool index per entity.
    const IGNORE_IN_FILTER: bool = false;

    /// An optional reset routine invoked by the component's
    /// [`ComponentPool`](crate::pool::ComponentPool) on fresh allocation and
    /// on recycle. Returning `Some` here is what the distilled spec calls
    /// "auto-reset"; because the function pointer is typed to `Self`, a
    /// component cannot declare a reset routine for a different type -- the
    /// contract violation the original design worried about is simply
    /// unrepresentable.
    fn auto_reset() -> Option<fn(&mut Self)> {
        None
    }
}

/// Metadata flags recorded for a component type, derived once from its
/// [`Component`] impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMeta {
    pub ignore_in_filter: bool,
    pub has_auto_reset: bool,
}

impl TypeMeta {
    pub fn of<T: Component>() -> Self {
        TypeMeta {
            ignore_in_filter: T::IGNORE_IN_FILTER,
            has_auto_reset: T::auto_reset().is_some(),
        }
    }
}

/// Returns the process-wide type index for `T`, assigning one on first call.
///
/// Each generic instantiation of this function owns its own `OnceLock`
/// (a well-worn stable-Rust idiom for "one static per monomorphization"),
/// so the `NEXT_TYPE_INDEX` bump only ever happens once per concrete `T`,
/// no matter how many worlds or threads call this concurrently.
pub fn type_index<T: Component>() -> TypeIndex {
    static CELL: OnceLock<TypeIndex> = OnceLock::new();
    *CELL.get_or_init(|| NEXT_TYPE_INDEX.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone)]
    struct A;
    impl Component for A {}
    #[derive(Default, Clone)]
    struct B;
    impl Component for B {}

    #[test]
    fn indices_are_stable_and_distinct() {
        let a1 = type_index::<A>();
        let b = type_index::<B>();
        let a2 = type_index::<A>();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert!(a1 >= 1);
        assert!(b >= 1);
    }
}
