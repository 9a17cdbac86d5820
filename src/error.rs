//! Contract-violation error types.
//!
//! All failures described in this crate are contract violations -- misuse,
//! not environmental conditions. They are compiled out in release builds
//! and surface as panics in debug builds. This module follows the teacher
//! crate's own `error.rs`: hand-rolled `Display`/`std::error::Error` impls,
//! no `thiserror`/`anyhow`.
//!
//! Every variant still exists in release builds -- only the call sites that
//! would *construct* one are wrapped in `debug_assertions` checks (see the
//! [`contract_violation`] macro) -- so host code that wants to assert on the
//! error shape in a debug-only test can still name the type.

use std::error::Error as StdError;
use std::fmt;

use crate::entity::Entity;

/// A contract violation raised by misuse of this crate's API.
#[derive(Debug)]
pub enum Error {
    /// Generation mismatch, null handle, or foreign-world handle.
    InvalidHandle(InvalidHandle),
    /// Operation on a destroyed world, or a double-destroy.
    InvalidState(InvalidState),
    /// Same include/exclude set requested with a different declared order.
    DuplicateFilter(DuplicateFilter),
    /// Overlapping include/exclude set, `replace` on an auto-reset
    /// component, or `get_k` on an `ignore-in-filter` component.
    InvalidFilter(InvalidFilter),
    /// A filter's lock/unlock calls were unbalanced.
    LockUnderflow(LockUnderflow),
    /// An entity was created but never given a single component.
    LeakedEntity(LeakedEntity),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHandle(e) => write!(f, "{e}"),
            Error::InvalidState(e) => write!(f, "{e}"),
            Error::DuplicateFilter(e) => write!(f, "{e}"),
            Error::InvalidFilter(e) => write!(f, "{e}"),
            Error::LockUnderflow(e) => write!(f, "{e}"),
            Error::LeakedEntity(e) => write!(f, "{e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::InvalidHandle(e) => Some(e),
            Error::InvalidState(e) => Some(e),
            Error::DuplicateFilter(e) => Some(e),
            Error::InvalidFilter(e) => Some(e),
            Error::LockUnderflow(e) => Some(e),
            Error::LeakedEntity(e) => Some(e),
        }
    }
}

macro_rules! leaf_error {
    ($name:ident, $variant:ident, $fmt:literal $(, $field:ident : $ty:ty)* $(,)?) => {
        #[derive(Debug)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, $fmt $(, self.$field)*)
            }
        }

        impl StdError for $name {}

        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$variant(e)
            }
        }
    };
}

leaf_error!(
    InvalidHandle,
    InvalidHandle,
    "invalid entity handle {entity:?}: {reason}",
    entity: Entity,
    reason: &'static str,
);

leaf_error!(
    InvalidState,
    InvalidState,
    "invalid world state: {reason}",
    reason: &'static str,
);

leaf_error!(
    DuplicateFilter,
    DuplicateFilter,
    "a filter with the same include/exclude sets already exists with a \
     different declared order"
);

leaf_error!(InvalidFilter, InvalidFilter, "invalid filter: {reason}", reason: &'static str);

leaf_error!(
    LockUnderflow,
    LockUnderflow,
    "filter unlock called without a matching lock"
);

leaf_error!(
    LeakedEntity,
    LeakedEntity,
    "entity {entity:?} was created but never given a component",
    entity: Entity,
);

/// Panics with the given [`Error`] when debug assertions are enabled;
/// compiled to nothing in release builds, matching §7 of the design: all
/// contract checks trade safety margin for throughput in release.
macro_rules! contract_violation {
    ($err:expr) => {
        if cfg!(debug_assertions) {
            panic!("contract violation: {}", $err);
        }
    };
}

pub(crate) use contract_violation;
