//! Error classes eligible for handling.
//!
//! An [`ErrorClass`] names a concrete error type. A failure of the wrapped
//! function is handled only if its error matches one of the configured
//! classes; anything else propagates untouched.

use core::any::TypeId;
use core::error::Error;
use core::fmt;

type Matcher = fn(&(dyn Error + Send + Sync + 'static)) -> bool;

fn is_instance<E: Error + 'static>(error: &(dyn Error + Send + Sync + 'static)) -> bool {
    error.is::<E>()
}

fn any_error(_error: &(dyn Error + Send + Sync + 'static)) -> bool {
    true
}

/// A reference to an error type.
///
/// Matching is by concrete type: the error value returned by the wrapped
/// function (after conversion into a boxed error) must be an `E`. Two
/// classes are equal when they refer to the same type; the catch-all has no
/// type.
#[derive(Clone, Copy)]
pub struct ErrorClass {
    name: &'static str,
    type_id: Option<TypeId>,
    matcher: Matcher,
}

impl ErrorClass {
    /// Matches errors of type `E`.
    #[must_use]
    pub fn of<E: Error + 'static>() -> Self {
        Self {
            name: core::any::type_name::<E>(),
            type_id: Some(TypeId::of::<E>()),
            matcher: is_instance::<E>,
        }
    }

    /// Matches every error.
    #[must_use]
    pub fn any() -> Self {
        Self {
            name: "any",
            type_id: None,
            matcher: any_error,
        }
    }

    /// Returns `true` if `error` belongs to this class.
    #[must_use]
    pub fn matches(&self, error: &(dyn Error + Send + Sync + 'static)) -> bool {
        (self.matcher)(error)
    }

    /// Returns the matched error type, or `None` for the catch-all.
    #[must_use]
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Returns the error type name, or `any`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorClass").field(&self.name).finish()
    }
}

impl PartialEq for ErrorClass {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ErrorClass {}
