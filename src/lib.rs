//! Lifecycle callbacks around function calls.
//!
//! Wrap a function with [`Hooks`](prelude::Hooks) to run callbacks before
//! it, after it succeeds or fails, and at the end of every handled call.
//! See [`callhook_core`] for the full tour.

pub use callhook_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use callhook_internal::prelude::*;
}
