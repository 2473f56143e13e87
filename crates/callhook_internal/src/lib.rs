//! # Callhook Internal Library
//!
//! Re-exports the callhook crates for convenience.

/// Decorator core: hooks, callbacks, scope capture.
pub use callhook_core;

/// Subscriber setup for the `tracing` events callhook emits.
#[cfg(feature = "tracing-subscriber")]
pub use callhook_tracing;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use callhook_core::prelude::*;

    #[cfg(feature = "tracing-subscriber")]
    pub use callhook_tracing::{TracingConfig, TracingFormat};
}
