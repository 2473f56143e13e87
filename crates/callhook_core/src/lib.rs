//! Lifecycle callbacks around function calls.
//!
//! `callhook_core` wraps a function so that user callbacks run at four
//! points of every call:
//!
//! - `on_call` - before the function runs
//! - `on_success` - after it returned normally
//! - `on_failure` - after it failed with a handled error
//! - `on_end` - after every handled call, with captured local variables
//!
//! # Modules
//!
//! - [`hooks`] - Configuration, validation and the call protocol
//! - [`callback`] - Type-erased callbacks, slots and background execution
//! - [`param`] - Values a callback can declare and receive
//! - [`scope`] - Per-call capture of the wrapped function's locals
//! - [`error_class`] - Which errors are handled
//!
//! # Example
//!
//! ```
//! use callhook_core::prelude::*;
//!
//! let divide = Hooks::<(i32, i32), i32>::new()
//!     .on_success(|result: FuncResult<i32>, args: FuncArgs<(i32, i32)>| {
//!         assert_eq!(*result * args.1, args.0);
//!     })
//!     .on_end(|| {})
//!     .wrap(|(a, b): (i32, i32)| {
//!         if b == 0 {
//!             return Err(std::io::Error::other("division by zero"));
//!         }
//!         Ok(a / b)
//!     });
//!
//! assert_eq!(divide.call((8, 2)).unwrap(), 4);
//! // Handled, and `on_end` is set: the default value comes back.
//! assert_eq!(divide.call((1, 0)).unwrap(), 0);
//! ```

pub mod callback;
pub mod error_class;
pub mod hooks;
pub mod param;
pub mod scope;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::callback::{Background, Callback, CallbackError, IntoCallback, Slot, background};
    pub use crate::error_class::ErrorClass;
    pub use crate::expose;
    pub use crate::hooks::{ConfigError, HookError, Hooked, Hooks};
    pub use crate::param::{
        FuncArgs, FuncError, FuncException, FuncKwargs, FuncResult, FuncScopeVars, Kwargs,
    };
    pub use crate::scope::{NOT_FOUND, ScopeValue, ScopeVars};
}
