//! Decorator configuration and validation.
//!
//! [`Hooks`] holds the four lifecycle callbacks, the value returned after a
//! handled failure, the local variables to capture and the error classes
//! to handle. Wrapping a function with it produces a [`Hooked`] wrapper that
//! runs the call protocol:
//!
//! ```text
//! validate ─ install capture ─ on_call ─ target ─┬─ Ok  ─ extract ─ on_success ─┐
//!                                                ├─ Err (handled) ─ extract ─ on_failure ─┤
//!                                                └─ Err (other) ─ uninstall ─ raise      │
//!                        uninstall ─ on_end, or re-raise when on_end is unset ───────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use callhook_core::expose;
//! use callhook_core::hooks::Hooks;
//! use callhook_core::param::{FuncException, FuncScopeVars};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("save failed")]
//! struct SaveError;
//!
//! let save = Hooks::<(bool,), i64>::with_default_return(-1)
//!     .on_failure(|err: FuncException| assert_eq!(err.to_string(), "save failed"))
//!     .on_end(|vars: FuncScopeVars| assert_eq!(vars.get::<i64>("id"), Some(&2)))
//!     .pass_vars(["id"])
//!     .catch::<SaveError>()
//!     .wrap(|(fail,): (bool,)| {
//!         let id: i64 = 2;
//!         expose!(id);
//!         if fail { Err(SaveError) } else { Ok(id) }
//!     });
//!
//! assert_eq!(save.call((false,)).unwrap(), 2);
//! assert_eq!(save.call((true,)).unwrap(), -1);
//! ```

mod kwargs;
mod wrapper;

use core::error::Error;
use core::fmt;

pub use wrapper::{HookError, Hooked};

use crate::callback::{Callback, IntoCallback, Slot};
use crate::error_class::ErrorClass;

/// Configuration errors, raised before the wrapped function runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A callback declared a parameter its slot does not offer.
    #[error(
        "signature of callback `{slot}` is invalid: expected no parameter or a combination of {expected}, found {found}"
    )]
    InvalidSignature {
        /// The slot holding the callback.
        slot: Slot,
        /// The parameters the slot offers.
        expected: String,
        /// The parameters the callback declared.
        found: String,
    },

    /// A callback requires a value its slot only has on some paths.
    #[error(
        "callback `{slot}` must declare `{param}` as an `Option`: it is absent on some calls"
    )]
    RequiredPhaseValue {
        /// The slot holding the callback.
        slot: Slot,
        /// The parameter declared without `Option`.
        param: &'static str,
    },

    /// A `pass_vars` entry is not a variable name.
    #[error("variable `{0}` in `pass_vars` is not a valid identifier")]
    InvalidVariable(String),

    /// Variables are captured but no `on_end` callback receives them.
    #[error("if `pass_vars` is defined, `on_end` must be defined")]
    PassVarsWithoutOnEnd,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first == '_' || first.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

// ─────────────────────────────────────────────────────────────────────────────
// Hooks
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle callback configuration for wrapped functions.
///
/// `A` is the wrapped function's argument type, `R` its return type. All
/// slots start out as the no-op placeholder.
///
/// # Concurrency
///
/// Scope capture is per thread and per call, so a wrapper can be called
/// from several threads at once. Background callbacks are never awaited.
pub struct Hooks<A, R> {
    on_call: Callback<A, R>,
    on_success: Callback<A, R>,
    on_failure: Callback<A, R>,
    on_end: Callback<A, R>,
    default_return: R,
    pass_vars: Option<Vec<String>>,
    exception_classes: Option<Vec<ErrorClass>>,
}

impl<A, R: Clone> Clone for Hooks<A, R> {
    fn clone(&self) -> Self {
        Self {
            on_call: self.on_call.clone(),
            on_success: self.on_success.clone(),
            on_failure: self.on_failure.clone(),
            on_end: self.on_end.clone(),
            default_return: self.default_return.clone(),
            pass_vars: self.pass_vars.clone(),
            exception_classes: self.exception_classes.clone(),
        }
    }
}

impl<A, R: fmt::Debug> fmt::Debug for Hooks<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_call", &self.on_call)
            .field("on_success", &self.on_success)
            .field("on_failure", &self.on_failure)
            .field("on_end", &self.on_end)
            .field("default_return", &self.default_return)
            .field("pass_vars", &self.pass_vars)
            .field("exception_classes", &self.error_classes())
            .finish()
    }
}

impl<A, R: Default> Default for Hooks<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R: Default> Hooks<A, R> {
    /// Creates a configuration whose handled failures return `R::default()`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_return(R::default())
    }
}

impl<A, R> Hooks<A, R> {
    /// Creates a configuration whose handled failures return `value`.
    #[must_use]
    pub fn with_default_return(value: R) -> Self {
        Self {
            on_call: Callback::placeholder(),
            on_success: Callback::placeholder(),
            on_failure: Callback::placeholder(),
            on_end: Callback::placeholder(),
            default_return: value,
            pass_vars: None,
            exception_classes: None,
        }
    }

    /// Sets the callback run before the wrapped function.
    #[must_use]
    pub fn on_call<M>(mut self, callback: impl IntoCallback<A, R, M>) -> Self {
        self.on_call = callback.into_callback();
        self
    }

    /// Sets the callback run after a normal return.
    #[must_use]
    pub fn on_success<M>(mut self, callback: impl IntoCallback<A, R, M>) -> Self {
        self.on_success = callback.into_callback();
        self
    }

    /// Sets the callback run after a handled failure.
    #[must_use]
    pub fn on_failure<M>(mut self, callback: impl IntoCallback<A, R, M>) -> Self {
        self.on_failure = callback.into_callback();
        self
    }

    /// Sets the callback run at the end of every handled call.
    ///
    /// Setting it also means handled failures are absorbed: the wrapper
    /// returns the default value instead of re-raising.
    #[must_use]
    pub fn on_end<M>(mut self, callback: impl IntoCallback<A, R, M>) -> Self {
        self.on_end = callback.into_callback();
        self
    }

    /// Sets the value returned after a handled failure.
    #[must_use]
    pub fn default_return(mut self, value: R) -> Self {
        self.default_return = value;
        self
    }

    /// Sets the local variables captured for `on_end`.
    ///
    /// Names keep their order; duplicates are ignored.
    #[must_use]
    pub fn pass_vars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        self.pass_vars = Some(unique);
        self
    }

    /// Replaces the error classes that are handled.
    ///
    /// An empty list handles nothing: every error propagates.
    #[must_use]
    pub fn exception_classes(mut self, classes: impl IntoIterator<Item = ErrorClass>) -> Self {
        self.exception_classes = Some(classes.into_iter().collect());
        self
    }

    /// Handles errors of type `E`.
    ///
    /// The first call replaces the catch-all default; later calls add to the
    /// list.
    #[must_use]
    pub fn catch<E: Error + 'static>(mut self) -> Self {
        self.exception_classes
            .get_or_insert_with(Vec::new)
            .push(ErrorClass::of::<E>());
        self
    }

    /// Returns the callback in `slot`.
    #[must_use]
    pub fn callback(&self, slot: Slot) -> &Callback<A, R> {
        match slot {
            Slot::OnCall => &self.on_call,
            Slot::OnSuccess => &self.on_success,
            Slot::OnFailure => &self.on_failure,
            Slot::OnEnd => &self.on_end,
        }
    }

    /// Returns the value returned after a handled failure.
    #[must_use]
    pub fn default_value(&self) -> &R {
        &self.default_return
    }

    /// Returns the variable names captured for `on_end`.
    #[must_use]
    pub fn pass_var_names(&self) -> &[String] {
        self.pass_vars.as_deref().unwrap_or_default()
    }

    /// Returns the handled error classes; `[any]` unless configured.
    #[must_use]
    pub fn error_classes(&self) -> Vec<ErrorClass> {
        self.exception_classes
            .clone()
            .unwrap_or_else(|| vec![ErrorClass::any()])
    }

    /// Returns `true` if an error of this kind is handled.
    #[must_use]
    pub fn handles(&self, error: &(dyn Error + Send + Sync + 'static)) -> bool {
        match &self.exception_classes {
            Some(classes) => classes.iter().any(|class| class.matches(error)),
            None => true,
        }
    }

    /// Returns `true` if any configured callback declares `param`.
    #[must_use]
    pub fn wants(&self, param: &str) -> bool {
        Slot::ALL
            .iter()
            .any(|slot| self.callback(*slot).wants(param))
    }

    /// Validates the configuration.
    ///
    /// Wrappers run this on every call, before the wrapped function.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: callbacks are checked in
    /// slot order, then `pass_vars`. An `on_end` callback taking a plain
    /// `FuncResult` or `FuncException` is rejected, since one of the two is
    /// always missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for slot in Slot::ALL {
            let callback = self.callback(slot);
            if !callback.accepted_by(slot) {
                return Err(ConfigError::InvalidSignature {
                    slot,
                    expected: slot.allowed_params().join(","),
                    found: callback.params().join(","),
                });
            }
            if let Some(param) = slot
                .phase_dependent_params()
                .iter()
                .copied()
                .find(|param| callback.requires(param))
            {
                return Err(ConfigError::RequiredPhaseValue { slot, param });
            }
        }

        if let Some(names) = &self.pass_vars {
            if let Some(invalid) = names.iter().find(|name| !is_identifier(name)) {
                return Err(ConfigError::InvalidVariable(invalid.clone()));
            }
            if !names.is_empty() && self.on_end.is_placeholder() {
                return Err(ConfigError::PassVarsWithoutOnEnd);
            }
        }

        Ok(())
    }

    /// Wraps `target`.
    ///
    /// Positional arguments get no names in the keyword view; use
    /// [`wrap_named`](Self::wrap_named) to name them.
    #[must_use]
    pub fn wrap<F>(self, target: F) -> Hooked<A, R, F> {
        Hooked::new(self, Vec::new(), target)
    }

    /// Wraps `target`, naming its positional arguments for the keyword view.
    #[must_use]
    pub fn wrap_named<F, I, S>(self, arg_names: I, target: F) -> Hooked<A, R, F>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Hooked::new(self, arg_names.into_iter().map(Into::into).collect(), target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::background;
    use crate::param::{FuncArgs, FuncException, FuncKwargs, FuncResult, FuncScopeVars};
    use std::io;

    type TestHooks = Hooks<(i32,), i32>;

    #[test]
    fn defaults() {
        let hooks = TestHooks::new();

        for slot in Slot::ALL {
            assert!(hooks.callback(slot).is_placeholder());
        }
        assert_eq!(*hooks.default_value(), 0);
        assert!(hooks.pass_var_names().is_empty());
        assert_eq!(hooks.error_classes(), vec![ErrorClass::any()]);
        assert!(hooks.validate().is_ok());
    }

    #[test]
    fn supplied_values() {
        let hooks = TestHooks::with_default_return(-1)
            .on_call(|| {})
            .on_success(|_: FuncResult<i32>| {})
            .on_failure(|_: FuncException| {})
            .on_end(background(|_: FuncScopeVars| {}))
            .pass_vars(["var1", "var2", "var1"])
            .catch::<io::Error>();

        for slot in Slot::ALL {
            assert!(!hooks.callback(slot).is_placeholder());
        }
        assert!(hooks.callback(Slot::OnEnd).is_background());
        assert_eq!(*hooks.default_value(), -1);
        assert_eq!(hooks.pass_var_names(), ["var1", "var2"]);
        assert_eq!(
            hooks.error_classes(),
            vec![ErrorClass::of::<io::Error>()]
        );
        assert!(hooks.validate().is_ok());
    }

    #[test]
    fn invalid_signature_rejected() {
        let hooks = TestHooks::new().on_call(|_: FuncArgs<(i32,)>, _: FuncResult<i32>| {});

        let err = hooks.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidSignature {
                slot: Slot::OnCall,
                expected: "func_args,func_kwargs".into(),
                found: "func_args,func_result".into(),
            }
        );
        assert!(err.to_string().contains("`on_call`"));
    }

    #[test]
    fn scope_vars_only_offered_to_on_end() {
        let hooks = TestHooks::new().on_success(|_: FuncScopeVars| {});
        assert!(matches!(
            hooks.validate(),
            Err(ConfigError::InvalidSignature {
                slot: Slot::OnSuccess,
                ..
            })
        ));

        let hooks = TestHooks::new().on_failure(|_: FuncKwargs, _: FuncResult<i32>| {});
        assert!(matches!(
            hooks.validate(),
            Err(ConfigError::InvalidSignature {
                slot: Slot::OnFailure,
                ..
            })
        ));
    }

    #[test]
    fn on_end_must_take_result_and_exception_as_options() {
        let hooks = TestHooks::new().on_end(|_: FuncResult<i32>| {});
        assert_eq!(
            hooks.validate(),
            Err(ConfigError::RequiredPhaseValue {
                slot: Slot::OnEnd,
                param: "func_result",
            })
        );

        let hooks = TestHooks::new().on_end(|_: FuncArgs<(i32,)>, _: FuncException| {});
        let err = hooks.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::RequiredPhaseValue {
                slot: Slot::OnEnd,
                param: "func_exception",
            }
        );
        assert!(err.to_string().contains("`func_exception` as an `Option`"));

        let hooks = TestHooks::new()
            .on_success(|_: FuncResult<i32>| {})
            .on_failure(|_: FuncException| {})
            .on_end(|_: Option<FuncResult<i32>>, _: Option<FuncException>| {});
        assert!(hooks.validate().is_ok());
    }

    #[test]
    fn pass_vars_require_on_end() {
        let hooks = TestHooks::new().pass_vars(["x"]);
        assert_eq!(hooks.validate(), Err(ConfigError::PassVarsWithoutOnEnd));

        let hooks = TestHooks::new().pass_vars(["x"]).on_end(|| {});
        assert!(hooks.validate().is_ok());
    }

    #[test]
    fn empty_pass_vars_do_not_require_on_end() {
        let hooks = TestHooks::new().pass_vars(Vec::<String>::new());
        assert!(hooks.validate().is_ok());
    }

    #[test]
    fn pass_vars_must_be_identifiers() {
        for bad in ["", "1x", "a-b", "with space"] {
            let hooks = TestHooks::new().on_end(|| {}).pass_vars([bad]);
            assert_eq!(
                hooks.validate(),
                Err(ConfigError::InvalidVariable(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
        for good in ["x", "_private", "snake_case_1", "ünïcode"] {
            let hooks = TestHooks::new().on_end(|| {}).pass_vars([good]);
            assert!(hooks.validate().is_ok(), "{good:?} should be accepted");
        }
    }

    #[test]
    fn catch_replaces_catch_all_then_accumulates() {
        #[derive(Debug, thiserror::Error)]
        #[error("other")]
        struct Other;

        let hooks = TestHooks::new();
        assert!(hooks.handles(&Other));

        let hooks = hooks.catch::<io::Error>();
        assert!(!hooks.handles(&Other));
        assert!(hooks.handles(&io::Error::other("x")));

        let hooks = hooks.catch::<Other>();
        assert!(hooks.handles(&Other));
    }

    #[test]
    fn empty_exception_classes_handle_nothing() {
        let hooks = TestHooks::new().exception_classes(Vec::new());
        assert!(!hooks.handles(&io::Error::other("x")));
    }

    #[test]
    fn wants_reports_declared_params() {
        let hooks = TestHooks::new().on_success(|_: FuncKwargs| {});
        assert!(hooks.wants("func_kwargs"));
        assert!(!hooks.wants("func_args"));
    }
}
