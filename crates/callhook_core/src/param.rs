//! Callback parameter injection.
//!
//! Callbacks declare what they want to receive through the types of their
//! parameters. Each parameter type implements [`CallbackParam`] and is
//! resolved from the [`Invocation`] of the current call right before the
//! callback runs. A callback that declares nothing receives nothing.
//!
//! # Core Types
//!
//! - [`FuncArgs<A>`] - The positional arguments of the wrapped call
//! - [`FuncKwargs`] - Named view of the arguments
//! - [`FuncResult<R>`] - The wrapped function's return value
//! - [`FuncException`] - The error returned by the wrapped function
//! - [`FuncScopeVars`] - Local variables captured at return
//!
//! `Option<P>` can be used for values that may be absent in a phase.
//! `on_end` sees either a result or an error, never both, so it must take
//! `func_result` and `func_exception` as `Option<FuncResult<R>>` and
//! `Option<FuncException>`; validation rejects the plain forms there.
//!
//! # Example
//!
//! ```
//! use callhook_core::param::{FuncArgs, FuncResult};
//!
//! // Receives only the arguments and the result, in any order.
//! fn audit(result: FuncResult<u32>, args: FuncArgs<(u32, u32)>) {
//!     assert_eq!(*result, args.0 + args.1);
//! }
//! # let _ = audit;
//! ```

use core::error::Error;
use core::fmt;
use core::ops::Deref;
use std::sync::Arc;

use crate::scope::ScopeVars;

/// Keyword view of a call's arguments.
pub type Kwargs = serde_json::Map<String, serde_json::Value>;

/// Owned, type-erased error.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Shared handle to the error returned by a wrapped function.
///
/// The same instance is handed to `on_failure`, `on_end` and, when the
/// error is re-raised, to the caller.
pub type FuncError = Arc<dyn Error + Send + Sync + 'static>;

/// Errors that can occur when resolving callback parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// The value is not part of the current lifecycle phase.
    #[error("parameter `{0}` is not available in this phase")]
    Unavailable(&'static str),
}

// ─────────────────────────────────────────────────────────────────────────────
// Invocation
// ─────────────────────────────────────────────────────────────────────────────

/// State of one call of a wrapped function.
///
/// Every field is reference counted, so cloning an invocation is cheap and a
/// background callback can keep its own copy after the wrapper returned.
pub struct Invocation<A, R> {
    args: Arc<A>,
    kwargs: Arc<Kwargs>,
    result: Option<Arc<R>>,
    exception: Option<FuncError>,
    scope_vars: Option<Arc<ScopeVars>>,
}

impl<A, R> Clone for Invocation<A, R> {
    fn clone(&self) -> Self {
        Self {
            args: Arc::clone(&self.args),
            kwargs: Arc::clone(&self.kwargs),
            result: self.result.clone(),
            exception: self.exception.clone(),
            scope_vars: self.scope_vars.clone(),
        }
    }
}

impl<A, R> Invocation<A, R> {
    /// Creates the invocation state for a call that has not run yet.
    #[must_use]
    pub fn new(args: Arc<A>, kwargs: Arc<Kwargs>) -> Self {
        Self {
            args,
            kwargs,
            result: None,
            exception: None,
            scope_vars: None,
        }
    }

    /// Builder pattern: records the wrapped function's return value.
    #[must_use]
    pub fn with_result(mut self, result: Arc<R>) -> Self {
        self.result = Some(result);
        self
    }

    /// Builder pattern: records the wrapped function's error.
    #[must_use]
    pub fn with_exception(mut self, exception: FuncError) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Builder pattern: records the captured scope variables.
    #[must_use]
    pub fn with_scope_vars(mut self, scope_vars: Arc<ScopeVars>) -> Self {
        self.scope_vars = Some(scope_vars);
        self
    }

    /// Returns the positional arguments.
    #[must_use]
    pub fn args(&self) -> &A {
        &self.args
    }

    /// Returns the keyword view of the arguments.
    #[must_use]
    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    /// Returns the wrapped function's result, if it returned normally.
    #[must_use]
    pub fn result(&self) -> Option<&R> {
        self.result.as_deref()
    }

    /// Returns the wrapped function's error, if it failed.
    #[must_use]
    pub fn exception(&self) -> Option<&FuncError> {
        self.exception.as_ref()
    }

    /// Returns the captured scope variables, once extracted.
    #[must_use]
    pub fn scope_vars(&self) -> Option<&ScopeVars> {
        self.scope_vars.as_deref()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CallbackParam
// ─────────────────────────────────────────────────────────────────────────────

/// A parameter that can be injected into a callback.
///
/// The [`NAME`](Self::NAME) is what slot validation checks against: a slot
/// only accepts callbacks whose parameter names are all in its allowed set.
pub trait CallbackParam<A, R>: Sized {
    /// Name under which this value is offered to callbacks.
    const NAME: &'static str;

    /// Whether a missing value resolves to `None` instead of an error.
    const OPTIONAL: bool = false;

    /// Fetches this parameter from the invocation state.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Unavailable`] if the value is not part of the
    /// current phase.
    fn fetch(invocation: &Invocation<A, R>) -> Result<Self, ParamError>;
}

/// Positional arguments of the wrapped call.
pub struct FuncArgs<A>(Arc<A>);

impl<A> Deref for FuncArgs<A> {
    type Target = A;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<A, R> CallbackParam<A, R> for FuncArgs<A> {
    const NAME: &'static str = "func_args";

    fn fetch(invocation: &Invocation<A, R>) -> Result<Self, ParamError> {
        Ok(Self(Arc::clone(&invocation.args)))
    }
}

/// Keyword view of the wrapped call's arguments.
///
/// Positional arguments are bound to the names given to
/// [`Hooks::wrap_named`](crate::hooks::Hooks::wrap_named); struct arguments
/// contribute their field names.
pub struct FuncKwargs(Arc<Kwargs>);

impl Deref for FuncKwargs {
    type Target = Kwargs;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<A, R> CallbackParam<A, R> for FuncKwargs {
    const NAME: &'static str = "func_kwargs";

    fn fetch(invocation: &Invocation<A, R>) -> Result<Self, ParamError> {
        Ok(Self(Arc::clone(&invocation.kwargs)))
    }
}

/// The wrapped function's return value.
pub struct FuncResult<R>(Arc<R>);

impl<R> Deref for FuncResult<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<A, R> CallbackParam<A, R> for FuncResult<R> {
    const NAME: &'static str = "func_result";

    fn fetch(invocation: &Invocation<A, R>) -> Result<Self, ParamError> {
        invocation
            .result
            .as_ref()
            .map(|result| Self(Arc::clone(result)))
            .ok_or(ParamError::Unavailable(<Self as CallbackParam<A, R>>::NAME))
    }
}

/// The error returned by the wrapped function.
pub struct FuncException(FuncError);

impl FuncException {
    /// Returns the shared error handle.
    #[must_use]
    pub fn error(&self) -> &FuncError {
        &self.0
    }

    /// Consumes the parameter, returning the shared error handle.
    #[must_use]
    pub fn into_inner(self) -> FuncError {
        self.0
    }
}

impl Deref for FuncException {
    type Target = dyn Error + Send + Sync + 'static;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Display for FuncException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl<A, R> CallbackParam<A, R> for FuncException {
    const NAME: &'static str = "func_exception";

    fn fetch(invocation: &Invocation<A, R>) -> Result<Self, ParamError> {
        invocation
            .exception
            .as_ref()
            .map(|exception| Self(Arc::clone(exception)))
            .ok_or(ParamError::Unavailable(<Self as CallbackParam<A, R>>::NAME))
    }
}

/// Local variables of the wrapped function, captured at its return.
pub struct FuncScopeVars(Arc<ScopeVars>);

impl Deref for FuncScopeVars {
    type Target = ScopeVars;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for FuncScopeVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl<A, R> CallbackParam<A, R> for FuncScopeVars {
    const NAME: &'static str = "func_scope_vars";

    fn fetch(invocation: &Invocation<A, R>) -> Result<Self, ParamError> {
        invocation
            .scope_vars
            .as_ref()
            .map(|vars| Self(Arc::clone(vars)))
            .ok_or(ParamError::Unavailable(<Self as CallbackParam<A, R>>::NAME))
    }
}

/// Optional parameter access.
///
/// Returns `None` if the value is not part of the current phase instead of
/// erroring.
impl<A, R, P: CallbackParam<A, R>> CallbackParam<A, R> for Option<P> {
    const NAME: &'static str = P::NAME;
    const OPTIONAL: bool = true;

    fn fetch(invocation: &Invocation<A, R>) -> Result<Self, ParamError> {
        match P::fetch(invocation) {
            Ok(param) => Ok(Some(param)),
            Err(ParamError::Unavailable(_)) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn invocation() -> Invocation<(i32, &'static str), String> {
        let mut kwargs = Kwargs::new();
        kwargs.insert("x".into(), 7.into());
        Invocation::new(Arc::new((7, "seven")), Arc::new(kwargs))
    }

    #[test]
    fn args_and_kwargs_always_available() {
        let invocation = invocation();

        let args = FuncArgs::fetch(&invocation).unwrap();
        assert_eq!(*args, (7, "seven"));

        let kwargs = <FuncKwargs as CallbackParam<_, String>>::fetch(&invocation).unwrap();
        assert_eq!(kwargs.get("x"), Some(&serde_json::Value::from(7)));
    }

    #[test]
    fn result_missing_before_return() {
        let invocation = invocation();

        let result = FuncResult::fetch(&invocation);
        assert!(matches!(result, Err(ParamError::Unavailable("func_result"))));
    }

    #[test]
    fn result_fetch_after_return() {
        let invocation = invocation().with_result(Arc::new("done".to_string()));

        let result = FuncResult::fetch(&invocation).unwrap();
        assert_eq!(result.as_str(), "done");
    }

    #[test]
    fn exception_shares_instance() {
        let error: FuncError = Arc::new(io::Error::other("boom"));
        let invocation = invocation().with_exception(Arc::clone(&error));

        let exception = <FuncException as CallbackParam<_, String>>::fetch(&invocation).unwrap();
        assert!(Arc::ptr_eq(exception.error(), &error));
        assert_eq!(exception.to_string(), "boom");
    }

    #[test]
    fn optional_param_yields_none_when_unavailable() {
        let invocation = invocation();

        let exception =
            <Option<FuncException> as CallbackParam<_, String>>::fetch(&invocation).unwrap();
        assert!(exception.is_none());

        let scope = <Option<FuncScopeVars> as CallbackParam<_, String>>::fetch(&invocation).unwrap();
        assert!(scope.is_none());
    }

    #[test]
    fn optional_param_shares_name() {
        assert_eq!(
            <Option<FuncResult<String>> as CallbackParam<(), String>>::NAME,
            "func_result"
        );
        assert!(<Option<FuncResult<String>> as CallbackParam<(), String>>::OPTIONAL);
        assert!(!<FuncResult<String> as CallbackParam<(), String>>::OPTIONAL);
    }

    #[test]
    fn scope_vars_fetch_after_extraction() {
        let invocation = invocation().with_scope_vars(Arc::new(ScopeVars::default()));

        let vars = <FuncScopeVars as CallbackParam<_, String>>::fetch(&invocation).unwrap();
        assert!(vars.is_empty());
    }
}
