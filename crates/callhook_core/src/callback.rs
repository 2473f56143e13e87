//! Callbacks and their invocation.
//!
//! A [`Callback`] is a type-erased function that receives the subset of the
//! call state it declared through its parameter types (see
//! [`param`](crate::param)). Plain functions and closures become callbacks
//! through [`IntoCallback`].
//!
//! # Blocking vs Background
//!
//! - **Blocking** callbacks run on the caller's thread. Their errors reach
//!   the caller of the wrapped function.
//! - **Background** callbacks, marked with [`background`], run on a detached
//!   thread. The wrapper does not wait for them; their errors and panics are
//!   logged and go no further.
//!
//! # Example
//!
//! ```
//! use callhook_core::callback::{background, Callback, IntoCallback, Slot};
//! use callhook_core::param::{FuncArgs, FuncResult};
//!
//! let blocking: Callback<(u32,), u32> =
//!     (|result: FuncResult<u32>, args: FuncArgs<(u32,)>| {
//!         assert!(*result >= args.0);
//!     })
//!     .into_callback();
//! assert_eq!(blocking.params(), ["func_result", "func_args"]);
//! assert!(blocking.accepted_by(Slot::OnSuccess));
//! assert!(!blocking.accepted_by(Slot::OnCall));
//!
//! let detached: Callback<(u32,), u32> = background(|| {}).into_callback();
//! assert!(detached.is_background());
//! ```

use core::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use variadics_please::all_tuples;

use crate::param::{BoxError, CallbackParam, Invocation, ParamError};

// ─────────────────────────────────────────────────────────────────────────────
// Slot
// ─────────────────────────────────────────────────────────────────────────────

/// The four lifecycle points a callback can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Before the wrapped function runs.
    OnCall,
    /// After the wrapped function returned normally.
    OnSuccess,
    /// After the wrapped function failed with a handled error.
    OnFailure,
    /// After every handled call, success or failure.
    OnEnd,
}

impl Slot {
    /// All slots, in protocol order.
    pub const ALL: [Slot; 4] = [Slot::OnCall, Slot::OnSuccess, Slot::OnFailure, Slot::OnEnd];

    /// Returns the slot name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Slot::OnCall => "on_call",
            Slot::OnSuccess => "on_success",
            Slot::OnFailure => "on_failure",
            Slot::OnEnd => "on_end",
        }
    }

    /// Returns the parameter names a callback in this slot may declare.
    #[must_use]
    pub const fn allowed_params(self) -> &'static [&'static str] {
        match self {
            Slot::OnCall => &["func_args", "func_kwargs"],
            Slot::OnSuccess => &["func_result", "func_args", "func_kwargs"],
            Slot::OnFailure => &["func_exception", "func_args", "func_kwargs"],
            Slot::OnEnd => &[
                "func_result",
                "func_exception",
                "func_args",
                "func_kwargs",
                "func_scope_vars",
            ],
        }
    }

    /// Returns the parameters this slot only sometimes has a value for.
    ///
    /// A callback must declare these as `Option<_>`.
    #[must_use]
    pub const fn phase_dependent_params(self) -> &'static [&'static str] {
        match self {
            Slot::OnEnd => &["func_result", "func_exception"],
            Slot::OnCall | Slot::OnSuccess | Slot::OnFailure => &[],
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CallbackError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors produced while invoking a callback.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// A declared parameter could not be resolved.
    #[error("parameter error: {0}")]
    Param(#[from] ParamError),

    /// The callback itself returned an error.
    #[error("{0}")]
    Failed(#[source] BoxError),

    /// The background thread could not be started.
    #[error("failed to spawn background callback: {0}")]
    Spawn(#[source] std::io::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// CallbackReturn
// ─────────────────────────────────────────────────────────────────────────────

/// Return types a callback may have.
///
/// Callbacks are synchronous: a function returning a future does not
/// implement this trait and cannot be turned into a callback.
pub trait CallbackReturn {
    /// Converts the callback's return value into a result.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::Failed`] if the callback reported an error.
    fn into_result(self) -> Result<(), CallbackError>;
}

impl CallbackReturn for () {
    fn into_result(self) -> Result<(), CallbackError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> CallbackReturn for Result<(), E> {
    fn into_result(self) -> Result<(), CallbackError> {
        self.map_err(|err| CallbackError::Failed(err.into()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Callback
// ─────────────────────────────────────────────────────────────────────────────

type Handler<A, R> = dyn Fn(&Invocation<A, R>) -> Result<(), CallbackError> + Send + Sync;

/// Type-erased lifecycle callback.
///
/// # Structure
///
/// - `name`: The function's type name, for logging
/// - `params`: Names of the values the callback declared
/// - `optional`: The subset of `params` declared as `Option<_>`
/// - `background`: Whether the callback runs on a detached thread
/// - `handler`: The function, or `None` for the placeholder
pub struct Callback<A, R> {
    name: &'static str,
    params: Vec<&'static str>,
    optional: Vec<&'static str>,
    background: bool,
    handler: Option<Arc<Handler<A, R>>>,
}

impl<A, R> Clone for Callback<A, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            params: self.params.clone(),
            optional: self.optional.clone(),
            background: self.background,
            handler: self.handler.clone(),
        }
    }
}

impl<A, R> fmt::Debug for Callback<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("background", &self.background)
            .field("placeholder", &self.is_placeholder())
            .finish()
    }
}

impl<A, R> Default for Callback<A, R> {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl<A, R> Callback<A, R> {
    /// The no-op placeholder filling unconfigured slots.
    ///
    /// It is told apart from user callbacks by [`is_placeholder`](Self::is_placeholder),
    /// even from a user callback that does nothing.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            name: "placeholder",
            params: Vec::new(),
            optional: Vec::new(),
            background: false,
            handler: None,
        }
    }

    /// Creates a callback from a raw handler and the parameter names it reads.
    ///
    /// Every name is treated as required; see [`with_optional`](Self::with_optional).
    #[must_use]
    pub fn from_handler(
        name: &'static str,
        params: Vec<&'static str>,
        handler: impl Fn(&Invocation<A, R>) -> Result<(), CallbackError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            params,
            optional: Vec::new(),
            background: false,
            handler: Some(Arc::new(handler)),
        }
    }

    /// Marks declared parameters whose absence the handler tolerates.
    #[must_use]
    pub fn with_optional(mut self, optional: Vec<&'static str>) -> Self {
        self.optional = optional;
        self
    }

    /// Marks this callback to run on a detached thread.
    #[must_use]
    pub fn in_background(mut self) -> Self {
        self.background = true;
        self
    }

    /// Returns `true` for the no-op placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.handler.is_none()
    }

    /// Returns `true` if the callback runs on a detached thread.
    #[must_use]
    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Returns the callback's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the names of the values this callback declared.
    #[must_use]
    pub fn params(&self) -> &[&'static str] {
        &self.params
    }

    /// Returns `true` if the callback declares `param`.
    #[must_use]
    pub fn wants(&self, param: &str) -> bool {
        self.params.contains(&param)
    }

    /// Returns `true` if the callback declares `param` and cannot run without it.
    #[must_use]
    pub fn requires(&self, param: &str) -> bool {
        self.wants(param) && !self.optional.contains(&param)
    }

    /// Returns `true` if every declared parameter is offered by `slot`.
    #[must_use]
    pub fn accepted_by(&self, slot: Slot) -> bool {
        self.params
            .iter()
            .all(|param| slot.allowed_params().contains(param))
    }
}

impl<A, R> Callback<A, R>
where
    A: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Invokes the callback for `slot`.
    ///
    /// Blocking callbacks run before this returns. Background callbacks get
    /// their own copy of the invocation and are started on a new thread that
    /// nobody joins.
    ///
    /// # Errors
    ///
    /// Returns the blocking callback's error, or [`CallbackError::Spawn`] if
    /// a background thread could not be started.
    pub fn invoke(&self, slot: Slot, invocation: &Invocation<A, R>) -> Result<(), CallbackError> {
        let Some(handler) = &self.handler else {
            return Ok(());
        };

        if !self.background {
            tracing::trace!(%slot, callback = self.name, "invoking callback");
            return handler(invocation);
        }

        let handler = Arc::clone(handler);
        let invocation = invocation.clone();
        let name = self.name;
        let _detached = thread::Builder::new()
            .name(format!("callhook-{slot}"))
            .spawn(move || run_detached(slot, name, &*handler, &invocation))
            .map_err(CallbackError::Spawn)?;
        tracing::trace!(%slot, callback = name, "background callback started");
        Ok(())
    }
}

fn run_detached<A, R>(
    slot: Slot,
    name: &'static str,
    handler: &Handler<A, R>,
    invocation: &Invocation<A, R>,
) {
    match catch_unwind(AssertUnwindSafe(|| handler(invocation))) {
        Ok(Ok(())) => tracing::trace!(%slot, callback = name, "background callback finished"),
        Ok(Err(err)) => {
            tracing::warn!(%slot, callback = name, error = %err, "background callback failed");
        }
        Err(_) => tracing::warn!(%slot, callback = name, "background callback panicked"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IntoCallback
// ─────────────────────────────────────────────────────────────────────────────

/// Converts a type into a [`Callback`].
///
/// Implemented for functions and closures taking up to eight
/// [`CallbackParam`]s and returning `()` or `Result<(), E>`, for
/// [`Background`] wrappers, and for `Callback` itself.
///
/// # Marker Types
///
/// The `Marker` type parameter allows multiple implementations for the same
/// function type (functions with different parameter counts).
pub trait IntoCallback<A, R, Marker>: Sized {
    /// Converts this into a callback.
    fn into_callback(self) -> Callback<A, R>;
}

impl<A, R> IntoCallback<A, R, ()> for Callback<A, R> {
    fn into_callback(self) -> Callback<A, R> {
        self
    }
}

/// Marker type for function callbacks.
pub struct FunctionMarker;

/// Marker type for [`Background`] callbacks.
pub struct BackgroundMarker;

// 0 parameters
impl<A, R, F, O> IntoCallback<A, R, (FunctionMarker, O)> for F
where
    A: 'static,
    R: 'static,
    F: Fn() -> O + Send + Sync + 'static,
    O: CallbackReturn,
{
    fn into_callback(self) -> Callback<A, R> {
        Callback::from_handler(core::any::type_name::<F>(), Vec::new(), move |_| {
            (self)().into_result()
        })
    }
}

macro_rules! impl_into_callback {
    ($($param:ident),*) => {
        impl<A, R, F, O, $($param),*> IntoCallback<A, R, (FunctionMarker, O, $($param,)*)> for F
        where
            A: 'static,
            R: 'static,
            F: Fn($($param),*) -> O + Send + Sync + 'static,
            O: CallbackReturn,
            $($param: CallbackParam<A, R>,)*
        {
            fn into_callback(self) -> Callback<A, R> {
                let optional = [$((
                    <$param as CallbackParam<A, R>>::NAME,
                    <$param as CallbackParam<A, R>>::OPTIONAL,
                )),*]
                .into_iter()
                .filter_map(|(name, optional)| optional.then_some(name))
                .collect();

                Callback::from_handler(
                    core::any::type_name::<F>(),
                    vec![$(<$param as CallbackParam<A, R>>::NAME),*],
                    move |invocation: &Invocation<A, R>| {
                        (self)($(<$param as CallbackParam<A, R>>::fetch(invocation)?),*).into_result()
                    },
                )
                .with_optional(optional)
            }
        }
    };
}

// Generate impls for callbacks with 1 to 8 parameters
all_tuples!(impl_into_callback, 1, 8, P);

/// A callback marked to run on a detached thread.
///
/// Created by [`background`].
pub struct Background<C>(C);

/// Marks a callback to run in the background.
///
/// The wrapper starts the callback on a new thread and returns without
/// waiting for it. There is no ordering between the callback's side effects
/// and the wrapper's return, and its errors never reach the caller.
///
/// # Example
///
/// ```
/// use callhook_core::callback::background;
/// use callhook_core::hooks::Hooks;
/// use callhook_core::param::FuncResult;
///
/// let hooks = Hooks::<(), u8>::new().on_end(background(|result: Option<FuncResult<u8>>| {
///     let _ = result;
/// }));
/// assert!(hooks.callback(callhook_core::callback::Slot::OnEnd).is_background());
/// ```
pub fn background<C>(callback: C) -> Background<C> {
    Background(callback)
}

impl<A, R, M, C> IntoCallback<A, R, (BackgroundMarker, M)> for Background<C>
where
    C: IntoCallback<A, R, M>,
{
    fn into_callback(self) -> Callback<A, R> {
        self.0.into_callback().in_background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{FuncArgs, FuncException, FuncKwargs, FuncResult, FuncScopeVars, Kwargs};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, mpsc};
    use std::time::Duration;

    type TestCallback = Callback<(i32,), i32>;

    fn invocation() -> Invocation<(i32,), i32> {
        Invocation::new(Arc::new((3,)), Arc::new(Kwargs::new()))
    }

    #[test]
    fn placeholder_is_distinguishable_from_noop() {
        let placeholder = TestCallback::placeholder();
        let noop: TestCallback = (|| {}).into_callback();

        assert!(placeholder.is_placeholder());
        assert!(!noop.is_placeholder());
        assert!(placeholder.invoke(Slot::OnCall, &invocation()).is_ok());
    }

    #[test]
    fn zero_param_callback_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let callback: TestCallback = (move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .into_callback();

        assert!(callback.params().is_empty());
        callback.invoke(Slot::OnCall, &invocation()).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn params_receive_declared_values() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let callback: TestCallback = (move |result: FuncResult<i32>, args: FuncArgs<(i32,)>| {
            *seen_clone.lock().unwrap() = Some((*result, args.0));
        })
        .into_callback();

        let invocation = invocation().with_result(Arc::new(9));
        callback.invoke(Slot::OnSuccess, &invocation).unwrap();

        assert_eq!(*seen.lock().unwrap(), Some((9, 3)));
    }

    #[test]
    fn params_report_declared_names_in_order() {
        let callback: TestCallback = (|_: FuncKwargs, _: Option<FuncException>, _: FuncScopeVars| {})
            .into_callback();

        assert_eq!(
            callback.params(),
            ["func_kwargs", "func_exception", "func_scope_vars"]
        );
        assert!(callback.wants("func_kwargs"));
        assert!(!callback.wants("func_args"));
    }

    #[test]
    fn slot_acceptance() {
        let uses_result: TestCallback = (|_: FuncResult<i32>| {}).into_callback();
        let uses_scope: TestCallback = (|_: FuncScopeVars| {}).into_callback();
        let uses_args: TestCallback = (|_: FuncArgs<(i32,)>| {}).into_callback();

        assert!(!uses_result.accepted_by(Slot::OnCall));
        assert!(uses_result.accepted_by(Slot::OnSuccess));
        assert!(!uses_result.accepted_by(Slot::OnFailure));
        assert!(uses_result.accepted_by(Slot::OnEnd));
        assert!(!uses_scope.accepted_by(Slot::OnSuccess));
        assert!(uses_scope.accepted_by(Slot::OnEnd));
        for slot in Slot::ALL {
            assert!(uses_args.accepted_by(slot));
        }
    }

    #[test]
    fn optional_params_are_not_required() {
        let callback: TestCallback =
            (|_: Option<FuncResult<i32>>, _: FuncException, _: FuncArgs<(i32,)>| {})
                .into_callback();

        assert!(!callback.requires("func_result"));
        assert!(callback.requires("func_exception"));
        assert!(callback.requires("func_args"));
        assert!(!callback.requires("func_kwargs"));
    }

    #[test]
    fn raw_handler_params_are_required_unless_marked() {
        let callback = TestCallback::from_handler("raw", vec!["func_result"], |_| Ok(()));
        assert!(callback.requires("func_result"));

        let callback = callback.with_optional(vec!["func_result"]);
        assert!(!callback.requires("func_result"));
    }

    #[test]
    fn only_on_end_has_phase_dependent_params() {
        assert_eq!(
            Slot::OnEnd.phase_dependent_params(),
            ["func_result", "func_exception"]
        );
        for slot in [Slot::OnCall, Slot::OnSuccess, Slot::OnFailure] {
            assert!(slot.phase_dependent_params().is_empty());
        }
    }

    #[test]
    fn missing_value_is_param_error() {
        let callback: TestCallback = (|_: FuncResult<i32>| {}).into_callback();

        let result = callback.invoke(Slot::OnCall, &invocation());
        assert!(matches!(
            result,
            Err(CallbackError::Param(ParamError::Unavailable("func_result")))
        ));
    }

    #[test]
    fn callback_error_propagates() {
        let callback: TestCallback =
            (|| -> Result<(), std::io::Error> { Err(std::io::Error::other("callback broke")) })
                .into_callback();

        let err = callback.invoke(Slot::OnCall, &invocation()).unwrap_err();
        assert!(matches!(err, CallbackError::Failed(_)));
        assert_eq!(err.to_string(), "callback broke");
    }

    #[test]
    fn background_marker_is_set() {
        let callback: TestCallback = background(|| {}).into_callback();
        assert!(callback.is_background());

        let callback: TestCallback = (|| {}).into_callback();
        assert!(!callback.is_background());
    }

    #[test]
    fn background_callback_runs_detached() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let callback: TestCallback = background(move |args: FuncArgs<(i32,)>| {
            started_tx.send(args.0).unwrap();
            let _ = release_rx.lock().unwrap().recv();
        })
        .into_callback();

        // Returns while the callback is still blocked.
        callback.invoke(Slot::OnEnd, &invocation()).unwrap();
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)), Ok(3));
        release_tx.send(()).unwrap();
    }

    #[test]
    fn background_errors_do_not_reach_caller() {
        let callback: TestCallback =
            background(|| -> Result<(), std::io::Error> { Err(std::io::Error::other("ignored")) })
                .into_callback();

        assert!(callback.invoke(Slot::OnEnd, &invocation()).is_ok());
    }

    #[test]
    fn slot_names() {
        let names: Vec<_> = Slot::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["on_call", "on_success", "on_failure", "on_end"]);
    }
}
