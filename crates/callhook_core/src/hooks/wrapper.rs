//! The wrapper that runs the call protocol.

use core::any::type_name;
use core::error::Error;
use core::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::kwargs::args_to_kwargs;
use super::{ConfigError, Hooks};
use crate::callback::{CallbackError, Slot};
use crate::param::{BoxError, CallbackParam, FuncError, FuncKwargs, Invocation, Kwargs};
use crate::scope;

/// Errors returned by a wrapped function.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// The hooks configuration is invalid. The wrapped function did not run.
    #[error("invalid hooks configuration: {0}")]
    Config(#[from] ConfigError),

    /// The wrapped function's own error, passed through unchanged.
    ///
    /// Either the error was not handled, or it was handled and no `on_end`
    /// callback was set.
    #[error(transparent)]
    Target(FuncError),

    /// A blocking callback failed. The remaining callbacks did not run.
    #[error("`{slot}` callback failed: {source}")]
    Callback {
        /// The slot whose callback failed.
        slot: Slot,
        /// The callback's error.
        source: CallbackError,
    },

    /// The arguments could not be turned into their keyword view.
    #[error("failed to build keyword arguments: {0}")]
    Arguments(#[from] serde_json::Error),
}

impl HookError {
    /// Returns the wrapped function's error, if that is what this is.
    #[must_use]
    pub fn target_error(&self) -> Option<&FuncError> {
        match self {
            Self::Target(error) => Some(error),
            _ => None,
        }
    }

    /// Returns the wrapped function's error as an `E`.
    #[must_use]
    pub fn downcast_target<E: Error + 'static>(&self) -> Option<&E> {
        self.target_error()?.downcast_ref::<E>()
    }
}

enum Outcome<R> {
    Returned(Arc<R>),
    Failed(FuncError),
}

/// A function wrapped with [`Hooks`].
///
/// Created by [`Hooks::wrap`] and [`Hooks::wrap_named`]. Cloning is cheap
/// when the function is.
pub struct Hooked<A, R, F> {
    hooks: Arc<Hooks<A, R>>,
    arg_names: Vec<String>,
    target: F,
    name: &'static str,
}

impl<A, R, F: Clone> Clone for Hooked<A, R, F> {
    fn clone(&self) -> Self {
        Self {
            hooks: Arc::clone(&self.hooks),
            arg_names: self.arg_names.clone(),
            target: self.target.clone(),
            name: self.name,
        }
    }
}

impl<A, R: fmt::Debug, F> fmt::Debug for Hooked<A, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooked")
            .field("name", &self.name)
            .field("arg_names", &self.arg_names)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl<A, R, F> Hooked<A, R, F> {
    pub(super) fn new(hooks: Hooks<A, R>, arg_names: Vec<String>, target: F) -> Self {
        Self {
            hooks: Arc::new(hooks),
            arg_names,
            target,
            name: type_name::<F>(),
        }
    }

    /// Wraps another function with the same, shared configuration.
    #[must_use]
    pub fn rewrap<G>(&self, target: G) -> Hooked<A, R, G> {
        Hooked {
            hooks: Arc::clone(&self.hooks),
            arg_names: Vec::new(),
            target,
            name: type_name::<G>(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn hooks(&self) -> &Hooks<A, R> {
        &self.hooks
    }

    /// Returns the wrapped function's type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the names bound to positional arguments.
    #[must_use]
    pub fn arg_names(&self) -> &[String] {
        &self.arg_names
    }

    /// Calls the wrapped function, running the configured callbacks.
    ///
    /// Returns the function's value on success, and the default value after
    /// a handled failure when `on_end` is set.
    ///
    /// # Errors
    ///
    /// - [`HookError::Config`] if the configuration is invalid
    /// - [`HookError::Target`] if the function failed with an unhandled
    ///   error, or with a handled one and `on_end` is unset
    /// - [`HookError::Callback`] if a blocking callback failed
    /// - [`HookError::Arguments`] if a callback wants keyword arguments and
    ///   they could not be serialized
    pub fn call<E>(&self, args: A) -> Result<R, HookError>
    where
        F: Fn(A) -> Result<R, E>,
        E: Into<BoxError>,
        A: Clone + Serialize + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
    {
        let hooks = &*self.hooks;
        hooks.validate()?;

        let call_id = nanoid::nanoid!(10);
        let span = tracing::debug_span!("hooked_call", function = self.name, %call_id);
        let _entered = span.enter();

        let kwargs = if hooks.wants(<FuncKwargs as CallbackParam<A, R>>::NAME) {
            args_to_kwargs(&args, &self.arg_names)?
        } else {
            Kwargs::new()
        };
        let base = Invocation::new(Arc::new(args.clone()), Arc::new(kwargs));

        let capture = scope::install(hooks.pass_var_names().iter().cloned());
        run(hooks, Slot::OnCall, &base)?;

        let (outcome, scope_vars) = match (self.target)(args) {
            Ok(value) => {
                let scope_vars = Arc::new(capture.extract());
                let result = Arc::new(value);
                run(hooks, Slot::OnSuccess, &base.clone().with_result(Arc::clone(&result)))?;
                (Outcome::Returned(result), scope_vars)
            }
            Err(err) => {
                let boxed: BoxError = err.into();
                let error: FuncError = Arc::from(boxed);
                if !hooks.handles(&*error) {
                    tracing::debug!(%error, "error not handled");
                    return Err(HookError::Target(error));
                }
                let scope_vars = Arc::new(capture.extract());
                run(hooks, Slot::OnFailure, &base.clone().with_exception(Arc::clone(&error)))?;
                (Outcome::Failed(error), scope_vars)
            }
        };
        capture.uninstall();

        let on_end = hooks.callback(Slot::OnEnd);
        if on_end.is_placeholder() {
            if let Outcome::Failed(error) = &outcome {
                tracing::debug!(%error, "no on_end callback, raising handled error");
                return Err(HookError::Target(Arc::clone(error)));
            }
        } else {
            let invocation = match &outcome {
                Outcome::Returned(result) => base.with_result(Arc::clone(result)),
                Outcome::Failed(error) => base.with_exception(Arc::clone(error)),
            };
            run(hooks, Slot::OnEnd, &invocation.with_scope_vars(scope_vars))?;
        }

        match outcome {
            Outcome::Returned(result) => {
                Ok(Arc::try_unwrap(result).unwrap_or_else(|shared| R::clone(&shared)))
            }
            Outcome::Failed(_) => Ok(hooks.default_value().clone()),
        }
    }
}

fn run<A, R>(hooks: &Hooks<A, R>, slot: Slot, invocation: &Invocation<A, R>) -> Result<(), HookError>
where
    A: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    hooks
        .callback(slot)
        .invoke(slot, invocation)
        .map_err(|source| HookError::Callback { slot, source })
}
