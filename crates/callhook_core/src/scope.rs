//! Scope capture for wrapped functions.
//!
//! A wrapped function publishes the local variables it is willing to hand to
//! `on_end` with [`expose!`](crate::expose) (or [`expose`]). While a call is
//! being wrapped, a capture frame is installed for it; exposed values land
//! in that frame, later values overwriting earlier ones, so what the frame
//! holds when the function returns is the function's scope at its return
//! point.
//!
//! # Frames
//!
//! Frames live on a thread-local stack. Every wrapped call pushes its own
//! frame and pops it when its [`CaptureGuard`] is dropped:
//!
//! ```text
//! outer call ── install ─────────────────────────────── uninstall
//!                  │ expose!(a)    inner call ── install ── uninstall
//!                  │                    │ expose!(a)   (inner frame)
//!                  └─ outer frame keeps its own `a`
//! ```
//!
//! Nested wrapped calls therefore never clobber each other's buffers, and
//! calls on different threads never see each other's frames.
//!
//! # Example
//!
//! ```
//! use callhook_core::expose;
//! use callhook_core::scope;
//!
//! let guard = scope::install(["total".to_string()]);
//! let total = 40 + 2;
//! expose!(total);
//!
//! let vars = guard.extract();
//! assert_eq!(vars.get::<i32>("total"), Some(&42));
//! ```

use core::any::Any;
use core::cell::RefCell;
use core::fmt;
use core::marker::PhantomData;
use std::sync::Arc;

use hashbrown::HashMap;

/// Marker value standing in for requested variables the function never
/// exposed.
pub const NOT_FOUND: &str = "<not-found>";

// ─────────────────────────────────────────────────────────────────────────────
// Captured values
// ─────────────────────────────────────────────────────────────────────────────

/// A type-erased copy of an exposed local variable.
#[derive(Clone)]
pub struct CapturedValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    debug: fn(&(dyn Any + Send + Sync), &mut fmt::Formatter<'_>) -> fmt::Result,
}

fn debug_as<T: fmt::Debug + 'static>(
    value: &(dyn Any + Send + Sync),
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    match value.downcast_ref::<T>() {
        Some(value) => fmt::Debug::fmt(value, f),
        None => f.write_str("<?>"),
    }
}

impl CapturedValue {
    /// Copies a value into a captured value.
    #[must_use]
    pub fn new<T>(value: &T) -> Self
    where
        T: Clone + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            value: Arc::new(value.clone()),
            type_name: core::any::type_name::<T>(),
            debug: debug_as::<T>,
        }
    }

    /// Returns the value if it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns the name of the captured value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for CapturedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.debug)(&*self.value, f)
    }
}

/// Value of a requested scope variable.
#[derive(Clone)]
pub enum ScopeValue {
    /// The function exposed the variable.
    Captured(CapturedValue),
    /// The function never exposed the variable. Displays as `<not-found>`.
    NotFound,
}

impl ScopeValue {
    /// Returns `true` for the `<not-found>` marker.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScopeValue::NotFound)
    }

    /// Returns the value if it was captured and has type `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            ScopeValue::Captured(value) => value.downcast_ref::<T>(),
            ScopeValue::NotFound => None,
        }
    }
}

impl fmt::Debug for ScopeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeValue::Captured(value) => fmt::Debug::fmt(value, f),
            ScopeValue::NotFound => f.write_str(NOT_FOUND),
        }
    }
}

impl fmt::Display for ScopeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Requested variable names mapped to their captured values.
///
/// Entries keep the order in which the names were requested.
#[derive(Clone, Default)]
pub struct ScopeVars {
    entries: Vec<(String, ScopeValue)>,
}

impl ScopeVars {
    /// Returns the entry for `name`, if it was requested.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&ScopeValue> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// Returns the captured value of `name` if it exists and has type `T`.
    #[must_use]
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.value(name).and_then(ScopeValue::downcast_ref::<T>)
    }

    /// Returns `true` if `name` was requested but never exposed.
    #[must_use]
    pub fn is_not_found(&self, name: &str) -> bool {
        self.value(name).is_some_and(ScopeValue::is_not_found)
    }

    /// Iterates over requested names and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScopeValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of requested variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no variables were requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ScopeVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frames
// ─────────────────────────────────────────────────────────────────────────────

struct Frame {
    wanted: Vec<String>,
    locals: HashMap<String, CapturedValue>,
}

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Installs a capture frame for the current call.
///
/// Only the `wanted` names are recorded; exposing anything else is a no-op.
/// The frame is removed when the returned guard is dropped.
#[must_use = "the capture frame is removed as soon as the guard is dropped"]
pub fn install(wanted: impl IntoIterator<Item = String>) -> CaptureGuard {
    let frame = Frame {
        wanted: wanted.into_iter().collect(),
        locals: HashMap::new(),
    };
    let depth = FRAMES.with_borrow_mut(|frames| {
        frames.push(frame);
        frames.len() - 1
    });
    tracing::trace!(depth, "scope capture installed");
    CaptureGuard {
        depth,
        _not_send: PhantomData,
    }
}

/// Records a local variable into the innermost capture frame.
///
/// The value is only cloned if the active call asked for `name`. Outside of
/// a wrapped call this does nothing.
pub fn expose<T>(name: &str, value: &T)
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    FRAMES.with_borrow_mut(|frames| {
        let Some(frame) = frames.last_mut() else {
            return;
        };
        if frame.wanted.iter().any(|wanted| wanted == name) {
            frame
                .locals
                .insert(name.to_owned(), CapturedValue::new(value));
        }
    });
}

/// Returns `true` if a capture frame is installed on this thread.
#[must_use]
pub fn is_active() -> bool {
    FRAMES.with_borrow(|frames| !frames.is_empty())
}

/// Exposes local variables to the active scope capture, by name.
///
/// ```
/// # use callhook_core::expose;
/// let id = 2;
/// let label = String::from("saved");
/// expose!(id, label);
/// ```
#[macro_export]
macro_rules! expose {
    ($($var:ident),+ $(,)?) => {
        $( $crate::scope::expose(::core::stringify!($var), &$var); )+
    };
}

/// Handle to the capture frame of one wrapped call.
///
/// Dropping the guard uninstalls the frame (and any frame a misbehaving
/// nested call left above it), including during unwinding.
pub struct CaptureGuard {
    depth: usize,
    // Frames are thread-local; the guard must be dropped on the thread that
    // installed it.
    _not_send: PhantomData<*const ()>,
}

impl CaptureGuard {
    /// Extracts the requested variables from the frame.
    ///
    /// Names that were never exposed map to [`ScopeValue::NotFound`]. The
    /// frame's buffer is cleared afterwards.
    #[must_use]
    pub fn extract(&self) -> ScopeVars {
        FRAMES.with_borrow_mut(|frames| {
            let Some(frame) = frames.get_mut(self.depth) else {
                return ScopeVars::default();
            };
            let mut locals = core::mem::take(&mut frame.locals);
            let entries = frame
                .wanted
                .iter()
                .map(|name| {
                    let value = locals
                        .remove(name)
                        .map_or(ScopeValue::NotFound, ScopeValue::Captured);
                    (name.clone(), value)
                })
                .collect();
            ScopeVars { entries }
        })
    }

    /// Uninstalls the frame.
    pub fn uninstall(self) {
        drop(self);
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        // `try_with` because the guard may be dropped during thread teardown.
        let _ = FRAMES.try_with(|frames| frames.borrow_mut().truncate(self.depth));
        tracing::trace!(depth = self.depth, "scope capture uninstalled");
    }
}
