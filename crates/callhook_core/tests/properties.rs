//! Property-based tests for the call protocol and scope capture.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::io;
use std::sync::{Arc, Mutex};

use callhook_core::prelude::*;
use callhook_core::scope;
use proptest::prelude::*;

const NAMES: [&str; 5] = ["a", "b", "c", "d", "e"];

fn arb_names() -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(prop::sample::select(NAMES.to_vec()), 0..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// A successful call returns the target's value whatever callbacks are set.
    #[test]
    fn success_returns_target_value(
        value in any::<i64>(),
        default in any::<i64>(),
        with_on_end in any::<bool>(),
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let (c1, c2, f) = (Arc::clone(&calls), Arc::clone(&calls), Arc::clone(&failures));

        let mut hooks = Hooks::<(i64,), i64>::with_default_return(default)
            .on_call(move || { c1.fetch_add(1, Ordering::SeqCst); })
            .on_success(move || { c2.fetch_add(1, Ordering::SeqCst); })
            .on_failure(move || { f.fetch_add(1, Ordering::SeqCst); });
        if with_on_end {
            hooks = hooks.on_end(|| {});
        }
        let wrapped = hooks.wrap(|(x,): (i64,)| Ok::<_, io::Error>(x));

        prop_assert_eq!(wrapped.call((value,)).unwrap(), value);
        prop_assert_eq!(calls.load(Ordering::SeqCst), 2);
        prop_assert_eq!(failures.load(Ordering::SeqCst), 0);
    }

    /// A handled failure returns `default_return` when `on_end` is set and
    /// re-raises otherwise.
    #[test]
    fn handled_failure_outcome_depends_on_on_end(
        default in any::<i64>(),
        with_on_end in any::<bool>(),
    ) {
        let mut hooks = Hooks::<(), i64>::with_default_return(default);
        if with_on_end {
            hooks = hooks.on_end(|| {});
        }
        let wrapped = hooks.wrap(|()| Err::<i64, _>(io::Error::other("failed")));

        match wrapped.call(()) {
            Ok(returned) => {
                prop_assert!(with_on_end);
                prop_assert_eq!(returned, default);
            }
            Err(err) => {
                prop_assert!(!with_on_end);
                prop_assert!(err.downcast_target::<io::Error>().is_some());
            }
        }
    }

    /// Every requested name is either the last exposed value or `<not-found>`,
    /// in request order without duplicates.
    #[test]
    fn scope_vars_cover_requested_names(
        wanted in arb_names(),
        exposed in prop::collection::vec((prop::sample::select(NAMES.to_vec()), any::<u16>()), 0..8),
    ) {
        let captured: Arc<Mutex<Vec<(String, Option<u16>)>>> = Arc::default();
        let captured_clone = Arc::clone(&captured);
        let to_expose = exposed.clone();

        let wrapped = Hooks::<(), ()>::new()
            .pass_vars(wanted.iter().copied())
            .on_end(move |vars: FuncScopeVars| {
                let entries = vars
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.downcast_ref::<u16>().copied()))
                    .collect();
                *captured_clone.lock().unwrap() = entries;
            })
            .wrap(move |()| {
                for (name, value) in &to_expose {
                    scope::expose(name, value);
                }
                Ok::<_, io::Error>(())
            });
        wrapped.call(()).unwrap();

        let mut expected_names: Vec<&str> = Vec::new();
        for &name in &wanted {
            if !expected_names.contains(&name) {
                expected_names.push(name);
            }
        }
        let expected: Vec<(String, Option<u16>)> = expected_names
            .into_iter()
            .map(|name| {
                let last = exposed.iter().rev().find(|(exposed, _)| *exposed == name);
                (name.to_string(), last.map(|(_, value)| *value))
            })
            .collect();

        prop_assert_eq!(&*captured.lock().unwrap(), &expected);
        prop_assert!(!scope::is_active());
    }
}
