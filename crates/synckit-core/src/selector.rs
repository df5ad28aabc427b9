//! Resilient selectors
//!
//! Every selector a UI calls goes through [`resilient`]. Whatever goes wrong
//! while it evaluates (an error, a misconfigured comparison predicate, a
//! panicking callback) is logged once, reported as
//! [`StoreEvent::SelectorFailed`], and replaced by the selector's documented
//! fallback.
//!
//! The direct `check_*`/`try_*` accessors on the stores skip this wrapper and
//! return the error instead.
//!
//! A panic inside a selector is reported through `tracing` only. The first
//! call installs a panic hook that stays silent for panics raised while a
//! selector evaluates and forwards every other panic to the hook that was
//! installed before. A hook installed later by the application replaces it.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use tracing::error;

use crate::error::Result;
use crate::events::{EventSink, StoreEvent};

/// Evaluate a selector, converting any failure into `fallback`
pub fn resilient<T>(
    events: &EventSink,
    selector: &str,
    fallback: T,
    evaluate: impl FnOnce() -> Result<T>,
) -> T {
    install_panic_hook();

    let outer = IN_SELECTOR.with(|flag| flag.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(evaluate));
    IN_SELECTOR.with(|flag| flag.set(outer));

    let failure = match outcome {
        Ok(Ok(value)) => return value,
        Ok(Err(e)) => e.to_string(),
        Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
    };

    error!(selector, error = %failure, "Selector failed, returning fallback value");
    events.emit(StoreEvent::SelectorFailed {
        selector: selector.to_string(),
        error: failure,
    });
    fallback
}

thread_local! {
    static IN_SELECTOR: Cell<bool> = const { Cell::new(false) };
}

fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !IN_SELECTOR.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
