//! Built-in middleware: request logging and panic recovery.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::context::Context;

/// Log method, path, final status and elapsed time once the rest of the chain has run.
pub fn logger() -> impl Fn(&mut Context) + Send + Sync + 'static {
    |c: &mut Context| {
        let start = Instant::now();
        c.next();
        tracing::info!(
            status = c.effective_status(),
            method = %c.method(),
            path = %c.path(),
            elapsed = ?start.elapsed(),
            "request handled"
        );
    }
}

/// Turn a panic in any downstream handler into `500 {"message":"Internal Server Error"}`.
///
/// Without this middleware a panicking handler unwinds the connection task that is
/// serving the request.
pub fn recovery() -> impl Fn(&mut Context) + Send + Sync + 'static {
    |c: &mut Context| {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| c.next())) {
            tracing::error!(
                panic = %panic_message(payload.as_ref()),
                method = %c.method(),
                path = %c.path(),
                "handler panicked"
            );
            c.fail(500, "Internal Server Error");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
