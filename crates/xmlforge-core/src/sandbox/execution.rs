//! Execution controls: dedicated worker thread, wall-clock timeout, panic capture.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;

use super::error::{SandboxError, SandboxResult};

/// Stack reserved for each worker. The interpreter bounds its own nesting,
/// and this leaves room for that bound in unoptimised builds.
pub const WORKER_STACK_BYTES: usize = 32 * 1024 * 1024;

/// Run `work` on its own thread and wait at most `timeout` for it.
///
/// A panic inside `work` is reported as [`SandboxError::Aborted`]. On timeout
/// the thread is detached rather than killed, so `work` must carry its own
/// deadline; the interpreter checks the one in its `ExecutionLimits`.
pub async fn run_isolated<T, F>(name: &str, timeout: Duration, work: F) -> SandboxResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name(name.to_string())
        .stack_size(WORKER_STACK_BYTES)
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work));
            // The receiver is gone when the caller already timed out.
            let _ = tx.send(outcome);
        })?;

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(payload))) => Err(SandboxError::Aborted {
            reason: panic_reason(payload.as_ref()),
        }),
        Ok(Err(_closed)) => Err(SandboxError::Aborted {
            reason: "worker exited without a result".into(),
        }),
        Err(_elapsed) => Err(SandboxError::Timeout {
            limit_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
