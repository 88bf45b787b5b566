//! Runtime utilities that abstract over the underlying async executor.
//!
//! Commerce SDKs call back on threads they own. Those threads are not tokio
//! workers, so code running there has to find its way back to a runtime
//! before it can spawn anything. [`current_handle`] captures the handle while
//! still on a runtime thread; [`Handle::spawn`] can then be used from anywhere.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a fresh current-thread runtime.
///
/// Used by the `#[core_async::test]` and `#[core_async::main]` macros.
///
/// # Panics
///
/// Panics if the runtime cannot be constructed (e.g. the process ran out of
/// file descriptors for the I/O driver).
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Returns a handle to the runtime driving the current thread, if any.
pub fn current_handle() -> Option<Handle> {
    Handle::try_current().ok()
}
