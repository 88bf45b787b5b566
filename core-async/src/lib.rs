//! Runtime facade for the billing bridge.
//!
//! Every `core-*` and `bridge-*` crate reaches the executor through this crate
//! instead of depending on tokio directly. That keeps the choice of runtime in
//! one place: the SDK callback threads, the host dispatch loop and the tests
//! all spawn, sleep and lock through the same API.
//!
//! # Modules
//!
//! - `runtime`: `block_on` and runtime handle discovery for code that is
//!   invoked from threads the SDK owns
//! - `task`: task spawning
//! - `time`: sleep, timeout, instants
//! - `sync`: mutexes and channels (oneshot, mpsc, broadcast)
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::oneshot;
//! use core_async::task;
//!
//! # core_async::runtime::block_on(async {
//! let (tx, rx) = oneshot::channel();
//! task::spawn(async move {
//!     let _ = tx.send(7);
//! });
//! assert_eq!(rx.await.unwrap(), 7);
//! # });
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
