//! Synchronization primitives.
//!
//! Re-exports the tokio primitives the bridge relies on:
//! - `Mutex`/`RwLock` guard session state across `.await` points
//! - `oneshot` backs every pending host completion
//! - `mpsc` carries marshalled SDK callbacks onto the host dispatch loop
//! - `broadcast` powers the event bus
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::Mutex;
//!
//! # core_async::runtime::block_on(async {
//! let mutex = Mutex::new(41);
//! *mutex.lock().await += 1;
//! assert_eq!(*mutex.lock().await, 42);
//! # });
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};
