// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling include/exclude glob patterns for the watched tree.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Debouncing bursts of raw events into a single change signal.
//!
//! It does **not** know about the supervised server; it only turns
//! filesystem changes into a rate-limited change callback.

pub mod debounce;
pub mod filter;
pub mod watcher;

pub use debounce::Debouncer;
pub use filter::WatchFilter;
pub use watcher::{drive_watch_events, spawn_watcher, WatchOptions, WatcherHandle};
