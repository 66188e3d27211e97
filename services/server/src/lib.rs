//! orca server library.
//!
//! This crate ships the `orca-server` binary, which runs the periodic
//! housekeeping dispatcher against the local state store. The library
//! surface exposes the core scheduler for integration testing and reuse.
//!
//! ## Modules
//!
//! - `config`: environment-driven configuration
//! - `core_sched`: one garbage collection pass per core job
//! - `dispatcher`: periodic creation of core jobs
//! - `log`: the replicated log seam and an in-process implementation
//! - `persist`: saving and reloading the time table across restarts

pub mod config;
pub mod core_sched;
pub mod dispatcher;
pub mod log;
pub mod persist;
