//! Test fixtures shared across the orca workspace.

pub mod mock;
