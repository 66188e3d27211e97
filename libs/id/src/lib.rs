//! # orca-id
//!
//! Identifier types for the objects the cluster state store holds, plus the
//! replicated log index used as the cluster's logical clock.
//!
//! ## ID Format
//!
//! Object IDs use a prefixed format: `{prefix}_{ulid}`
//!
//! Examples:
//! - `eval_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `alloc_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//! - `node_01HV4Z4NYPLTRS0JTUA8XDME5F`
//!
//! The prefix makes IDs of different object classes impossible to mix up,
//! both in the type system and in logs.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
