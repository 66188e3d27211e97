//! # orca-structs
//!
//! Shared object model for the orca cluster state.
//!
//! ## Objects
//!
//! - **Job**: a user-submitted workload definition; owns evaluations
//! - **Evaluation**: one scheduling decision for a job; owns allocations
//! - **Allocation**: a placement of part of a job onto a node
//! - **Node**: a client machine that runs allocations
//! - **Deployment**: a rollout of a job version; owns allocations
//!
//! Every object records the log index of the write that last modified it
//! (`modify_index`). Objects are only ever mutated through the replicated
//! log and are only removed by [`DeleteCommand`]s emitted by the core
//! scheduler.
//!
//! ## Core jobs
//!
//! [`CoreJob`] is the ephemeral descriptor handed to the core scheduler to
//! run one housekeeping pass for one [`CoreJobType`].

mod command;
mod core_job;
mod error;
mod types;

pub use command::*;
pub use core_job::{CoreJob, CoreJobType};
pub use error::StructsError;
pub use types::*;
