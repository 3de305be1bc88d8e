//! Collection sharding
//!
//! When a shard key is configured, the target collection is range-sharded on
//! that key the first time it is written to. Provisioning is attempted at
//! most once per database and once per collection for the life of a
//! [`ShardProvisioner`].

pub mod command;
mod provisioner;
mod state;

pub use provisioner::ShardProvisioner;
pub use state::{AttemptState, ShardState, ShardTarget};
