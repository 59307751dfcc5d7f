//! Database layer and migrations

pub mod connection;
pub mod repositories;

pub use connection::*;
pub use repositories::*;
pub mod sharding;
pub use sharding::*;
