//! # Ports: the store abstraction the domain depends on (C3)

pub mod store;

pub use store::{KvStore, StoreOp};
