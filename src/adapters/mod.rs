//! # Adapters: concrete implementations of the store port

pub mod memory_store;

pub use memory_store::InMemoryStore;
