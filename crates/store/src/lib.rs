//! Store implementations for RoleMatch.

pub mod in_memory;

pub use in_memory::InMemoryStore;
