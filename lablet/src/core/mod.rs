//! Deterministic, pure logic of the script engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod active_chain;
pub mod bundle;
pub mod component;
pub mod container;
pub mod error;
pub mod init_check;
pub mod path;
pub mod persistence;
pub mod state;
pub mod tree_hash;
pub mod types;
