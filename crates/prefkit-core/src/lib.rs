//! Core abstractions for prefkit: the primitive value model and the defaults store contract.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod store;
pub mod value;
