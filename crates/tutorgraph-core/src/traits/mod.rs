//! Trait definitions for pluggable components
//!
//! Core defines the contracts; backend crates provide implementations and
//! higher layers inject them (dependency inversion, no circular deps).

pub mod store;

pub use store::GraphStore;
