//! Builders to construct lock managers from configuration.

pub mod lock_builder;

pub use lock_builder::build_lock_manager;
