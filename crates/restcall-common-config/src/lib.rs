//! Configuration types for restcall.
//!
//! This crate provides the configuration used to build clients and requests
//! from `.restcall/config.yaml` files and `RESTCALL_*` environment variables.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
