//! Command implementations.

mod send;

pub use send::SendCommand;
