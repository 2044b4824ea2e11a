//! Intcode virtual machine library.
//!
//! Provides the Intcode interpreter, the channels machines communicate through,
//! and the multi-machine topologies built on top of them.

pub mod network;
pub mod utils;
pub mod virtual_machine;
