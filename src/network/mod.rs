//! Channels and the topologies built from them.
//!
//! Machines never share memory. They talk through [`channel::Channel`]s, and the
//! modules here wire those channels into larger scenarios.
//!
//! - [`channel`]: Unbounded FIFO of integers shared between machines
//! - [`packet`]: `(destination, x, y)` framing for routed networks
//! - [`topology`]: Machine to channel wiring and topology errors
//! - [`pipeline`]: Amplifier chains, feedback loops and phase search
//! - [`router`]: Packet network supervised by a NAT
//! - [`console`]: ASCII text over channels and an interactive driver

pub mod channel;
pub mod console;
pub mod packet;
pub mod pipeline;
pub mod router;
pub mod topology;
