//! Packet framing for the machine network.
//!
//! A packet is three consecutive values on a machine's output channel: the
//! destination address followed by the `x` and `y` payload. Only the payload is
//! written to the destination's input channel.

use crate::network::channel::Channel;
use std::fmt;

/// Number of output values that make up one packet.
pub const PACKET_WIDTH: usize = 3;

/// A routed `(destination, x, y)` triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Packet {
    pub destination: i64,
    pub x: i64,
    pub y: i64,
}

impl Packet {
    pub fn new(destination: i64, x: i64, y: i64) -> Self {
        Self { destination, x, y }
    }

    /// Removes every complete packet queued on `channel`.
    ///
    /// A trailing partial packet stays in the channel until the rest of it is produced.
    pub fn drain_from(channel: &Channel) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Some(values) = channel.take_exact(PACKET_WIDTH) {
            packets.push(Packet::new(values[0], values[1], values[2]));
        }
        packets
    }

    /// Writes the payload to the destination's input channel.
    pub fn deliver(&self, channel: &Channel) {
        channel.extend([self.x, self.y]);
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- ({}, {})", self.destination, self.x, self.y)
    }
}
