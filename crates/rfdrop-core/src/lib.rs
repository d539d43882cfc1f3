//! rfdrop-core: wire format and configuration shared by every rfdrop crate.

pub mod config;
pub mod wire;

pub use wire::{FrameType, Packet, PACKET_SIZE, PAYLOAD_CAPACITY};
