//! rfdrop integration test harness.
//!
//! Runs both engines against each other over an in-process radio pair.
//! The sender runs to completion first; every frame it had acknowledged
//! sits in the receiver's queue until the receiver drains it.
//!
//!   cargo test --test integration

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use rfdrop_core::wire::{FrameType, Packet};
use rfdrop_services::loopback::LoopbackRadio;
use rfdrop_services::{Link, ManualClock, Role};

mod failures;
mod transfer;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const ADDRESSES: [[u8; 5]; 2] = [*b"1Node", *b"2Node"];

pub type TestLink = Link<LoopbackRadio, ManualClock>;

/// A configured (sender, receiver) link pair.
pub fn link_pair() -> Result<(TestLink, TestLink)> {
    let (a, b) = LoopbackRadio::pair();
    let mut tx = Link::new(a, ManualClock::new(), ADDRESSES, Duration::from_millis(5));
    let mut rx = Link::new(b, ManualClock::new(), ADDRESSES, Duration::from_millis(5));
    tx.configure(Role::Sender)?;
    rx.configure(Role::Receiver)?;
    Ok((tx, rx))
}

/// Per-process scratch path, removed by the caller.
pub fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("rfdrop-it-{}-{}", std::process::id(), name))
}

/// Deterministic, non-repeating-looking content.
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8 ^ (i >> 8) as u8).collect()
}

/// (type, sequence) of every frame the sender had acknowledged.
pub fn frames(link: &mut TestLink) -> Vec<(FrameType, u32)> {
    link.driver_mut()
        .sent()
        .iter()
        .filter_map(|f| Packet::decode(f).ok())
        .filter_map(|p| Some((p.kind().ok()?, p.sequence())))
        .collect()
}
