//! Link transport: the thin adapter between the engines and a radio driver.
//!
//! The driver owns delivery: `write` returns true only once its own
//! link-layer acknowledgement and retry cycle succeeded. Nothing above this
//! layer retries.

use std::io;
use std::time::Duration;

use rfdrop_core::wire::{Packet, PACKET_SIZE};

use crate::clock::{Clock, SystemClock};

/// 5-byte on-air pipe address.
pub type PipeAddress = [u8; 5];

/// Which side of the transfer this process plays. Fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    /// Index of this node's own pipe address.
    pub fn node_index(self) -> usize {
        match self {
            Role::Sender => 0,
            Role::Receiver => 1,
        }
    }

    /// Index of the peer's pipe address.
    pub fn peer_index(self) -> usize {
        1 - self.node_index()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Sender => f.write_str("sender"),
            Role::Receiver => f.write_str("receiver"),
        }
    }
}

/// Packet-level primitives the radio hardware (or its stand-in) provides.
pub trait RadioDriver {
    /// Point transmissions at `writing` and accept frames addressed to `reading`.
    fn open_pipes(&mut self, writing: PipeAddress, reading: PipeAddress) -> io::Result<()>;

    fn start_listening(&mut self);

    fn stop_listening(&mut self);

    /// Transmit one frame. True iff the peer acknowledged it, retries included.
    fn write(&mut self, frame: &[u8; PACKET_SIZE]) -> bool;

    /// Non-blocking: is at least one received frame waiting?
    fn available(&mut self) -> io::Result<bool>;

    /// Pop one waiting frame into `buf`. Only meaningful after `available()`
    /// returned true.
    fn read(&mut self, buf: &mut [u8; PACKET_SIZE]) -> io::Result<()>;
}

impl<D: RadioDriver + ?Sized> RadioDriver for Box<D> {
    fn open_pipes(&mut self, writing: PipeAddress, reading: PipeAddress) -> io::Result<()> {
        (**self).open_pipes(writing, reading)
    }
    fn start_listening(&mut self) {
        (**self).start_listening()
    }
    fn stop_listening(&mut self) {
        (**self).stop_listening()
    }
    fn write(&mut self, frame: &[u8; PACKET_SIZE]) -> bool {
        (**self).write(frame)
    }
    fn available(&mut self) -> io::Result<bool> {
        (**self).available()
    }
    fn read(&mut self, buf: &mut [u8; PACKET_SIZE]) -> io::Result<()> {
        (**self).read(buf)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("link used before configure()")]
    NotConfigured,
    #[error("radio driver error: {0}")]
    Driver(#[from] io::Error),
}

/// A configured radio plus the clock its blocking receive sleeps on.
pub struct Link<D, C = SystemClock> {
    driver: D,
    clock: C,
    addresses: [PipeAddress; 2],
    poll_interval: Duration,
    role: Option<Role>,
}

impl<D: RadioDriver, C: Clock> Link<D, C> {
    pub fn new(driver: D, clock: C, addresses: [PipeAddress; 2], poll_interval: Duration) -> Self {
        Self {
            driver,
            clock,
            addresses,
            poll_interval,
            role: None,
        }
    }

    /// Open the pipes for `role`: write to the peer's address, read on our own.
    /// A sender starts out transmitting, a receiver listening.
    pub fn configure(&mut self, role: Role) -> Result<(), LinkError> {
        let writing = self.addresses[role.peer_index()];
        let reading = self.addresses[role.node_index()];
        self.driver.open_pipes(writing, reading)?;
        match role {
            Role::Sender => self.driver.stop_listening(),
            Role::Receiver => self.driver.start_listening(),
        }
        self.role = Some(role);
        tracing::info!(
            %role,
            writing = %String::from_utf8_lossy(&writing),
            reading = %String::from_utf8_lossy(&reading),
            "link configured"
        );
        Ok(())
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn start_listening(&mut self) {
        self.driver.start_listening();
    }

    pub fn stop_listening(&mut self) {
        self.driver.stop_listening();
    }

    /// Transmit one packet. False on delivery failure or an unconfigured link.
    pub fn send(&mut self, packet: &Packet) -> bool {
        if self.role.is_none() {
            tracing::error!("send on unconfigured link");
            return false;
        }
        self.driver.write(&packet.to_wire())
    }

    pub fn has_pending(&mut self) -> Result<bool, LinkError> {
        self.require_configured()?;
        Ok(self.driver.available()?)
    }

    /// Copy out exactly one pending frame.
    pub fn receive(&mut self) -> Result<[u8; PACKET_SIZE], LinkError> {
        self.require_configured()?;
        let mut buf = [0u8; PACKET_SIZE];
        self.driver.read(&mut buf)?;
        Ok(buf)
    }

    /// Wait until a frame is pending, sleeping `poll_interval` between checks,
    /// then return it. Never times out.
    pub fn recv_blocking(&mut self) -> Result<[u8; PACKET_SIZE], LinkError> {
        while !self.has_pending()? {
            self.clock.sleep(self.poll_interval);
        }
        self.receive()
    }

    fn require_configured(&self) -> Result<(), LinkError> {
        match self.role {
            Some(_) => Ok(()),
            None => Err(LinkError::NotConfigured),
        }
    }
}
