//! UDP stand-in for the 2.4 GHz radio.
//!
//! Each pipe address maps to a UDP endpoint. Datagrams carry a 3-byte
//! link header ahead of the 32-byte frame:
//!
//! ```text
//! [channel][kind][pid][frame ...]
//! ```
//!
//! The listening side acknowledges every DATA datagram it drains, and the
//! writer retransmits until it sees the ACK or runs out of retries, the way
//! the radio's auto-ack hardware does. ACKs are only sent while the
//! receiver polls, so the retry budget must cover one poll interval.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};

use rfdrop_core::config::RadioConfig;
use rfdrop_core::wire::PACKET_SIZE;
use rfdrop_services::{PipeAddress, RadioDriver};

const LINK_HEADER_LEN: usize = 3;
const DATAGRAM_LEN: usize = LINK_HEADER_LEN + PACKET_SIZE;

const KIND_DATA: u8 = 0x00;
const KIND_ACK: u8 = 0x01;

/// Receive FIFO depth of the radio. Frames arriving to a full FIFO are not
/// acknowledged.
const RX_FIFO_DEPTH: usize = 3;

/// Shortest retry delay the radio supports.
const MIN_RETRY_DELAY: Duration = Duration::from_micros(250);

pub struct UdpRadio {
    endpoints: HashMap<PipeAddress, SocketAddr>,
    channel: u8,
    retry_delay: Duration,
    retry_count: u8,
    socket: Option<UdpSocket>,
    peer: Option<SocketAddr>,
    listening: bool,
    /// 2-bit packet id of the last frame written.
    tx_pid: u8,
    /// Last accepted (pid, frame), for retransmission dedup.
    last_rx: Option<(u8, [u8; PACKET_SIZE])>,
    fifo: VecDeque<[u8; PACKET_SIZE]>,
}

impl UdpRadio {
    pub fn new(config: &RadioConfig) -> Self {
        Self::with_endpoints(
            config.channel,
            config.retry_delay(),
            config.retry_count,
            [
                (config.pipe_address(0), config.node_a_endpoint),
                (config.pipe_address(1), config.node_b_endpoint),
            ],
        )
    }

    pub fn with_endpoints(
        channel: u8,
        retry_delay: Duration,
        retry_count: u8,
        endpoints: [(PipeAddress, SocketAddr); 2],
    ) -> Self {
        Self {
            endpoints: endpoints.into_iter().collect(),
            channel,
            retry_delay: retry_delay.max(MIN_RETRY_DELAY),
            retry_count,
            socket: None,
            peer: None,
            listening: false,
            tx_pid: 0,
            last_rx: None,
            fifo: VecDeque::with_capacity(RX_FIFO_DEPTH),
        }
    }

    fn endpoint(&self, address: &PipeAddress) -> io::Result<SocketAddr> {
        self.endpoints.get(address).copied().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no endpoint for pipe {}", String::from_utf8_lossy(address)),
            )
        })
    }

    fn bind(addr: SocketAddr) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.bind(&addr.into())?;
        Ok(socket.into())
    }

    /// Pull every waiting datagram off the socket into the FIFO, acking DATA.
    fn drain(&mut self) -> io::Result<()> {
        let Some(socket) = self.socket.as_ref() else {
            return Ok(());
        };
        socket.set_nonblocking(true)?;

        let mut buf = [0u8; DATAGRAM_LEN + 1];
        loop {
            let (len, from) = match socket.recv_from(&mut buf) {
                Ok(r) => r,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            };
            if len != DATAGRAM_LEN || buf[0] != self.channel || buf[1] != KIND_DATA {
                tracing::trace!(len, %from, "ignoring datagram");
                continue;
            }
            if self.fifo.len() >= RX_FIFO_DEPTH {
                tracing::debug!(%from, "rx fifo full, not acknowledging");
                continue;
            }

            let pid = buf[2];
            let mut frame = [0u8; PACKET_SIZE];
            frame.copy_from_slice(&buf[LINK_HEADER_LEN..DATAGRAM_LEN]);

            let ack = [self.channel, KIND_ACK, pid];
            socket.send_to(&ack, from)?;

            if self.last_rx == Some((pid, frame)) {
                tracing::trace!(pid, "retransmission, already queued");
                continue;
            }
            self.last_rx = Some((pid, frame));
            self.fifo.push_back(frame);
        }
    }

    /// Wait up to one retry delay for the ACK of `pid` from `peer`.
    fn await_ack(
        socket: &UdpSocket,
        channel: u8,
        pid: u8,
        peer: SocketAddr,
        delay: Duration,
    ) -> io::Result<bool> {
        socket.set_nonblocking(false)?;
        let deadline = Instant::now() + delay;
        let mut buf = [0u8; DATAGRAM_LEN + 1];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            socket.set_read_timeout(Some(remaining))?;
            match socket.recv_from(&mut buf) {
                Ok((3, from)) if from == peer && buf[..3] == [channel, KIND_ACK, pid] => {
                    return Ok(true)
                }
                Ok(_) => continue,
                Err(e) if is_timeout(&e) => return Ok(false),
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

impl RadioDriver for UdpRadio {
    fn open_pipes(&mut self, writing: PipeAddress, reading: PipeAddress) -> io::Result<()> {
        let peer = self.endpoint(&writing)?;
        let local = self.endpoint(&reading)?;
        self.socket = Some(Self::bind(local)?);
        self.peer = Some(peer);
        tracing::debug!(%local, %peer, channel = self.channel, "udp radio bound");
        Ok(())
    }

    fn start_listening(&mut self) {
        self.listening = true;
    }

    fn stop_listening(&mut self) {
        self.listening = false;
    }

    fn write(&mut self, frame: &[u8; PACKET_SIZE]) -> bool {
        let (Some(socket), Some(peer)) = (self.socket.as_ref(), self.peer) else {
            return false;
        };

        self.tx_pid = (self.tx_pid + 1) & 0x03;
        let mut datagram = [0u8; DATAGRAM_LEN];
        datagram[0] = self.channel;
        datagram[1] = KIND_DATA;
        datagram[2] = self.tx_pid;
        datagram[LINK_HEADER_LEN..].copy_from_slice(frame);

        for attempt in 0..=self.retry_count {
            if let Err(e) = socket.send_to(&datagram, peer) {
                tracing::warn!(error = %e, "udp send failed");
                return false;
            }
            match Self::await_ack(socket, self.channel, self.tx_pid, peer, self.retry_delay) {
                Ok(true) => {
                    if attempt > 0 {
                        tracing::trace!(attempt, "delivered after retransmission");
                    }
                    return true;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "waiting for ack failed");
                    return false;
                }
            }
        }
        tracing::debug!(retries = self.retry_count, "no ack, giving up");
        false
    }

    fn available(&mut self) -> io::Result<bool> {
        if self.listening {
            self.drain()?;
        }
        Ok(!self.fifo.is_empty())
    }

    fn read(&mut self, buf: &mut [u8; PACKET_SIZE]) -> io::Result<()> {
        match self.fifo.pop_front() {
            Some(frame) => {
                *buf = frame;
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::WouldBlock, "rx fifo empty")),
        }
    }
}
