//! In-memory radio pair for bench work and tests.
//!
//! Two `LoopbackRadio`s share queues. A write is acknowledged only when the
//! peer is listening on the pipe being written to, the same condition the
//! real link needs. Delivery is otherwise lossless and in order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use rfdrop_core::wire::PACKET_SIZE;

use crate::link::{PipeAddress, RadioDriver};

#[derive(Default)]
struct Endpoint {
    inbox: VecDeque<[u8; PACKET_SIZE]>,
    listening: bool,
    /// (writing, reading)
    pipes: Option<(PipeAddress, PipeAddress)>,
}

pub struct LoopbackRadio {
    me: Rc<RefCell<Endpoint>>,
    peer: Rc<RefCell<Endpoint>>,
    sent: Vec<[u8; PACKET_SIZE]>,
    fail_after: Option<usize>,
}

impl LoopbackRadio {
    /// Two radios wired to each other.
    pub fn pair() -> (LoopbackRadio, LoopbackRadio) {
        let a = Rc::new(RefCell::new(Endpoint::default()));
        let b = Rc::new(RefCell::new(Endpoint::default()));
        (
            LoopbackRadio {
                me: a.clone(),
                peer: b.clone(),
                sent: Vec::new(),
                fail_after: None,
            },
            LoopbackRadio {
                me: b,
                peer: a,
                sent: Vec::new(),
                fail_after: None,
            },
        )
    }

    /// Acknowledge the first `n` writes, reject every one after.
    pub fn fail_after(&mut self, n: usize) {
        self.fail_after = Some(n);
    }

    /// Acknowledge writes again after [`fail_after`](Self::fail_after).
    pub fn heal(&mut self) {
        self.fail_after = None;
    }

    /// Place a raw frame straight into this radio's receive queue.
    pub fn inject(&mut self, frame: [u8; PACKET_SIZE]) {
        self.me.borrow_mut().inbox.push_back(frame);
    }

    /// Every frame this radio transmitted and had acknowledged.
    pub fn sent(&self) -> &[[u8; PACKET_SIZE]] {
        &self.sent
    }

    /// Frames waiting to be read.
    pub fn queued(&self) -> usize {
        self.me.borrow().inbox.len()
    }

    pub fn pipes(&self) -> Option<(PipeAddress, PipeAddress)> {
        self.me.borrow().pipes
    }

    pub fn is_listening(&self) -> bool {
        self.me.borrow().listening
    }
}

impl RadioDriver for LoopbackRadio {
    fn open_pipes(&mut self, writing: PipeAddress, reading: PipeAddress) -> io::Result<()> {
        self.me.borrow_mut().pipes = Some((writing, reading));
        Ok(())
    }

    fn start_listening(&mut self) {
        self.me.borrow_mut().listening = true;
    }

    fn stop_listening(&mut self) {
        self.me.borrow_mut().listening = false;
    }

    fn write(&mut self, frame: &[u8; PACKET_SIZE]) -> bool {
        if let Some(limit) = self.fail_after {
            if self.sent.len() >= limit {
                return false;
            }
        }
        let writing = match self.me.borrow().pipes {
            Some((writing, _)) => writing,
            None => return false,
        };
        let mut peer = self.peer.borrow_mut();
        let reachable =
            peer.listening && matches!(peer.pipes, Some((_, reading)) if reading == writing);
        if !reachable {
            return false;
        }
        peer.inbox.push_back(*frame);
        self.sent.push(*frame);
        true
    }

    fn available(&mut self) -> io::Result<bool> {
        Ok(!self.me.borrow().inbox.is_empty())
    }

    fn read(&mut self, buf: &mut [u8; PACKET_SIZE]) -> io::Result<()> {
        match self.me.borrow_mut().inbox.pop_front() {
            Some(frame) => {
                *buf = frame;
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::WouldBlock, "no frame pending")),
        }
    }
}
