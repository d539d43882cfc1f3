//! Receiver engine: rebuilds one file from HEADER / DATA / FIN frames.
//!
//! States are Idle and InSession. A HEADER always opens a fresh session,
//! including mid-session, where it abandons the transfer in progress.
//! DATA and FIN outside a session are stray leftovers of an aborted
//! transfer and are dropped without touching state.
//!
//! Fragment `i` is written at offset `i * 27`, so order on the link does
//! not matter and a repeated fragment is written once. On FIN the output
//! is cut to the declared size, which removes the padding of the last
//! fragment.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rfdrop_core::wire::{fragment_count, FrameType, Packet, PAYLOAD_CAPACITY};

use crate::clock::Clock;
use crate::fragments::FragmentSet;
use crate::link::{Link, LinkError, RadioDriver};
use crate::observer::TransferObserver;

/// How many missing indices a completion warning lists.
const MISSING_LOG_LIMIT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    InSession,
}

/// Result of feeding one frame to the receiver.
#[derive(Debug)]
pub enum Step {
    Continue,
    Complete(ReceiveReport),
}

/// A finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveReport {
    pub path: PathBuf,
    /// Declared size; the output's length.
    pub bytes: u32,
    /// Distinct DATA fragments stored.
    pub fragments_received: u32,
    /// Fragment count the sender claimed in FIN.
    pub fin_count: u32,
    /// Fragments in `0..ceil(bytes / 27)` never received.
    pub missing: u32,
    /// BLAKE3 of the output file.
    pub digest: [u8; 32],
}

impl ReceiveReport {
    /// FIN count and stored fragments both match the declared size.
    pub fn is_consistent(&self) -> bool {
        self.missing == 0 && self.fin_count == fragment_count(self.bytes)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("failed to open output {0}: {1}")]
    Open(PathBuf, #[source] io::Error),
    #[error("failed to write fragment {index}: {source}")]
    Write {
        index: u32,
        #[source]
        source: io::Error,
    },
    #[error("failed to finalize output {0}: {1}")]
    Finalize(PathBuf, #[source] io::Error),
    #[error(transparent)]
    Link(#[from] LinkError),
}

struct Session {
    declared_size: u32,
    fragment_count: u32,
    sink: File,
    received: FragmentSet,
}

impl Session {
    fn store(
        &mut self,
        index: u32,
        block: &[u8; PAYLOAD_CAPACITY],
        observer: &mut dyn TransferObserver,
    ) -> Result<(), ReceiveError> {
        if index >= self.fragment_count {
            tracing::warn!(
                sequence = index,
                expected = self.fragment_count,
                "fragment beyond declared size, discarding"
            );
            return Ok(());
        }
        if self.received.contains(index) {
            tracing::debug!(sequence = index, "duplicate fragment, ignoring");
            return Ok(());
        }

        let offset = index as u64 * PAYLOAD_CAPACITY as u64;
        self.sink
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.sink.write_all(block))
            .map_err(|source| ReceiveError::Write { index, source })?;
        self.received.insert(index);

        observer.fragment(self.received.len());
        tracing::trace!(sequence = index, "fragment stored");
        Ok(())
    }
}

/// The receive state machine, independent of any link.
pub struct Receiver {
    output: PathBuf,
    session: Option<Session>,
}

impl Receiver {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            session: None,
        }
    }

    pub fn state(&self) -> ReceiverState {
        match self.session {
            Some(_) => ReceiverState::InSession,
            None => ReceiverState::Idle,
        }
    }

    /// Distinct fragments stored in the current session.
    pub fn fragments_received(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.received.len())
    }

    /// Process one raw frame. Any error abandons the current session.
    pub fn handle(
        &mut self,
        frame: &[u8],
        observer: &mut dyn TransferObserver,
    ) -> Result<Step, ReceiveError> {
        let (kind, packet) = match Packet::decode(frame).and_then(|p| Ok((p.kind()?, p))) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "malformed frame, discarding");
                return Ok(Step::Continue);
            }
        };

        let result = match kind {
            FrameType::Header => self.begin(packet.sequence(), observer).map(|_| Step::Continue),
            FrameType::Data => match self.session.as_mut() {
                Some(session) => session
                    .store(packet.sequence(), &packet.payload, observer)
                    .map(|_| Step::Continue),
                None => {
                    tracing::warn!(
                        sequence = packet.sequence(),
                        "DATA outside a session, discarding"
                    );
                    Ok(Step::Continue)
                }
            },
            FrameType::Fin => match self.session.take() {
                Some(session) => self.finish(session, packet.sequence()).map(Step::Complete),
                None => {
                    tracing::warn!(
                        sequence = packet.sequence(),
                        "FIN outside a session, discarding"
                    );
                    Ok(Step::Continue)
                }
            },
        };

        if result.is_err() {
            self.session = None;
        }
        result
    }

    fn begin(
        &mut self,
        declared_size: u32,
        observer: &mut dyn TransferObserver,
    ) -> Result<(), ReceiveError> {
        if let Some(old) = self.session.take() {
            tracing::warn!(
                declared = old.declared_size,
                received = old.received.len(),
                "HEADER during a session, restarting"
            );
        }

        let sink = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.output)
            .map_err(|e| ReceiveError::Open(self.output.clone(), e))?;

        let expected = fragment_count(declared_size);
        tracing::info!(
            bytes = declared_size,
            fragments = expected,
            path = %self.output.display(),
            "HEADER received"
        );

        self.session = Some(Session {
            declared_size,
            fragment_count: expected,
            sink,
            received: FragmentSet::new(),
        });
        observer.session_started(declared_size);
        Ok(())
    }

    fn finish(&self, session: Session, fin_count: u32) -> Result<ReceiveReport, ReceiveError> {
        let Session {
            declared_size,
            fragment_count: expected,
            mut sink,
            received,
        } = session;

        let finalize = |e: io::Error| ReceiveError::Finalize(self.output.clone(), e);

        sink.flush().map_err(finalize)?;
        drop(sink);

        let file = OpenOptions::new().write(true).open(&self.output).map_err(finalize)?;
        file.set_len(declared_size as u64).map_err(finalize)?;
        drop(file);

        let missing = expected - received.len();
        if fin_count != expected {
            tracing::warn!(fin_count, expected, "FIN count disagrees with declared size");
        }
        if missing > 0 {
            tracing::warn!(
                missing,
                first = ?received.missing(expected, MISSING_LOG_LIMIT),
                "transfer finished with gaps"
            );
        }

        let digest = digest_file(&self.output).map_err(finalize)?;
        tracing::info!(
            bytes = declared_size,
            fragments = received.len(),
            digest = hex::encode(digest),
            path = %self.output.display(),
            "file received"
        );

        Ok(ReceiveReport {
            path: self.output.clone(),
            bytes: declared_size,
            fragments_received: received.len(),
            fin_count,
            missing,
            digest,
        })
    }
}

fn digest_file(path: &Path) -> io::Result<[u8; 32]> {
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut File::open(path)?, &mut hasher)?;
    Ok(*hasher.finalize().as_bytes())
}

/// Listen until one transfer completes into `output`.
///
/// Blocks for as long as it takes: there is no timeout, so a sender that
/// never sends FIN leaves this call waiting.
pub fn receive_file<D: RadioDriver, C: Clock>(
    link: &mut Link<D, C>,
    output: &Path,
    observer: &mut dyn TransferObserver,
) -> Result<ReceiveReport, ReceiveError> {
    link.start_listening();
    tracing::info!(path = %output.display(), "waiting for transfer");

    let mut receiver = Receiver::new(output);
    loop {
        let frame = link.recv_blocking()?;
        if let Step::Complete(report) = receiver.handle(&frame, observer)? {
            return Ok(report);
        }
    }
}
