//! Sender engine: HEADER, then one DATA per 27-byte slice, then FIN.
//!
//! One unacknowledged frame ends the attempt on the spot. The next attempt
//! starts again from HEADER.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use rfdrop_core::wire::{Packet, WireError, PAYLOAD_CAPACITY};

use crate::clock::Clock;
use crate::link::{Link, RadioDriver};
use crate::observer::TransferObserver;

/// Outcome of a completed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub bytes: u64,
    pub fragments: u32,
    /// BLAKE3 of the bytes sent.
    pub digest: [u8; 32],
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to open {0}: {1}")]
    Open(PathBuf, #[source] io::Error),
    #[error("{0} is not a regular file")]
    NotAFile(PathBuf),
    #[error("{0} is empty")]
    EmptySource(PathBuf),
    #[error("{0} is {1} bytes, too large for a single transfer")]
    TooLarge(PathBuf, u64),
    #[error("HEADER not acknowledged")]
    HeaderRejected,
    #[error("DATA fragment {index} not acknowledged")]
    DataRejected { index: u32 },
    #[error("FIN not acknowledged after {fragments} fragments")]
    FinRejected { fragments: u32 },
    #[error("source ended after {sent} of {declared} bytes")]
    SourceTruncated { sent: u64, declared: u32 },
    #[error("failed to read source: {0}")]
    Read(#[source] io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Send the file at `path`. Nothing is transmitted if it cannot be opened
/// or is empty.
pub fn send_file<D: RadioDriver, C: Clock>(
    link: &mut Link<D, C>,
    path: &Path,
    observer: &mut dyn TransferObserver,
) -> Result<SendReport, SendError> {
    let file = File::open(path).map_err(|e| SendError::Open(path.to_path_buf(), e))?;
    let metadata = file
        .metadata()
        .map_err(|e| SendError::Open(path.to_path_buf(), e))?;
    if !metadata.is_file() {
        return Err(SendError::NotAFile(path.to_path_buf()));
    }
    let len = metadata.len();
    if len == 0 {
        return Err(SendError::EmptySource(path.to_path_buf()));
    }
    let declared = u32::try_from(len).map_err(|_| SendError::TooLarge(path.to_path_buf(), len))?;

    tracing::info!(path = %path.display(), bytes = len, "sending file");
    send_stream(link, file, declared, observer)
}

/// Send `declared_size` bytes read from `source`.
///
/// A source that runs dry early stops the transfer without a FIN, leaving
/// the receiver waiting in its session.
pub fn send_stream<D: RadioDriver, C: Clock, R: Read>(
    link: &mut Link<D, C>,
    mut source: R,
    declared_size: u32,
    observer: &mut dyn TransferObserver,
) -> Result<SendReport, SendError> {
    link.stop_listening();

    if !link.send(&Packet::header(declared_size)) {
        tracing::error!(bytes = declared_size, "HEADER send failed");
        return Err(SendError::HeaderRejected);
    }

    let mut hasher = blake3::Hasher::new();
    let mut chunk = [0u8; PAYLOAD_CAPACITY];
    let mut sent: u64 = 0;
    let mut index: u32 = 0;

    while sent < declared_size as u64 {
        let want = (declared_size as u64 - sent).min(PAYLOAD_CAPACITY as u64) as usize;
        let n = read_chunk(&mut source, &mut chunk[..want]).map_err(SendError::Read)?;
        if n == 0 {
            tracing::warn!(
                sent,
                declared = declared_size,
                fragments = index,
                "source ended early, stopping without FIN"
            );
            return Err(SendError::SourceTruncated {
                sent,
                declared: declared_size,
            });
        }

        let packet = Packet::data(index, &chunk[..n])?;
        if !link.send(&packet) {
            tracing::error!(sequence = index, "DATA send failed");
            return Err(SendError::DataRejected { index });
        }

        hasher.update(&chunk[..n]);
        sent += n as u64;
        index += 1;
        observer.fragment(index);
        tracing::trace!(sequence = index - 1, len = n, "fragment sent");
    }

    if !link.send(&Packet::fin(index)) {
        tracing::error!(fragments = index, "FIN send failed");
        return Err(SendError::FinRejected { fragments: index });
    }

    let digest = *hasher.finalize().as_bytes();
    tracing::info!(
        bytes = sent,
        fragments = index,
        digest = hex::encode(digest),
        "file sent"
    );

    Ok(SendReport {
        bytes: sent,
        fragments: index,
        digest,
    })
}

/// Fill `buf` from `source`, stopping early only at EOF.
fn read_chunk<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
