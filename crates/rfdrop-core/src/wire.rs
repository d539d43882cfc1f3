//! rfdrop wire format: the one packet type that crosses the radio link.
//!
//! Every frame is exactly [`PACKET_SIZE`] bytes so that it fits a single
//! radio transmission. The layout is fixed and there is no negotiation
//! phase: both peers agree on offsets because this struct says so.
//!
//! ```text
//! offset  size  field
//!      0     1  frame_type   (0x01 HEADER, 0x02 DATA, 0x03 FIN)
//!      1     4  sequence     (u32, little-endian)
//!      5    27  payload      (zero padded)
//! ```
//!
//! `sequence` means different things per frame type:
//!   HEADER: total file size in bytes
//!   DATA:   zero-based fragment index
//!   FIN:    number of DATA fragments sent

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Content bytes carried by one packet.
pub const PAYLOAD_CAPACITY: usize = 27;

/// Total on-air frame size. Matches the radio's maximum single transmission.
pub const PACKET_SIZE: usize = 32;

// ── Frame type ────────────────────────────────────────────────────────────────

/// Discriminates how `sequence` and `payload` are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// First frame of a transfer. `sequence` carries the total size.
    Header = 0x01,
    /// One fragment of file content. `sequence` is the fragment index.
    Data = 0x02,
    /// Terminal frame. `sequence` is the number of DATA frames sent.
    Fin = 0x03,
}

impl TryFrom<u8> for FrameType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(FrameType::Header),
            0x02 => Ok(FrameType::Data),
            0x03 => Ok(FrameType::Fin),
            other => Err(WireError::UnknownFrameType(other)),
        }
    }
}

impl From<FrameType> for u8 {
    fn from(t: FrameType) -> u8 {
        t as u8
    }
}

// ── Packet ────────────────────────────────────────────────────────────────────

/// The fixed-size wire packet.
///
/// `U32<LittleEndian>` has alignment 1, so `repr(C)` produces no padding
/// between fields and the struct can be viewed directly as its wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct Packet {
    pub frame_type: u8,
    pub sequence: U32<LittleEndian>,
    pub payload: [u8; PAYLOAD_CAPACITY],
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(Packet, [u8; PACKET_SIZE]);

impl Packet {
    /// Build a packet, zero-padding `payload` up to [`PAYLOAD_CAPACITY`].
    pub fn encode(frame_type: FrameType, sequence: u32, payload: &[u8]) -> Result<Self, WireError> {
        if payload.len() > PAYLOAD_CAPACITY {
            return Err(WireError::PayloadTooLarge(payload.len()));
        }
        let mut packet = Packet::new_zeroed();
        packet.frame_type = frame_type.into();
        packet.sequence = U32::new(sequence);
        packet.payload[..payload.len()].copy_from_slice(payload);
        Ok(packet)
    }

    /// HEADER announcing a transfer of `total_size` bytes.
    pub fn header(total_size: u32) -> Self {
        let mut packet = Packet::new_zeroed();
        packet.frame_type = FrameType::Header.into();
        packet.sequence = U32::new(total_size);
        packet
    }

    /// DATA carrying fragment `index`.
    pub fn data(index: u32, chunk: &[u8]) -> Result<Self, WireError> {
        Self::encode(FrameType::Data, index, chunk)
    }

    /// FIN closing a transfer of `fragments` DATA frames.
    pub fn fin(fragments: u32) -> Self {
        let mut packet = Packet::new_zeroed();
        packet.frame_type = FrameType::Fin.into();
        packet.sequence = U32::new(fragments);
        packet
    }

    /// Parse a received frame. The buffer must be exactly [`PACKET_SIZE`] bytes
    /// and carry a known frame type.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let packet = Packet::read_from(bytes).ok_or(WireError::WrongLength(bytes.len()))?;
        packet.kind()?;
        Ok(packet)
    }

    /// Frame type, validated.
    pub fn kind(&self) -> Result<FrameType, WireError> {
        FrameType::try_from(self.frame_type)
    }

    pub fn sequence(&self) -> u32 {
        self.sequence.get()
    }

    /// Wire bytes of this packet.
    pub fn to_wire(&self) -> [u8; PACKET_SIZE] {
        let mut out = [0u8; PACKET_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }
}

// ── Fragment arithmetic ──────────────────────────────────────────────────────

/// Number of DATA fragments needed for `total_size` bytes: ceil(size / capacity).
pub fn fragment_count(total_size: u32) -> u32 {
    let cap = PAYLOAD_CAPACITY as u64;
    ((total_size as u64 + cap - 1) / cap) as u32
}

/// How many bytes of fragment `index` are real content for a transfer of
/// `total_size` bytes. Zero for indices past the end.
pub fn meaningful_len(total_size: u32, index: u32) -> usize {
    let start = index as u64 * PAYLOAD_CAPACITY as u64;
    let total = total_size as u64;
    if start >= total {
        return 0;
    }
    (total - start).min(PAYLOAD_CAPACITY as u64) as usize
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown frame type byte: 0x{0:02x}")]
    UnknownFrameType(u8),

    #[error("frame is {0} bytes, expected {}", PACKET_SIZE)]
    WrongLength(usize),

    #[error("payload length {0} exceeds capacity {}", PAYLOAD_CAPACITY)]
    PayloadTooLarge(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
