//! rfdrop-services: the file-transfer engines and the link they run over.
//!
//! Both engines borrow a [`Link`] for the length of one transfer. Nothing
//! here spawns threads; all waiting goes through an injected [`Clock`].

pub mod clock;
pub mod fragments;
pub mod link;
pub mod loopback;
pub mod observer;
pub mod receiver;
pub mod sender;

pub use clock::{Clock, ManualClock, SystemClock};
pub use link::{Link, LinkError, PipeAddress, RadioDriver, Role};
pub use observer::{NoopObserver, TransferObserver};
pub use receiver::{receive_file, ReceiveError, ReceiveReport, Receiver, ReceiverState, Step};
pub use sender::{send_file, send_stream, SendError, SendReport};
