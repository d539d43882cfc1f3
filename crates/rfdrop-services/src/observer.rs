//! Progress callbacks from the engines to whatever presents status.

/// Hooks the engines call while a transfer runs. All default to no-ops.
pub trait TransferObserver {
    /// Receiver accepted a HEADER and opened its output.
    fn session_started(&mut self, _declared_size: u32) {}

    /// A DATA fragment was sent or stored. `count` is the running total
    /// for this transfer, starting at 1.
    fn fragment(&mut self, _count: u32) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}
