use std::future::Future;

use crate::envelope::Frame;
use crate::error::TransportError;

/// What a connection produced on one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A text frame that should hold one envelope.
    Text(String),
    /// Control traffic (ping/pong). Counts as activity, carries no envelope.
    Heartbeat,
}

/// Read half of a client connection, owned by the session's ingress task.
pub trait FrameReader: Send + 'static {
    /// Wait for the next frame. `Ok(None)` means the peer closed cleanly.
    fn read_frame(
        &mut self,
    ) -> impl Future<Output = Result<Option<Incoming>, TransportError>> + Send;
}

/// Write half of a client connection, owned by the session's egress task.
pub trait FrameWriter: Send + 'static {
    fn write_frame(&mut self, frame: Frame)
    -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Flush and close the connection. Errors are swallowed; the peer may
    /// already be gone.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
