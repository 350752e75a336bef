//! In-memory transport
//!
//! A duplex pipe standing in for a real connection. The server half is split
//! into a [`MemoryReader`] / [`MemoryWriter`] pair and handed to
//! [`crate::serve_connection`]; the [`MemoryClient`] half plays the remote
//! peer.

use tokio::sync::mpsc;

use crate::envelope::Frame;
use crate::error::TransportError;
use crate::transport::{FrameReader, FrameWriter, Incoming};

enum PeerEvent {
    Frame(Incoming),
    Fail(String),
}

/// Create a connected server/client pair.
pub fn pair() -> (MemoryConnection, MemoryClient) {
    let (peer_tx, peer_rx) = mpsc::unbounded_channel();
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    (
        MemoryConnection {
            reader: MemoryReader { inbound: peer_rx },
            writer: MemoryWriter {
                outbound: Some(frame_tx),
            },
        },
        MemoryClient {
            outbound: Some(peer_tx),
            inbound: frame_rx,
        },
    )
}

/// Server half of an in-memory connection.
pub struct MemoryConnection {
    reader: MemoryReader,
    writer: MemoryWriter,
}

impl MemoryConnection {
    pub fn split(self) -> (MemoryReader, MemoryWriter) {
        (self.reader, self.writer)
    }
}

pub struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<PeerEvent>,
}

impl FrameReader for MemoryReader {
    async fn read_frame(&mut self) -> Result<Option<Incoming>, TransportError> {
        match self.inbound.recv().await {
            Some(PeerEvent::Frame(incoming)) => Ok(Some(incoming)),
            Some(PeerEvent::Fail(reason)) => Err(TransportError::Read(reason)),
            None => Ok(None),
        }
    }
}

pub struct MemoryWriter {
    outbound: Option<mpsc::UnboundedSender<Frame>>,
}

impl FrameWriter for MemoryWriter {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::Closed)?;
        outbound.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) {
        self.outbound = None;
    }
}

/// Remote-peer half of an in-memory connection.
pub struct MemoryClient {
    outbound: Option<mpsc::UnboundedSender<PeerEvent>>,
    inbound: mpsc::UnboundedReceiver<Frame>,
}

impl MemoryClient {
    /// Send one text frame to the server.
    pub fn send(&self, text: impl Into<String>) {
        self.push(PeerEvent::Frame(Incoming::Text(text.into())));
    }

    /// Send control traffic that keeps the connection alive.
    pub fn heartbeat(&self) {
        self.push(PeerEvent::Frame(Incoming::Heartbeat));
    }

    /// Make the server's next read fail.
    pub fn fail(&self, reason: impl Into<String>) {
        self.push(PeerEvent::Fail(reason.into()));
    }

    /// Close the client's sending side; the server reads a clean EOF.
    pub fn close(&mut self) {
        self.outbound = None;
    }

    /// Next frame written by the server, or `None` once the server closed
    /// the connection and everything has been drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbound.recv().await
    }

    /// Non-blocking variant of [`MemoryClient::recv`].
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.inbound.try_recv().ok()
    }

    fn push(&self, event: PeerEvent) {
        if let Some(outbound) = &self.outbound {
            let _ = outbound.send(event);
        }
    }
}
