//! WebSocket transport
//!
//! Adapts an upgraded axum socket to the hub's frame traits and runs one
//! client session over it.

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{sink::SinkExt, stream::StreamExt};
use relay_hub::{
    Frame, FrameReader, FrameWriter, HubHandle, Incoming, SessionConfig, TransportError,
    serve_connection,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::metrics::ServerMetrics;

/// Read half of a client WebSocket.
pub struct WsReader(SplitStream<WebSocket>);

impl FrameReader for WsReader {
    async fn read_frame(&mut self) -> Result<Option<Incoming>, TransportError> {
        match self.0.next().await {
            None => Ok(None),
            Some(Err(e)) => Err(TransportError::Read(e.to_string())),
            Some(Ok(Message::Text(text))) => Ok(Some(Incoming::Text(text.as_str().to_owned()))),
            Some(Ok(Message::Binary(data))) => Ok(Some(Incoming::Text(
                String::from_utf8_lossy(&data).into_owned(),
            ))),
            // axum answers pings itself
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                Ok(Some(Incoming::Heartbeat))
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "Client sent close frame");
                Ok(None)
            }
        }
    }
}

/// Write half of a client WebSocket.
pub struct WsWriter(SplitSink<WebSocket, Message>);

impl FrameWriter for WsWriter {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.0
            .send(Message::Text(frame.as_ref().into()))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.0.close().await;
    }
}

/// Run a chat session over an upgraded WebSocket until it ends.
pub async fn handle_chat_ws(
    socket: WebSocket,
    hub: HubHandle,
    session_config: Arc<SessionConfig>,
    metrics: Arc<ServerMetrics>,
) {
    metrics.connection_opened();

    let (sender, receiver) = socket.split();
    let summary = serve_connection(
        &hub,
        WsReader(receiver),
        WsWriter(sender),
        &session_config,
    )
    .await;

    metrics.connection_closed(&summary);
    info!(
        session = %summary.id,
        end = ?summary.end,
        "Chat WebSocket closed"
    );
}
