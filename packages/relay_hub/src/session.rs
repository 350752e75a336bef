//! Client sessions
//!
//! Each connection runs two workers:
//! - ingress reads frames, decodes envelopes and turns them into hub events
//! - egress drains the session's mailbox onto the connection
//!
//! They never share state. Ingress owns unregistration: it sends exactly one
//! `leave` when the connection fails, closes or idles out. Egress stops when
//! the hub closes the mailbox or a write fails.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::envelope::{Frame, Inbound, decode_inbound};
use crate::hub::{HubHandle, SessionId};
use crate::transport::{FrameReader, FrameWriter, Incoming};

/// Per-session tuning.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Outbound frames buffered per session before the hub starts dropping.
    pub mailbox_capacity: usize,
    /// Disconnect after this long without any inbound traffic (None = never).
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            idle_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed the connection
    Closed,
    /// No inbound traffic within the idle timeout
    IdleTimeout,
    /// The connection failed while reading
    ReadError,
    /// The hub stopped accepting events
    HubStopped,
}

/// What happened over a session's lifetime.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub id: SessionId,
    /// Text frames read from the connection
    pub frames_received: u64,
    /// Text frames that did not decode as an envelope
    pub frames_ignored: u64,
    pub end: SessionEnd,
}

/// Run one client session to completion.
///
/// Registers with the hub, spawns the egress worker, runs ingress on the
/// calling task and unregisters once ingress stops. Returns after the egress
/// worker has drained and closed the connection.
pub async fn serve_connection<R, W>(
    hub: &HubHandle,
    mut reader: R,
    mut writer: W,
    config: &SessionConfig,
) -> SessionSummary
where
    R: FrameReader,
    W: FrameWriter,
{
    let id = hub.next_session_id();
    let mut summary = SessionSummary {
        id,
        frames_received: 0,
        frames_ignored: 0,
        end: SessionEnd::Closed,
    };

    let (mailbox, outbox) = mpsc::channel::<Frame>(config.mailbox_capacity.max(1));
    if hub.join(id, mailbox).await.is_err() {
        warn!(session = %id, "Hub stopped before session could join");
        writer.close().await;
        summary.end = SessionEnd::HubStopped;
        return summary;
    }

    let egress = tokio::spawn(run_egress(id, outbox, writer));

    let end = run_ingress(hub, &mut reader, config, &mut summary).await;
    summary.end = end;

    if hub.leave(id).await.is_err() {
        debug!(session = %id, "Hub already stopped, skipping leave");
    }
    drop(reader);

    if let Err(e) = egress.await {
        warn!(session = %id, "Egress task failed: {}", e);
    }

    info!(
        session = %id,
        end = ?summary.end,
        frames = summary.frames_received,
        ignored = summary.frames_ignored,
        "Session finished"
    );
    summary
}

async fn run_ingress<R: FrameReader>(
    hub: &HubHandle,
    reader: &mut R,
    config: &SessionConfig,
    summary: &mut SessionSummary,
) -> SessionEnd {
    let id = summary.id;

    loop {
        let read = match config.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, reader.read_frame()).await {
                Ok(read) => read,
                Err(_) => {
                    info!(session = %id, idle_secs = limit.as_secs(), "Session idle, disconnecting");
                    return SessionEnd::IdleTimeout;
                }
            },
            None => reader.read_frame().await,
        };

        let text = match read {
            Ok(Some(Incoming::Text(text))) => text,
            Ok(Some(Incoming::Heartbeat)) => continue,
            Ok(None) => {
                debug!(session = %id, "Connection closed by peer");
                return SessionEnd::Closed;
            }
            Err(e) => {
                warn!(session = %id, "Read error: {}", e);
                return SessionEnd::ReadError;
            }
        };
        summary.frames_received += 1;

        let sent = match decode_inbound(&text) {
            Ok(Inbound::SetName { nickname }) => hub.set_name(id, nickname).await,
            Ok(Inbound::Chat(message)) => hub.route(message).await,
            Err(e) => {
                summary.frames_ignored += 1;
                debug!(session = %id, "Ignoring undecodable frame: {}", e);
                continue;
            }
        };

        if sent.is_err() {
            return SessionEnd::HubStopped;
        }
    }
}

async fn run_egress<W: FrameWriter>(id: SessionId, mut outbox: mpsc::Receiver<Frame>, mut writer: W) {
    while let Some(frame) = outbox.recv().await {
        if let Err(e) = writer.write_frame(frame).await {
            // Unregistration stays with ingress; the hub prunes the dead
            // mailbox if it tries to deliver before then.
            debug!(session = %id, "Write failed, stopping egress: {}", e);
            break;
        }
    }

    writer.close().await;
}
