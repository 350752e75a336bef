use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::envelope::{ChatMessage, Frame, encode_chat, encode_user_list};
use crate::error::HubError;

/// Sending side of a session's outbound mailbox. The hub holds the only
/// sender, so removing a session from the registry closes its mailbox.
pub type MailboxSender = mpsc::Sender<Frame>;

/// Handle identifying one client session. Allocated monotonically and never
/// reused, so registry order is registration order.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Hub tuning.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Capacity of the command queue shared by all sessions.
    pub command_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_capacity: 1024,
        }
    }
}

/// Counters maintained by the hub loop.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Currently registered sessions
    pub members: usize,
    /// Commands handled since start
    pub events_processed: u64,
    /// Frames enqueued onto mailboxes
    pub delivered: u64,
    /// Frames dropped because the recipient's mailbox was full
    pub dropped_full: u64,
    /// Directed messages whose recipient was not connected
    pub unrouted: u64,
    /// Sessions removed because their mailbox receiver was gone
    pub pruned: u64,
}

/// Commands processed by the hub loop, one at a time.
pub(crate) enum HubCommand {
    Join {
        session: SessionId,
        mailbox: MailboxSender,
    },
    Leave {
        session: SessionId,
    },
    Route {
        message: ChatMessage,
    },
    SetName {
        session: SessionId,
        nickname: String,
    },
    Members {
        respond_to: oneshot::Sender<Vec<String>>,
    },
    Stats {
        respond_to: oneshot::Sender<HubStats>,
    },
}

struct Member {
    identity: String,
    mailbox: MailboxSender,
}

/// Handle to communicate with the hub actor
#[derive(Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
    next_id: Arc<AtomicU64>,
}

impl HubHandle {
    /// Allocate an id for a new session.
    pub fn next_session_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a session and broadcast the membership list to everyone,
    /// the new session included.
    pub async fn join(&self, session: SessionId, mailbox: MailboxSender) -> Result<(), HubError> {
        self.send(HubCommand::Join { session, mailbox }).await
    }

    /// Unregister a session, close its mailbox and broadcast the membership
    /// list to the remaining sessions. No-op if the session already left.
    pub async fn leave(&self, session: SessionId) -> Result<(), HubError> {
        self.send(HubCommand::Leave { session }).await
    }

    /// Deliver a chat message: to every session, or to the first registered
    /// session named by `message.to` when private.
    pub async fn route(&self, message: ChatMessage) -> Result<(), HubError> {
        self.send(HubCommand::Route { message }).await
    }

    /// Change a session's identity and rebroadcast the membership list.
    pub async fn set_name(
        &self,
        session: SessionId,
        nickname: impl Into<String>,
    ) -> Result<(), HubError> {
        self.send(HubCommand::SetName {
            session,
            nickname: nickname.into(),
        })
        .await
    }

    /// Identities of the registered sessions, in registration order.
    ///
    /// Answered inside the hub loop, so every command sent before this call
    /// has been fully processed when it returns.
    pub async fn members(&self) -> Result<Vec<String>, HubError> {
        let (respond_to, response) = oneshot::channel();
        self.send(HubCommand::Members { respond_to }).await?;
        response.await.map_err(|_| HubError::Closed)
    }

    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (respond_to, response) = oneshot::channel();
        self.send(HubCommand::Stats { respond_to }).await?;
        response.await.map_err(|_| HubError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.sender.send(command).await.map_err(|_| HubError::Closed)
    }
}

/// The hub actor. Owns the registry; nothing outside the loop can reach it.
pub struct Hub {
    registry: BTreeMap<SessionId, Member>,
    receiver: mpsc::Receiver<HubCommand>,
    stats: HubStats,
}

impl Hub {
    /// Start the hub loop on the current runtime. The loop exits once every
    /// [`HubHandle`] has been dropped.
    pub fn spawn(config: HubConfig) -> HubHandle {
        let (hub, handle) = Self::new(config);
        tokio::spawn(hub.run());
        handle
    }

    fn new(config: HubConfig) -> (Self, HubHandle) {
        let (sender, receiver) = mpsc::channel(config.command_capacity.max(1));
        let hub = Self {
            registry: BTreeMap::new(),
            receiver,
            stats: HubStats::default(),
        };
        let handle = HubHandle {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        (hub, handle)
    }

    async fn run(mut self) {
        info!("Hub started");

        while let Some(command) = self.receiver.recv().await {
            let outcome = catch_unwind(AssertUnwindSafe(|| self.handle(command)));
            if outcome.is_err() {
                error!("Hub event handler panicked, continuing with next event");
            }
        }

        info!(members = self.registry.len(), "Hub stopped");
    }

    fn handle(&mut self, command: HubCommand) {
        self.stats.events_processed += 1;

        match command {
            HubCommand::Join { session, mailbox } => self.join(session, mailbox),
            HubCommand::Leave { session } => self.leave(session),
            HubCommand::Route { message } => self.route(message),
            HubCommand::SetName { session, nickname } => self.set_name(session, nickname),
            HubCommand::Members { respond_to } => {
                let _ = respond_to.send(self.identities());
            }
            HubCommand::Stats { respond_to } => {
                let _ = respond_to.send(HubStats {
                    members: self.registry.len(),
                    ..self.stats.clone()
                });
            }
        }
    }

    fn join(&mut self, session: SessionId, mailbox: MailboxSender) {
        match self.registry.entry(session) {
            Entry::Occupied(_) => {
                debug!(%session, "Session already registered");
            }
            Entry::Vacant(slot) => {
                if mailbox.is_closed() {
                    debug!(%session, "Ignoring join with a closed mailbox");
                    return;
                }
                slot.insert(Member {
                    identity: String::new(),
                    mailbox,
                });
                info!(%session, "Session joined");
            }
        }

        self.broadcast_members();
    }

    fn leave(&mut self, session: SessionId) {
        // Dropping the member drops the only mailbox sender.
        let Some(member) = self.registry.remove(&session) else {
            debug!(%session, "Leave for unregistered session ignored");
            return;
        };
        info!(
            %session,
            identity = %member.identity,
            members = self.registry.len(),
            "Session left"
        );
        drop(member);

        self.broadcast_members();
    }

    fn route(&mut self, message: ChatMessage) {
        let frame = match encode_chat(&message) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode chat message: {}", e);
                return;
            }
        };

        match message.recipient() {
            Some(to) => {
                let target = self
                    .registry
                    .iter()
                    .find(|(_, member)| member.identity == to)
                    .map(|(id, _)| *id);

                match target {
                    Some(id) => self.deliver(vec![id], frame),
                    None => {
                        self.stats.unrouted += 1;
                        debug!(to, from = %message.from, "Directed message dropped, no such recipient");
                    }
                }
            }
            None => {
                let targets = self.registry.keys().copied().collect();
                self.deliver(targets, frame);
            }
        }
    }

    fn set_name(&mut self, session: SessionId, nickname: String) {
        let Some(member) = self.registry.get_mut(&session) else {
            debug!(%session, "Rename for unregistered session ignored");
            return;
        };

        if member.identity != nickname {
            info!(%session, old = %member.identity, new = %nickname, "Session renamed");
            member.identity = nickname;
        }

        self.broadcast_members();
    }

    fn identities(&self) -> Vec<String> {
        self.registry
            .values()
            .map(|member| member.identity.clone())
            .collect()
    }

    fn user_list_frame(&self) -> Option<Frame> {
        match encode_user_list(&self.identities()) {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!("Failed to encode user list: {}", e);
                None
            }
        }
    }

    fn broadcast_members(&mut self) {
        let Some(frame) = self.user_list_frame() else {
            return;
        };
        let targets = self.registry.keys().copied().collect();
        self.deliver(targets, frame);
    }

    fn deliver(&mut self, targets: Vec<SessionId>, frame: Frame) {
        let dead = self.enqueue(&targets, &frame);
        self.prune(dead);
    }

    /// Non-blocking enqueue onto each target's mailbox. A full mailbox loses
    /// this one frame; a closed one is reported back for pruning.
    fn enqueue(&mut self, targets: &[SessionId], frame: &Frame) -> Vec<SessionId> {
        let mut dead = Vec::new();

        for id in targets {
            let Some(member) = self.registry.get(id) else {
                continue;
            };
            match member.mailbox.try_send(frame.clone()) {
                Ok(()) => self.stats.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.stats.dropped_full += 1;
                    warn!(session = %id, identity = %member.identity, "Mailbox full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
            }
        }

        dead
    }

    /// Remove sessions whose egress side is gone, then tell the rest. The
    /// follow-up broadcast can uncover more dead mailboxes, hence the loop.
    fn prune(&mut self, mut dead: Vec<SessionId>) {
        while !dead.is_empty() {
            for id in dead.drain(..) {
                if let Some(member) = self.registry.remove(&id) {
                    self.stats.pruned += 1;
                    info!(session = %id, identity = %member.identity, "Pruned session with closed mailbox");
                }
            }

            let Some(frame) = self.user_list_frame() else {
                return;
            };
            let targets: Vec<SessionId> = self.registry.keys().copied().collect();
            dead = self.enqueue(&targets, &frame);
        }
    }
}
