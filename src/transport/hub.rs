//! Signaling hub
//!
//! One task owns the [`Router`] and every connection's send queue. Connection
//! tasks feed it connect / frame / disconnect events over a channel, so frames
//! are handled one at a time in arrival order and no signaling state is ever
//! shared between tasks. Delivery is a non-blocking enqueue on the target's
//! send queue.

use crate::metrics::Metrics;
use crate::signaling::router::{Outbound, Router, RouterSnapshot};
use crate::signaling::ConnectionId;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Events fed to the hub task
#[derive(Debug)]
pub enum HubCommand {
    Connect {
        connection: ConnectionId,
        sender: mpsc::UnboundedSender<String>,
    },
    Frame {
        connection: ConnectionId,
        text: String,
    },
    Disconnect {
        connection: ConnectionId,
    },
    Snapshot {
        reply: oneshot::Sender<RouterSnapshot>,
    },
}

/// Cloneable handle used by connection tasks and HTTP handlers
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Register a connection's send queue. Returns false once the hub has stopped.
    pub fn connect(&self, connection: ConnectionId, sender: mpsc::UnboundedSender<String>) -> bool {
        self.commands
            .send(HubCommand::Connect { connection, sender })
            .is_ok()
    }

    pub fn frame(&self, connection: ConnectionId, text: String) -> bool {
        self.commands
            .send(HubCommand::Frame { connection, text })
            .is_ok()
    }

    pub fn disconnect(&self, connection: ConnectionId) {
        let _ = self.commands.send(HubCommand::Disconnect { connection });
    }

    pub async fn snapshot(&self) -> Option<RouterSnapshot> {
        let (reply, response) = oneshot::channel();
        self.commands.send(HubCommand::Snapshot { reply }).ok()?;
        response.await.ok()
    }
}

pub struct SignalingHub {
    router: Router,
    outboxes: HashMap<ConnectionId, mpsc::UnboundedSender<String>>,
    metrics: Arc<Metrics>,
}

impl SignalingHub {
    pub fn new(router: Router, metrics: Arc<Metrics>) -> Self {
        Self {
            router,
            outboxes: HashMap::new(),
            metrics,
        }
    }

    /// Start the hub task
    pub fn spawn(self) -> (HubHandle, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(receiver));
        (HubHandle { commands }, task)
    }

    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<HubCommand>) {
        info!("Signaling hub started");
        while let Some(command) = receiver.recv().await {
            self.handle_command(command);
        }
        info!("Signaling hub stopped");
    }

    pub fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect { connection, sender } => {
                self.outboxes.insert(connection, sender);
                self.router.connect(connection);
                debug!("Connection {} attached to hub", connection);
            }
            HubCommand::Frame { connection, text } => {
                let dispatch = self.router.dispatch_text(connection, &text);
                self.metrics.record_frame(dispatch.tag.unwrap_or("invalid"));
                if let Some(err) = &dispatch.error {
                    self.metrics.record_error(err.label());
                }
                self.deliver(dispatch.outbound);
            }
            HubCommand::Disconnect { connection } => {
                self.outboxes.remove(&connection);
                let outbound = self.router.disconnect(connection);
                self.deliver(outbound);
                debug!("Connection {} detached from hub", connection);
            }
            HubCommand::Snapshot { reply } => {
                let _ = reply.send(self.router.snapshot());
            }
        }

        self.metrics.set_connections(self.router.connection_count());
        self.metrics.set_rooms(self.router.rooms().len());
    }

    fn deliver(&mut self, outbound: Vec<Outbound>) {
        for Outbound { to, frame } in outbound {
            let payload = match frame.to_json() {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to serialize frame for {}: {}", to, e);
                    continue;
                }
            };

            match self.outboxes.get(&to) {
                Some(sender) => {
                    if sender.send(payload).is_err() {
                        warn!("Connection {} closed before delivery, frame dropped", to);
                        self.metrics.record_dropped();
                    }
                }
                None => {
                    warn!("No open connection {}, frame dropped", to);
                    self.metrics.record_dropped();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::ServerFrame;
    use serde_json::json;

    fn hub() -> SignalingHub {
        SignalingHub::new(
            Router::new(None, 64 * 1024),
            Arc::new(Metrics::new().unwrap()),
        )
    }

    fn attach(hub: &mut SignalingHub) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let connection = ConnectionId::new();
        let (sender, receiver) = mpsc::unbounded_channel();
        hub.handle_command(HubCommand::Connect { connection, sender });
        (connection, receiver)
    }

    fn frame(hub: &mut SignalingHub, connection: ConnectionId, value: serde_json::Value) {
        hub.handle_command(HubCommand::Frame {
            connection,
            text: value.to_string(),
        });
    }

    fn next(receiver: &mut mpsc::UnboundedReceiver<String>) -> Option<ServerFrame> {
        receiver
            .try_recv()
            .ok()
            .map(|text| serde_json::from_str(&text).unwrap())
    }

    #[test]
    fn delivers_to_target_queues() {
        let mut hub = hub();
        let (relay, mut relay_rx) = attach(&mut hub);
        let (alice, mut alice_rx) = attach(&mut hub);

        frame(&mut hub, relay, json!({"type": "declare-primary-relay"}));
        frame(&mut hub, alice, json!({"type": "start", "data": {"roomId": "r", "userId": "alice"}}));

        assert_eq!(
            next(&mut relay_rx),
            Some(ServerFrame::AddPeer { room_id: "r".to_string(), index: 0 })
        );
        assert_eq!(next(&mut alice_rx), None);

        frame(&mut hub, alice, json!({"type": "heartbeat"}));
        assert_eq!(next(&mut alice_rx), Some(ServerFrame::HeartbeatAck));
    }

    #[test]
    fn disconnect_broadcasts_to_remaining_queues() {
        let mut hub = hub();
        let (alice, _alice_rx) = attach(&mut hub);
        let (_bob, mut bob_rx) = attach(&mut hub);

        frame(&mut hub, alice, json!({"type": "join", "data": {"userId": "alice"}}));
        assert_eq!(
            next(&mut bob_rx),
            Some(ServerFrame::Status { user_id: "alice".to_string(), online: true })
        );

        hub.handle_command(HubCommand::Disconnect { connection: alice });
        assert_eq!(
            next(&mut bob_rx),
            Some(ServerFrame::Status { user_id: "alice".to_string(), online: false })
        );
        assert_eq!(hub.metrics.connections(), 1);
    }

    #[test]
    fn closed_queue_counts_as_dropped() {
        let mut hub = hub();
        let (alice, alice_rx) = attach(&mut hub);
        drop(alice_rx);

        frame(&mut hub, alice, json!({"type": "heartbeat"}));
        let text = hub.metrics.render().unwrap();
        assert!(text.contains("campus_signal_dropped_total 1"));
    }

    #[tokio::test]
    async fn spawned_hub_answers_snapshot() {
        let (handle, _task) = hub().spawn();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let connection = ConnectionId::new();

        assert!(handle.connect(connection, sender));
        assert!(handle.frame(connection, json!({"type": "heartbeat"}).to_string()));
        let reply = receiver.recv().await.unwrap();
        assert_eq!(serde_json::from_str::<ServerFrame>(&reply).unwrap(), ServerFrame::HeartbeatAck);

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.connections, 1);
    }
}
