//! Message router
//!
//! Single dispatch point for inbound frames. Participants address peers by
//! user id, relays address them by `(roomId, index)`; the router translates
//! between the two views and decides where each outbound frame goes.
//!
//! The router owns no I/O. Each call maps `(state, frame)` to the frames to
//! emit, which keeps every transition testable without a socket.

use super::protocol::{ClientFrame, ServerFrame};
use super::registry::ConnectionRegistry;
use super::relay_slots::{RelayRole, RelaySlots};
use super::rooms::{RoomSummary, RoomTable};
use super::{ConnectionId, SignalingError};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// One frame addressed to one connection
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: ConnectionId,
    pub frame: ServerFrame,
}

impl Outbound {
    pub fn new(to: ConnectionId, frame: ServerFrame) -> Self {
        Self { to, frame }
    }
}

/// Result of routing one inbound text frame
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Tag of the parsed frame, `None` when parsing failed
    pub tag: Option<&'static str>,
    /// Frames to deliver, including any `error` frame for the sender
    pub outbound: Vec<Outbound>,
    /// Error raised while handling the frame
    pub error: Option<SignalingError>,
}

/// Point-in-time view of the routing state
#[derive(Debug, Clone, Serialize)]
pub struct RouterSnapshot {
    pub connections: usize,
    pub users: usize,
    pub rooms: Vec<RoomSummary>,
    pub primary_relay: bool,
    pub secondary_relay: bool,
}

#[derive(Debug, Default)]
pub struct Router {
    registry: ConnectionRegistry,
    rooms: RoomTable,
    relays: RelaySlots,
    open: BTreeSet<ConnectionId>,
    relay_token: Option<String>,
    max_frame_bytes: usize,
}

impl Router {
    pub fn new(relay_token: Option<String>, max_frame_bytes: usize) -> Self {
        Self {
            relay_token,
            max_frame_bytes,
            ..Default::default()
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomTable {
        &self.rooms
    }

    pub fn relays(&self) -> &RelaySlots {
        &self.relays
    }

    pub fn connection_count(&self) -> usize {
        self.open.len()
    }

    pub fn snapshot(&self) -> RouterSnapshot {
        RouterSnapshot {
            connections: self.open.len(),
            users: self.registry.len(),
            rooms: self.rooms.summaries(),
            primary_relay: self.relays.primary().is_ok(),
            secondary_relay: self.relays.has_secondary(),
        }
    }

    /// A transport connection opened
    pub fn connect(&mut self, connection: ConnectionId) {
        self.open.insert(connection);
    }

    /// A transport connection closed: forget its identity, free its relay
    /// slots and tell everyone else it went offline.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Vec<Outbound> {
        self.open.remove(&connection);

        for role in self.relays.release(connection) {
            info!("{} relay {} disconnected, slot released", role.as_str(), connection);
        }

        match self.registry.remove(connection) {
            Some(user_id) => {
                debug!("User {} went offline ({})", user_id, connection);
                self.broadcast(ServerFrame::Status { user_id, online: false })
            }
            None => Vec::new(),
        }
    }

    /// Parse and route one text frame. Failures become an `error` frame for the
    /// sender; unreachable targets are only logged.
    pub fn dispatch_text(&mut self, from: ConnectionId, text: &str) -> Dispatch {
        match ClientFrame::parse(text, self.max_frame_bytes) {
            Ok(frame) => self.dispatch(from, frame),
            Err(err) => {
                warn!("Invalid frame from {}: {}", from, err);
                Dispatch {
                    tag: None,
                    outbound: error_reply(from, &err),
                    error: Some(err),
                }
            }
        }
    }

    pub fn dispatch(&mut self, from: ConnectionId, frame: ClientFrame) -> Dispatch {
        let tag = frame.tag();
        match self.handle(from, frame) {
            Ok(outbound) => {
                debug!("Routed {} from {} to {} target(s)", tag, from, outbound.len());
                Dispatch {
                    tag: Some(tag),
                    outbound,
                    error: None,
                }
            }
            Err(err) => {
                match err {
                    SignalingError::TargetUnreachable(_) => {
                        warn!("Dropping {} from {}: {}", tag, from, err)
                    }
                    _ => debug!("Rejected {} from {}: {}", tag, from, err),
                }
                Dispatch {
                    tag: Some(tag),
                    outbound: error_reply(from, &err),
                    error: Some(err),
                }
            }
        }
    }

    /// Tag -> handler table
    pub fn handle(
        &mut self,
        from: ConnectionId,
        frame: ClientFrame,
    ) -> Result<Vec<Outbound>, SignalingError> {
        match frame {
            ClientFrame::Join { user_id } => Ok(self.on_join(from, user_id)),
            ClientFrame::DeclarePrimaryRelay { token } => self.on_declare_primary(from, token),
            ClientFrame::DeclareSecondaryRelay { token } => self.on_declare_secondary(from, token),
            ClientFrame::Start { room_id, user_id } => self.on_start(from, room_id, user_id),
            ClientFrame::RelayAckAddPeer { room_id, index } => {
                self.on_relay_ack_add_peer(room_id, index)
            }
            ClientFrame::Offer {
                room_id,
                user_id,
                sdp_offer,
            } => self.on_offer(room_id, user_id, sdp_offer),
            ClientFrame::Answer {
                room_id,
                index,
                sdp_answer,
            } => self.on_answer(room_id, index, sdp_answer),
            ClientFrame::IceCandidate {
                room_id,
                user_id,
                candidate,
            } => self.on_ice_candidate(room_id, user_id, candidate),
            ClientFrame::IceCandidateAck {
                room_id,
                index,
                candidate,
            } => self.on_ice_candidate_ack(room_id, index, candidate),
            ClientFrame::OfferSecondary {
                room_id,
                index,
                sdp_offer,
            } => self.on_offer_secondary(from, room_id, index, sdp_offer),
            ClientFrame::AnswerSecondary {
                room_id,
                user_id,
                sdp_answer,
            } => self.on_answer_secondary(room_id, user_id, sdp_answer),
            ClientFrame::IceCandidateSecondaryAck {
                room_id,
                index,
                candidate,
            } => self.on_ice_candidate_secondary_ack(room_id, index, candidate),
            ClientFrame::IceCandidateSecondary {
                room_id,
                user_id,
                candidate,
            } => self.on_ice_candidate_secondary(room_id, user_id, candidate),
            ClientFrame::Leave { room_id, user_id } => self.on_leave(from, room_id, user_id),
            ClientFrame::Heartbeat {} => Ok(vec![Outbound::new(from, ServerFrame::HeartbeatAck)]),
        }
    }

    fn on_join(&mut self, from: ConnectionId, user_id: String) -> Vec<Outbound> {
        let mut outbound = self.adopt_identity(from, &user_id);
        info!("User {} joined on {}", user_id, from);
        outbound.extend(self.broadcast(ServerFrame::Status {
            user_id,
            online: true,
        }));
        outbound
    }

    fn on_declare_primary(
        &mut self,
        from: ConnectionId,
        token: Option<String>,
    ) -> Result<Vec<Outbound>, SignalingError> {
        self.authorize_relay(RelayRole::Primary, token.as_deref())?;
        match self.relays.declare_primary(from) {
            Some(previous) if previous != from => {
                info!("Primary relay moved from {} to {}", previous, from)
            }
            Some(_) => {}
            None => info!("Primary relay declared by {}", from),
        }
        Ok(Vec::new())
    }

    fn on_declare_secondary(
        &mut self,
        from: ConnectionId,
        token: Option<String>,
    ) -> Result<Vec<Outbound>, SignalingError> {
        self.authorize_relay(RelayRole::Secondary, token.as_deref())?;
        self.relays.declare_secondary(from).map_err(|err| {
            warn!("Rejected secondary relay claim from {}", from);
            err
        })?;
        info!("Secondary relay held by {}", from);
        Ok(Vec::new())
    }

    fn on_start(
        &mut self,
        from: ConnectionId,
        room_id: String,
        user_id: String,
    ) -> Result<Vec<Outbound>, SignalingError> {
        let relay = self.relays.primary()?;
        let index = self.rooms.join_room(&room_id, &user_id);
        let mut outbound = self.adopt_identity(from, &user_id);
        info!("User {} entered room {} as peer {}", user_id, room_id, index);
        outbound.push(Outbound::new(relay, ServerFrame::AddPeer { room_id, index }));
        Ok(outbound)
    }

    fn on_relay_ack_add_peer(
        &mut self,
        room_id: String,
        index: usize,
    ) -> Result<Vec<Outbound>, SignalingError> {
        let peer = self.peer_connection(&room_id, index)?;
        Ok(vec![Outbound::new(peer, ServerFrame::Start { room_id, index })])
    }

    fn on_offer(
        &mut self,
        room_id: String,
        user_id: String,
        sdp_offer: Value,
    ) -> Result<Vec<Outbound>, SignalingError> {
        let relay = self.relays.primary()?;
        let index = self.rooms.index_of(&room_id, &user_id)?;
        Ok(vec![Outbound::new(
            relay,
            ServerFrame::Offer {
                room_id,
                index,
                sdp_offer,
            },
        )])
    }

    fn on_answer(
        &mut self,
        room_id: String,
        index: usize,
        sdp_answer: Value,
    ) -> Result<Vec<Outbound>, SignalingError> {
        let peer = self.peer_connection(&room_id, index)?;
        Ok(vec![Outbound::new(peer, ServerFrame::AnswerReady { sdp_answer })])
    }

    fn on_ice_candidate(
        &mut self,
        room_id: String,
        user_id: String,
        candidate: Value,
    ) -> Result<Vec<Outbound>, SignalingError> {
        let relay = self.relays.primary()?;
        let index = self.rooms.index_of(&room_id, &user_id)?;
        Ok(vec![Outbound::new(
            relay,
            ServerFrame::IceCandidateRelay {
                room_id,
                index,
                candidate,
            },
        )])
    }

    fn on_ice_candidate_ack(
        &mut self,
        room_id: String,
        index: usize,
        candidate: Value,
    ) -> Result<Vec<Outbound>, SignalingError> {
        let peer = self.peer_connection(&room_id, index)?;
        Ok(vec![Outbound::new(peer, ServerFrame::IceCandidateDeliver { candidate })])
    }

    fn on_offer_secondary(
        &mut self,
        from: ConnectionId,
        room_id: String,
        index: usize,
        sdp_offer: Value,
    ) -> Result<Vec<Outbound>, SignalingError> {
        let peer = self.peer_connection(&room_id, index)?;

        // Implicit claim only while relay declarations are unauthenticated
        if self.relay_token.is_none() && !self.relays.has_secondary() {
            self.relays.declare_secondary(from)?;
            info!("Secondary relay latched to {}", from);
        }

        Ok(vec![Outbound::new(peer, ServerFrame::OfferSecondary { sdp_offer })])
    }

    fn on_answer_secondary(
        &mut self,
        room_id: String,
        user_id: String,
        sdp_answer: Value,
    ) -> Result<Vec<Outbound>, SignalingError> {
        let relay = self.relays.secondary()?;
        let index = self.rooms.index_of(&room_id, &user_id)?;
        Ok(vec![Outbound::new(
            relay,
            ServerFrame::AnswerSecondary {
                room_id,
                index,
                sdp_answer,
            },
        )])
    }

    fn on_ice_candidate_secondary_ack(
        &mut self,
        room_id: String,
        index: usize,
        candidate: Value,
    ) -> Result<Vec<Outbound>, SignalingError> {
        let peer = self.peer_connection(&room_id, index)?;
        Ok(vec![Outbound::new(
            peer,
            ServerFrame::IceCandidateSecondaryDeliver { candidate },
        )])
    }

    fn on_ice_candidate_secondary(
        &mut self,
        room_id: String,
        user_id: String,
        candidate: Value,
    ) -> Result<Vec<Outbound>, SignalingError> {
        let relay = self.relays.secondary()?;
        let index = self.rooms.index_of(&room_id, &user_id)?;
        Ok(vec![Outbound::new(
            relay,
            ServerFrame::IceCandidateSecondaryRelay {
                room_id,
                index,
                candidate,
            },
        )])
    }

    fn on_leave(
        &mut self,
        from: ConnectionId,
        room_id: String,
        user_id: String,
    ) -> Result<Vec<Outbound>, SignalingError> {
        self.rooms.index_of(&room_id, &user_id)?;
        if self.registry.lookup_connection(&user_id) != Some(from) {
            warn!("Rejected leave for {} from {}", user_id, from);
            return Err(SignalingError::Unauthorized(format!(
                "connection does not hold user {}",
                user_id
            )));
        }

        let indices = self.rooms.leave_room(&room_id, &user_id)?;
        info!("User {} left room {} (peers {:?})", user_id, room_id, indices);

        let mut outbound = Vec::with_capacity(indices.len() + 1);
        if let Ok(relay) = self.relays.primary() {
            for &index in &indices {
                outbound.push(Outbound::new(
                    relay,
                    ServerFrame::RemovePeer {
                        room_id: room_id.clone(),
                        index,
                    },
                ));
            }
        }
        outbound.push(Outbound::new(from, ServerFrame::Left { room_id, indices }));
        Ok(outbound)
    }

    /// Bind `user_id` to `from`. A connection switching identity takes its
    /// old one offline.
    fn adopt_identity(&mut self, from: ConnectionId, user_id: &str) -> Vec<Outbound> {
        let displaced = self
            .registry
            .lookup_user_id(from)
            .filter(|previous| *previous != user_id)
            .filter(|previous| self.registry.lookup_connection(previous) == Some(from))
            .map(str::to_string);

        self.registry.register(user_id, from);

        match displaced {
            Some(previous) => self.broadcast(ServerFrame::Status {
                user_id: previous,
                online: false,
            }),
            None => Vec::new(),
        }
    }

    fn authorize_relay(&self, role: RelayRole, token: Option<&str>) -> Result<(), SignalingError> {
        match self.relay_token.as_deref() {
            None => Ok(()),
            Some(expected) if token == Some(expected) => Ok(()),
            Some(_) => Err(SignalingError::Unauthorized(format!(
                "{} relay declaration requires a valid token",
                role.as_str()
            ))),
        }
    }

    /// `(room, index)` -> user id -> open connection
    fn peer_connection(&self, room_id: &str, index: usize) -> Result<ConnectionId, SignalingError> {
        let user_id = self.rooms.resolve(room_id, index)?;
        self.registry
            .lookup_connection(user_id)
            .filter(|connection| self.open.contains(connection))
            .ok_or_else(|| {
                SignalingError::TargetUnreachable(format!(
                    "peer {} in room {} ({}) has no open connection",
                    index, room_id, user_id
                ))
            })
    }

    fn broadcast(&self, frame: ServerFrame) -> Vec<Outbound> {
        self.open
            .iter()
            .map(|&to| Outbound::new(to, frame.clone()))
            .collect()
    }
}

fn error_reply(from: ConnectionId, err: &SignalingError) -> Vec<Outbound> {
    ServerFrame::error(err)
        .map(|frame| vec![Outbound::new(from, frame)])
        .unwrap_or_default()
}
