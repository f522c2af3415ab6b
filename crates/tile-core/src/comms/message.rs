//! Bus messages.
//!
//! Everything but the processed-by set is fixed once a message is built; the
//! set only grows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tile_events::{payload_priority_bonus, EntityKind, MessageKind, Position, Tick};

use crate::components::AgentId;
use crate::memory::Percept;

/// Bus-assigned message identifier, increasing in posting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg_{:08}", self.0)
    }
}

/// Who a message is for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    Broadcast,
    Agent(AgentId),
}

/// One gossip message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    sender: AgentId,
    recipient: Recipient,
    kind: MessageKind,
    payload: Option<Percept>,
    priority: u8,
    urgency: u8,
    timestamp: Tick,
    processed_by: BTreeSet<AgentId>,
}

impl Message {
    /// Builds an unposted message. The bus assigns the id when it is posted.
    pub fn new(
        sender: AgentId,
        recipient: Recipient,
        kind: MessageKind,
        payload: Option<Percept>,
        timestamp: Tick,
    ) -> Self {
        Self {
            id: MessageId(0),
            priority: priority_for(kind, payload.as_ref()),
            urgency: kind.urgency(),
            sender,
            recipient,
            kind,
            payload,
            timestamp,
            processed_by: BTreeSet::new(),
        }
    }

    pub fn broadcast(sender: AgentId, kind: MessageKind, payload: Option<Percept>, timestamp: Tick) -> Self {
        Self::new(sender, Recipient::Broadcast, kind, payload, timestamp)
    }

    pub fn direct(
        sender: AgentId,
        to: AgentId,
        kind: MessageKind,
        payload: Option<Percept>,
        timestamp: Tick,
    ) -> Self {
        Self::new(sender, Recipient::Agent(to), kind, payload, timestamp)
    }

    pub(super) fn assign_id(&mut self, id: MessageId) {
        self.id = id;
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn sender(&self) -> &AgentId {
        &self.sender
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn payload(&self) -> Option<&Percept> {
        self.payload.as_ref()
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn urgency(&self) -> u8 {
        self.urgency
    }

    pub fn timestamp(&self) -> Tick {
        self.timestamp
    }

    pub fn is_broadcast(&self) -> bool {
        self.recipient == Recipient::Broadcast
    }

    pub fn is_addressed_to(&self, agent: &AgentId) -> bool {
        match &self.recipient {
            Recipient::Broadcast => true,
            Recipient::Agent(id) => id == agent,
        }
    }

    pub fn is_processed_by(&self, agent: &AgentId) -> bool {
        self.processed_by.contains(agent)
    }

    /// Records that `agent` has handled this message. Returns false if it already had.
    pub(super) fn mark_processed_by(&mut self, agent: &AgentId) -> bool {
        self.processed_by.insert(agent.clone())
    }

    pub fn processed_by(&self) -> impl Iterator<Item = &AgentId> {
        self.processed_by.iter()
    }

    /// Whether the payload names an entity of `kind` at `position`
    pub fn describes(&self, kind: EntityKind, position: Position) -> bool {
        matches!(self.payload, Some(p) if p.kind == kind && p.position == position)
    }
}

/// Kind priority plus the payload bonus: fuel stations matter most, then tiles
pub fn priority_for(kind: MessageKind, payload: Option<&Percept>) -> u8 {
    kind.base_priority() + payload.map_or(0, |p| payload_priority_bonus(p.kind))
}
