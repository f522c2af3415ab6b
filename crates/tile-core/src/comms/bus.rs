//! Shared message board.
//!
//! An append-only log of messages that every agent scans each tick. The bus
//! owns messages; agents read them and mark them processed.

use bevy_ecs::prelude::*;
use std::collections::{HashMap, HashSet};
use tile_events::{EntityKind, Position, Tick};

use super::message::{Message, MessageId};
use crate::components::AgentId;

/// Resource holding every posted message
#[derive(Resource, Debug, Default)]
pub struct CommunicationBus {
    messages: Vec<Message>,
    next_id: u64,
    /// Latest broadcast discovery per entity, until a pickup or fill retracts it
    live_discoveries: HashMap<(EntityKind, Position), MessageId>,
}

impl CommunicationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message, assigning its id. The sender counts as having
    /// processed its own message.
    pub fn post(&mut self, mut message: Message) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        message.assign_id(id);
        let sender = message.sender().clone();
        message.mark_processed_by(&sender);

        if let Some(payload) = message.payload().copied() {
            let kind = message.kind();
            if kind.is_discovery() && message.is_broadcast() {
                self.live_discoveries.insert((payload.kind, payload.position), id);
            } else if let Some(retracted) = kind.retracts() {
                self.live_discoveries.remove(&(retracted, payload.position));
            }
        }

        tracing::trace!(%id, kind = ?message.kind(), sender = %sender, "posted");
        self.messages.push(message);
        id
    }

    /// Every message still on the bus, in posting order
    pub fn read_all(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages
            .binary_search_by_key(&id, Message::id)
            .ok()
            .map(|idx| &self.messages[idx])
    }

    /// Whether a broadcast discovery of `kind` at `position` is still live
    pub fn has_live_discovery(&self, kind: EntityKind, position: Position) -> bool {
        self.live_discoveries.contains_key(&(kind, position))
    }

    /// Hands each message addressed to `agent` that it has not yet processed
    /// to `handle`, then marks it processed. Returns how many were handled.
    pub fn consume<F>(&mut self, agent: &AgentId, mut handle: F) -> usize
    where
        F: FnMut(&Message),
    {
        let mut handled = 0;
        for message in self.messages.iter_mut() {
            if !message.is_addressed_to(agent) || message.is_processed_by(agent) {
                continue;
            }
            handle(message);
            message.mark_processed_by(agent);
            handled += 1;
        }
        handled
    }

    /// Drops messages older than `max_age` ticks. Returns how many went.
    pub fn retain_recent(&mut self, now: Tick, max_age: Tick) -> usize {
        let before = self.messages.len();
        let mut dropped = HashSet::new();
        self.messages.retain(|message| {
            let keep = now.saturating_sub(message.timestamp()) <= max_age;
            if !keep {
                dropped.insert(message.id());
            }
            keep
        });
        if !dropped.is_empty() {
            self.live_discoveries.retain(|_, id| !dropped.contains(id));
        }
        before - self.messages.len()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
