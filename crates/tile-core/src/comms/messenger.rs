//! Per-agent side of the gossip protocol.

use tile_events::{AgentEvent, AgentEventKind, EntityKind, MessageKind, Position, Tick};

use super::bus::CommunicationBus;
use super::message::{Message, MessageId};
use crate::components::AgentId;
use crate::events::EventSink;
use crate::memory::{Observation, Percept, SpatialMemory};

/// What an agent learned from its unread messages this tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inbox {
    pub handled: usize,
    /// Highest urgency among handled messages, 0 if none
    pub max_urgency: u8,
    pub fuel_station: Option<Position>,
    /// Agents that asked for help or reported low fuel
    pub help_requests: Vec<AgentId>,
}

/// Announces what its agent sees and applies what peers report
#[derive(Debug, Clone)]
pub struct Messenger {
    agent_id: AgentId,
    sensor_range: i32,
    fuel_low_announced: bool,
    help_requested: bool,
}

impl Messenger {
    pub fn new(agent_id: AgentId, sensor_range: i32) -> Self {
        Self {
            agent_id,
            sensor_range,
            fuel_low_announced: false,
            help_requested: false,
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    fn emit(&self, sink: &mut dyn EventSink, now: Tick, kind: AgentEventKind) {
        sink.emit(AgentEvent::new(now, self.agent_id.as_str(), kind));
    }

    /// Posts `message` and reports it
    pub fn send(&self, bus: &mut CommunicationBus, message: Message, sink: &mut dyn EventSink) -> MessageId {
        let (kind, priority, urgency, now) =
            (message.kind(), message.priority(), message.urgency(), message.timestamp());
        let id = bus.post(message);
        self.emit(
            sink,
            now,
            AgentEventKind::MessageSent {
                message_id: id.0,
                message_kind: kind,
                priority,
                urgency,
            },
        );
        id
    }

    /// Broadcasts a discovery for every entity in sensor range that no live
    /// message already announces. A sensed fuel station is also recorded in
    /// the agent's own station slot.
    pub fn announce_discoveries(
        &self,
        origin: Position,
        observations: &[Observation],
        memory: &mut SpatialMemory,
        bus: &mut CommunicationBus,
        now: Tick,
        sink: &mut dyn EventSink,
    ) -> Vec<MessageId> {
        let mut posted = Vec::new();

        for observation in observations {
            if origin.chebyshev(observation.position) > self.sensor_range {
                continue;
            }
            let Some(message_kind) = MessageKind::discovery_for(observation.kind) else {
                continue;
            };
            let percept = Percept::new(observation.kind, observation.position, now);

            if observation.kind == EntityKind::FuelStation && memory.fuel_station().is_none() {
                if let Err(error) = memory.apply_external(percept) {
                    self.reject(sink, now, percept.position, &error);
                    continue;
                }
            }
            if bus.has_live_discovery(observation.kind, observation.position) {
                continue;
            }

            self.emit(
                sink,
                now,
                AgentEventKind::Discovery {
                    entity: observation.kind,
                    position: observation.position,
                },
            );
            let message = Message::broadcast(self.agent_id.clone(), message_kind, Some(percept), now);
            posted.push(self.send(bus, message, sink));
        }

        posted
    }

    /// Applies every unread message addressed to this agent.
    ///
    /// Discoveries are stored as observed at receipt; pickups and fills evict
    /// the matching cell.
    pub fn consume(
        &self,
        bus: &mut CommunicationBus,
        memory: &mut SpatialMemory,
        now: Tick,
        sink: &mut dyn EventSink,
    ) -> Inbox {
        let mut inbox = Inbox::default();
        let me = self.agent_id.clone();

        bus.consume(&me, |message| {
            inbox.handled += 1;
            inbox.max_urgency = inbox.max_urgency.max(message.urgency());
            self.emit(
                sink,
                now,
                AgentEventKind::MessageReceived {
                    message_id: message.id().0,
                    message_kind: message.kind(),
                    sender: message.sender().to_string(),
                },
            );

            let kind = message.kind();
            match (kind, message.payload().copied()) {
                (k, Some(reported)) if k.is_discovery() => {
                    let percept = Percept::new(reported.kind, reported.position, now);
                    match memory.apply_external(percept) {
                        Ok(()) => {
                            if percept.kind == EntityKind::FuelStation {
                                inbox.fuel_station = Some(percept.position);
                            }
                        }
                        Err(error) => self.reject(sink, now, percept.position, &error),
                    }
                }
                (MessageKind::TilePickedUp | MessageKind::HoleFilled, Some(percept)) => {
                    let Some(entity) = kind.retracts() else { return };
                    if memory.evict(percept.position, entity).is_some() {
                        self.emit(
                            sink,
                            now,
                            AgentEventKind::MemoryEvicted {
                                entity,
                                position: percept.position,
                            },
                        );
                    }
                }
                (MessageKind::FuelLow | MessageKind::RequestHelp, _) => {
                    if !inbox.help_requests.contains(message.sender()) {
                        inbox.help_requests.push(message.sender().clone());
                    }
                }
                _ => {}
            }
        });

        if inbox.handled > 0 {
            tracing::debug!(
                agent = %self.agent_id,
                handled = inbox.handled,
                max_urgency = inbox.max_urgency,
                "applied messages"
            );
        }
        inbox
    }

    /// Tells each requester where the fuel station is, if this agent knows.
    /// Replies go straight to the requester, past the discovery dedup.
    pub fn answer_help_requests(
        &self,
        requesters: &[AgentId],
        memory: &SpatialMemory,
        bus: &mut CommunicationBus,
        now: Tick,
        sink: &mut dyn EventSink,
    ) -> Vec<MessageId> {
        let Some(station) = memory.fuel_station() else {
            return Vec::new();
        };
        let percept = Percept::new(EntityKind::FuelStation, station, now);

        requesters
            .iter()
            .filter(|requester| **requester != self.agent_id)
            .map(|requester| {
                let reply = Message::direct(
                    self.agent_id.clone(),
                    requester.clone(),
                    MessageKind::FuelStationFound,
                    Some(percept),
                    now,
                );
                self.send(bus, reply, sink)
            })
            .collect()
    }

    /// Broadcasts `FuelLow` once when fuel drops under the threshold while no
    /// station is known, then `RequestHelp` once if fuel turns critical with
    /// still no station. Both re-arm after fuel recovers.
    pub fn announce_fuel_low(
        &mut self,
        fuel_low: bool,
        fuel_critical: bool,
        knows_station: bool,
        bus: &mut CommunicationBus,
        now: Tick,
        sink: &mut dyn EventSink,
    ) -> Option<MessageId> {
        if !fuel_low {
            self.fuel_low_announced = false;
            self.help_requested = false;
            return None;
        }
        if knows_station {
            return None;
        }
        let kind = if !self.fuel_low_announced {
            self.fuel_low_announced = true;
            MessageKind::FuelLow
        } else if fuel_critical && !self.help_requested {
            self.help_requested = true;
            MessageKind::RequestHelp
        } else {
            return None;
        };
        let message = Message::broadcast(self.agent_id.clone(), kind, None, now);
        Some(self.send(bus, message, sink))
    }

    /// Broadcasts that the tile or hole at `position` is gone
    pub fn announce_removal(
        &self,
        entity: EntityKind,
        position: Position,
        bus: &mut CommunicationBus,
        now: Tick,
        sink: &mut dyn EventSink,
    ) -> Option<MessageId> {
        let kind = match entity {
            EntityKind::Tile => MessageKind::TilePickedUp,
            EntityKind::Hole => MessageKind::HoleFilled,
            _ => return None,
        };
        let payload = Percept::new(entity, position, now);
        let message = Message::broadcast(self.agent_id.clone(), kind, Some(payload), now);
        Some(self.send(bus, message, sink))
    }

    fn reject(&self, sink: &mut dyn EventSink, now: Tick, position: Position, error: &dyn std::error::Error) {
        tracing::warn!(agent = %self.agent_id, %error, "dropping reported percept");
        self.emit(
            sink,
            now,
            AgentEventKind::IngestionRejected {
                position,
                reason: error.to_string(),
            },
        );
    }
}
