//! Gossip between agents over a shared bus.
//!
//! Agents announce what they see, retract what they remove, and read each
//! message addressed to them exactly once.

mod bus;
mod message;
mod messenger;

pub use bus::CommunicationBus;
pub use message::{priority_for, Message, MessageId, Recipient};
pub use messenger::{Inbox, Messenger};
