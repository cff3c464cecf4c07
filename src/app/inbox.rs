//! Inbound message queue between the transport and the control loop.
//!
//! ```text
//! ┌──────────────┐  InboundMessage  ┌──────────────┐
//! │  Transport   │─────try_send────▶│ Control loop │
//! │ (any thread) │                  │ (step 1 only)│
//! └──────────────┘                  └──────────────┘
//! ```
//!
//! Backed by a bounded `embassy-sync` channel.  The producer never blocks:
//! when the queue is full the message is dropped, which is consistent with
//! at-most-once delivery.

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::{String, Vec};

use crate::model::Timestamp;

/// Longest topic carried through the queue (bytes).
pub const TOPIC_CAP: usize = 128;

/// Largest payload carried through the queue (bytes).
pub const PAYLOAD_CAP: usize = 512;

/// Queue depth.
pub const INBOX_DEPTH: usize = 16;

type InboxChannel = Channel<CriticalSectionRawMutex, InboundMessage, INBOX_DEPTH>;

/// One message delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String<TOPIC_CAP>,
    pub payload: Vec<u8, PAYLOAD_CAP>,
    pub received_at: Timestamp,
}

impl InboundMessage {
    /// `None` if the topic or payload exceeds the queue limits.
    pub fn new(topic: &str, payload: &[u8], received_at: Timestamp) -> Option<Self> {
        let mut t = String::new();
        t.push_str(topic).ok()?;
        Some(Self {
            topic: t,
            payload: Vec::from_slice(payload).ok()?,
            received_at,
        })
    }
}

/// Consumer half.  Cloning yields another handle onto the same queue.
#[derive(Clone)]
pub struct Inbox {
    channel: Arc<InboxChannel>,
}

/// Producer half, held by the transport.
#[derive(Clone)]
pub struct InboxSender {
    channel: Arc<InboxChannel>,
}

/// Create a connected sender/inbox pair.
pub fn inbox() -> (InboxSender, Inbox) {
    let channel = Arc::new(InboxChannel::new());
    (
        InboxSender {
            channel: Arc::clone(&channel),
        },
        Inbox { channel },
    )
}

impl InboxSender {
    /// Enqueue without blocking.  Returns `false` if the queue was full.
    pub fn offer(&self, msg: InboundMessage) -> bool {
        self.channel.try_send(msg).is_ok()
    }
}

impl Inbox {
    /// Next queued message, if any.
    pub fn try_next(&self) -> Option<InboundMessage> {
        self.channel.try_receive().ok()
    }

    /// Wait for the next message.
    pub async fn next(&self) -> InboundMessage {
        self.channel.receive().await
    }

    /// Number of queued messages.
    pub fn pending(&self) -> usize {
        self.channel.len()
    }

    /// Iterate over what is queued right now; never waits.
    pub fn drain(&self) -> impl Iterator<Item = InboundMessage> + '_ {
        core::iter::from_fn(move || self.try_next())
    }
}
