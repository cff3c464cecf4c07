//! In-memory pub/sub broker.
//!
//! [`MemoryBroker`] routes messages between [`BrokerClient`]s by MQTT-style
//! filter.  It stands in for the real broker on a host: remote publishes
//! can be injected, sessions can be dropped and the broker made
//! unreachable, publishes can be forced to fail, and everything published
//! is kept in a log for inspection.
//!
//! Sessions are not persistent.  When a client loses its session every
//! subscription it held is gone; the client re-establishes them in
//! [`CommandChannel::maintain`] once the broker is reachable again.
//! Delivery is at-most-once: a full client queue drops the message.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::app::inbox::{InboundMessage, Inbox, InboxSender, inbox};
use crate::app::ports::{Clock, CommandChannel};
use crate::error::TransportError;
use crate::model::Timestamp;
use crate::topic;

use super::time::SystemClock;

/// Messages kept in the publish log; older entries are discarded.
pub const LOG_CAP: usize = 1024;

/// One message as it passed through the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Publishing client, or `None` for injected remote publishes.
    pub client_id: Option<String>,
    pub topic: String,
    pub payload: Vec<u8>,
    pub at: Timestamp,
}

struct Session {
    client_id: String,
    connected: bool,
}

struct Subscription {
    client: u64,
    filter: String,
    sender: InboxSender,
}

#[derive(Default)]
struct BrokerState {
    next_client: u64,
    sessions: HashMap<u64, Session>,
    subscriptions: Vec<Subscription>,
    log: VecDeque<PublishedMessage>,
    unreachable: bool,
    publish_fault: bool,
    dropped: u64,
}

impl BrokerState {
    fn route(&mut self, client_id: Option<&str>, topic: &str, payload: &[u8], at: Timestamp) -> usize {
        if self.log.len() == LOG_CAP {
            self.log.pop_front();
        }
        self.log.push_back(PublishedMessage {
            client_id: client_id.map(str::to_string),
            topic: topic.to_string(),
            payload: payload.to_vec(),
            at,
        });
        let Some(msg) = InboundMessage::new(topic, payload, at) else {
            warn!("broker: message on {topic} exceeds queue limits, not routed");
            self.dropped += 1;
            return 0;
        };
        let mut delivered = 0;
        for sub in self.subscriptions.iter().filter(|s| topic::matches(&s.filter, topic)) {
            if sub.sender.offer(msg.clone()) {
                delivered += 1;
            } else {
                warn!("broker: queue full for client #{}, dropping message on {topic}", sub.client);
                self.dropped += 1;
            }
        }
        delivered
    }

    fn end_session(&mut self, key: u64) {
        if let Some(session) = self.sessions.get_mut(&key) {
            session.connected = false;
        }
        self.subscriptions.retain(|s| s.client != key);
    }
}

/// Shared handle; clones talk to the same broker.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + Send + Sync + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            clock: Arc::new(clock),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a session for `client_id`.
    pub fn connect(&self, client_id: &str) -> BrokerClient {
        let mut state = self.lock();
        let key = state.next_client;
        state.next_client += 1;
        let connected = !state.unreachable;
        state.sessions.insert(
            key,
            Session {
                client_id: client_id.to_string(),
                connected,
            },
        );
        drop(state);
        BrokerClient {
            broker: self.clone(),
            key,
            filters: Vec::new(),
            queue: None,
        }
    }

    /// Publish as a remote party.  Returns how many subscribers got it.
    pub fn inject(&self, topic: &str, payload: &[u8]) -> usize {
        let at = self.clock.now_ms();
        self.lock().route(None, topic, payload, at)
    }

    /// Drop every session held by `client_id`.
    pub fn disconnect(&self, client_id: &str) {
        let mut state = self.lock();
        let keys: Vec<u64> = state
            .sessions
            .iter()
            .filter(|(_, s)| s.client_id == client_id)
            .map(|(k, _)| *k)
            .collect();
        for key in keys {
            state.end_session(key);
        }
    }

    /// While unreachable every session is down and reconnects fail.
    pub fn set_reachable(&self, reachable: bool) {
        let mut state = self.lock();
        state.unreachable = !reachable;
        if !reachable {
            let keys: Vec<u64> = state.sessions.keys().copied().collect();
            for key in keys {
                state.end_session(key);
            }
        }
    }

    /// Make every client publish fail with `PublishFailed`.
    pub fn set_publish_fault(&self, fault: bool) {
        self.lock().publish_fault = fault;
    }

    /// The most recent [`LOG_CAP`] publishes, injected messages included.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().log.iter().cloned().collect()
    }

    /// Payloads published on exactly `topic`, oldest first.
    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        self.lock()
            .log
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Messages dropped because a queue was full or they were too large.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }
}

/// One client session on a [`MemoryBroker`].
pub struct BrokerClient {
    broker: MemoryBroker,
    key: u64,
    /// Filters to restore after a session loss.
    filters: Vec<String>,
    queue: Option<(InboxSender, Inbox)>,
}

impl BrokerClient {
    fn sender(&mut self) -> (InboxSender, Inbox) {
        self.queue.get_or_insert_with(inbox).clone()
    }

    fn client_id(&self) -> String {
        self.broker
            .lock()
            .sessions
            .get(&self.key)
            .map(|s| s.client_id.clone())
            .unwrap_or_default()
    }
}

impl CommandChannel for BrokerClient {
    fn subscribe(&mut self, filter: &str) -> Result<Inbox, TransportError> {
        if !topic::is_valid_filter(filter) {
            return Err(TransportError::malformed("invalid subscription filter"));
        }
        if !self.is_connected() {
            return Err(TransportError::disconnected("subscribe while disconnected"));
        }
        let (sender, inbox) = self.sender();
        self.broker.lock().subscriptions.push(Subscription {
            client: self.key,
            filter: filter.to_string(),
            sender,
        });
        if !self.filters.iter().any(|f| f == filter) {
            self.filters.push(filter.to_string());
        }
        Ok(inbox)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !topic::is_valid_topic(topic) {
            return Err(TransportError::malformed("invalid publish topic"));
        }
        let at = self.broker.clock.now_ms();
        let mut state = self.broker.lock();
        let Some(session) = state.sessions.get(&self.key) else {
            return Err(TransportError::disconnected("no session"));
        };
        if !session.connected {
            return Err(TransportError::disconnected("session lost"));
        }
        if state.publish_fault {
            return Err(TransportError::publish_failed("broker rejected publish"));
        }
        let client_id = session.client_id.clone();
        state.route(Some(&client_id), topic, payload, at);
        Ok(())
    }

    fn maintain(&mut self) {
        if self.is_connected() {
            return;
        }
        let Some((sender, _)) = self.queue.clone() else {
            // Never subscribed; just bring the session back.
            let mut state = self.broker.lock();
            if !state.unreachable {
                if let Some(s) = state.sessions.get_mut(&self.key) {
                    s.connected = true;
                }
            }
            return;
        };
        let mut state = self.broker.lock();
        if state.unreachable {
            return;
        }
        let Some(session) = state.sessions.get_mut(&self.key) else {
            return;
        };
        session.connected = true;
        for filter in &self.filters {
            state.subscriptions.push(Subscription {
                client: self.key,
                filter: filter.clone(),
                sender: sender.clone(),
            });
        }
        drop(state);
        info!(
            "broker: {} reconnected, resubscribed to {} filter(s)",
            self.client_id(),
            self.filters.len()
        );
    }

    fn is_connected(&self) -> bool {
        self.broker
            .lock()
            .sessions
            .get(&self.key)
            .is_some_and(|s| s.connected)
    }
}
