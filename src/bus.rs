//! Subject-addressed message bus.
//!
//! [`InProcessBus`] delivers opaque payloads to subscribers of a subject.
//! Subscribers that join a queue group share the subject's traffic
//! round-robin; plain subscribers each get their own copy. Delivery is
//! at-least-once from the handler's point of view: nothing here deduplicates.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::error::{BusError, ErrorReply};

pub type Reply = Result<Bytes, ErrorReply>;

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Fire-and-forget. Succeeds even when nobody listens.
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError>;

    /// Send one message and wait for exactly one reply.
    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BusError>;
}

/// A delivered message. Answer it with [`Message::respond`] or [`Message::error`].
#[derive(Debug)]
pub struct Message {
    pub subject: String,
    pub payload: Bytes,
    reply_to: Option<oneshot::Sender<Reply>>,
}

impl Message {
    pub fn data(&self) -> &[u8] {
        &self.payload
    }

    /// Returns `false` if there was nobody to answer (publish, or requester gone).
    pub fn respond(&mut self, payload: impl Into<Bytes>) -> bool {
        self.send_reply(Ok(payload.into()))
    }

    pub fn error(&mut self, code: u16, description: impl Into<String>) -> bool {
        self.send_reply(Err(ErrorReply {
            code,
            description: description.into(),
        }))
    }

    fn send_reply(&mut self, reply: Reply) -> bool {
        match self.reply_to.take() {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }
}

/// Receiving side of one subscription.
pub struct Subscription {
    rx: mpsc::Receiver<Message>,
}

impl Subscription {
    /// `None` once the bus is dropped.
    pub async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

struct Group {
    queue: Option<String>,
    members: RwLock<Vec<mpsc::Sender<Message>>>,
    next: AtomicUsize,
}

impl Group {
    /// Live members in delivery order for this message. Queue groups rotate
    /// the starting member; plain groups hold exactly one subscriber.
    fn targets(&self) -> Vec<mpsc::Sender<Message>> {
        let members = self.members.read().unwrap_or_else(|p| p.into_inner());
        let live: Vec<_> = members.iter().filter(|m| !m.is_closed()).cloned().collect();
        if live.is_empty() {
            return live;
        }
        let start = self.next.fetch_add(1, Ordering::Relaxed) % live.len();
        live[start..].iter().chain(live[..start].iter()).cloned().collect()
    }
}

#[derive(Clone)]
pub struct InProcessBus {
    subjects: Arc<RwLock<HashMap<String, Vec<Arc<Group>>>>>,
    capacity: usize,
}

impl InProcessBus {
    /// `capacity` bounds each subscriber's backlog; publishers wait when it is full.
    pub fn new(capacity: usize) -> Self {
        Self {
            subjects: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, subject: &str, queue_group: Option<&str>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subjects = self.subjects.write().unwrap_or_else(|p| p.into_inner());
        let groups = subjects.entry(subject.to_string()).or_default();

        let existing = queue_group.and_then(|q| {
            groups
                .iter()
                .find(|g| g.queue.as_deref() == Some(q))
                .cloned()
        });
        match existing {
            Some(g) => g
                .members
                .write()
                .unwrap_or_else(|p| p.into_inner())
                .push(tx),
            None => groups.push(Arc::new(Group {
                queue: queue_group.map(str::to_string),
                members: RwLock::new(vec![tx]),
                next: AtomicUsize::new(0),
            })),
        }
        Subscription { rx }
    }

    fn groups_for(&self, subject: &str) -> Vec<Arc<Group>> {
        let subjects = self.subjects.read().unwrap_or_else(|p| p.into_inner());
        subjects.get(subject).cloned().unwrap_or_default()
    }

    /// Deliver one copy per group. The reply slot, if any, rides with the
    /// first group that has a member able to take it. Returns whether that
    /// reply-carrying copy was delivered.
    async fn deliver(
        &self,
        subject: &str,
        payload: Bytes,
        mut reply_to: Option<oneshot::Sender<Reply>>,
    ) -> bool {
        let mut replied_delivery = false;
        for group in self.groups_for(subject) {
            let mut pending = Some(Message {
                subject: subject.to_string(),
                payload: payload.clone(),
                reply_to: reply_to.take(),
            });
            let carries_reply = pending.as_ref().is_some_and(|m| m.reply_to.is_some());
            for member in group.targets() {
                let Some(msg) = pending.take() else { break };
                match member.send(msg).await {
                    Ok(()) => {
                        replied_delivery |= carries_reply;
                        break;
                    }
                    // Member closed between the liveness check and the send; try the next one.
                    Err(mpsc::error::SendError(back)) => pending = Some(back),
                }
            }
            // Nobody in this group took it: hand the reply slot to the next group.
            if let Some(mut undelivered) = pending {
                reply_to = undelivered.reply_to.take();
            }
        }
        replied_delivery
    }
}

#[async_trait]
impl MessageBus for InProcessBus {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.deliver(subject, payload, None).await;
        Ok(())
    }

    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BusError> {
        let (tx, rx) = oneshot::channel();
        if !self.deliver(subject, payload, Some(tx)).await {
            return Err(BusError::NoResponders {
                subject: subject.to_string(),
            });
        }
        match tokio::time::timeout(timeout, rx).await {
            Err(_) => Err(BusError::Timeout {
                subject: subject.to_string(),
            }),
            Ok(Err(_)) => Err(BusError::Closed {
                subject: subject.to_string(),
            }),
            Ok(Ok(Ok(body))) => Ok(body),
            Ok(Ok(Err(e))) => Err(BusError::Service {
                code: e.code,
                description: e.description,
            }),
        }
    }
}
