//! Optional push-dispatch channel.
//!
//! An at-least-once delivery queue carrying `{task_id, target}` hints so an
//! idle supervisor can poll sooner. Purely a latency optimization: the
//! supervisor still performs the atomic claim before acting, so duplicate or
//! out-of-order deliveries can never cause double execution, and the task's
//! status row stays the single source of truth. This in-process queue stands
//! in for an external pub/sub subscription with the same ack/nack contract.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::warn;

use crate::errors::HiveError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchHint {
    pub task_id: String,
    pub target: String,
}

struct Envelope {
    body: Vec<u8>,
    deliveries: u32,
}

struct Inner {
    queue: Mutex<VecDeque<Envelope>>,
    notify: Notify,
    max_deliveries: u32,
}

/// Cloneable handle to the dispatch queue; clones share the backlog.
#[derive(Clone)]
pub struct DispatchQueue {
    inner: Arc<Inner>,
}

impl DispatchQueue {
    pub fn new(max_deliveries: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                max_deliveries,
            }),
        }
    }

    pub fn publish(&self, hint: &DispatchHint) -> Result<(), HiveError> {
        let body = serde_json::to_vec(hint)?;
        self.publish_raw(body);
        Ok(())
    }

    /// Enqueue an arbitrary payload, as an external publisher would.
    pub fn publish_raw(&self, body: Vec<u8>) {
        self.inner
            .queue
            .lock()
            .unwrap()
            .push_back(Envelope { body, deliveries: 0 });
        self.inner.notify.notify_one();
    }

    fn pop(&self) -> Option<Delivery> {
        let mut q = self.inner.queue.lock().unwrap();
        q.pop_front().map(|mut env| {
            env.deliveries += 1;
            Delivery {
                body: env.body,
                deliveries: env.deliveries,
                queue: self.clone(),
            }
        })
    }

    pub fn try_recv(&self) -> Option<Delivery> {
        self.pop()
    }

    /// Wait for the next delivery.
    pub async fn recv(&self) -> Delivery {
        loop {
            if let Some(d) = self.pop() {
                return d;
            }
            self.inner.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One in-flight delivery. Must be explicitly acked or nacked; a nack
/// requeues the payload for redelivery until the delivery cap is hit.
pub struct Delivery {
    body: Vec<u8>,
    deliveries: u32,
    queue: DispatchQueue,
}

impl Delivery {
    pub fn hint(&self) -> Result<DispatchHint, HiveError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HiveError::Dispatch(format!("Malformed dispatch payload: {}", e)))
    }

    pub fn ack(self) {}

    pub fn nack(self) {
        if self.deliveries >= self.queue.inner.max_deliveries {
            warn!(
                deliveries = self.deliveries,
                "Dropping dispatch payload after repeated redelivery"
            );
            return;
        }
        let deliveries = self.deliveries;
        self.queue.inner.queue.lock().unwrap().push_back(Envelope {
            body: self.body,
            deliveries,
        });
        self.queue.inner.notify.notify_one();
    }
}
