//! Consent change events and their fan-out.
//!
//! Each subscriber gets its own bounded queue and drains it on whatever
//! thread it likes. Publishing never blocks: a full queue drops the event
//! for that subscriber, a dropped receiver unsubscribes.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use parking_lot::Mutex;

use crate::consent::status::ConsentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentChangeEvent {
    pub old_status: ConsentStatus,
    pub new_status: ConsentStatus,
    pub can_collect_personal_information: bool,
}

pub struct EventPublisher {
    capacity: usize,
    subscribers: Mutex<Vec<SyncSender<ConsentChangeEvent>>>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Receiver<ConsentChangeEvent> {
        let (tx, rx) = mpsc::sync_channel(self.capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn publish(&self, events: &[ConsentChangeEvent]) {
        if events.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.lock();
        for event in events {
            subscribers.retain(|tx| match tx.try_send(*event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    log::warn!(
                        "CONSENT_EVENT_DROPPED reason=queue_full old={} new={}",
                        event.old_status,
                        event.new_status
                    );
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
        }
    }
}
