//! In-process transport hub.
//!
//! Every joined party gets an inbox of [`InboundSession`]s. Opening a
//! session creates a fresh channel pair and delivers one end to the
//! counterparty's inbox.

use async_trait::async_trait;
use seal_types::{Party, PublicKey};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::{Channel, InboundSession, Transport, TransportError};

/// Inbound sessions queued per node before `open` waits.
const INBOX_CAPACITY: usize = 256;

/// Failure injection shared by the hub and every channel it creates.
#[derive(Debug, Default)]
pub struct Faults {
    unreachable: Mutex<HashSet<PublicKey>>,
    dropped_sends: Mutex<HashMap<PublicKey, usize>>,
}

impl Faults {
    fn is_unreachable(&self, key: &PublicKey) -> bool {
        self.unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Consume one pending drop for messages sent by `sender`.
    pub(crate) fn take_dropped_send(&self, sender: &PublicKey) -> bool {
        let mut pending = self.dropped_sends.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.get_mut(sender) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

#[derive(Default)]
pub struct MemoryNetwork {
    inboxes: Mutex<HashMap<PublicKey, mpsc::Sender<InboundSession>>>,
    faults: Arc<Faults>,
    sessions_opened: AtomicUsize,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach `party`, returning its transport and its inbound session queue.
    pub fn join(self: &Arc<Self>, party: Party) -> (MemoryTransport, mpsc::Receiver<InboundSession>) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        self.inboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(party.owning_key, tx);
        tracing::debug!(%party, "joined in-memory network");
        let transport = MemoryTransport {
            network: Arc::clone(self),
            local: party,
        };
        (transport, rx)
    }

    /// Refuse (or allow again) every session opened to `key`.
    pub fn set_unreachable(&self, key: &PublicKey, unreachable: bool) {
        let mut set = self
            .faults
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if unreachable {
            set.insert(*key);
        } else {
            set.remove(key);
        }
    }

    /// Silently lose the next `count` messages sent by `key` on any session.
    pub fn drop_next_sends_from(&self, key: &PublicKey, count: usize) {
        self.faults
            .dropped_sends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(*key, count);
    }

    /// Total sessions opened, successful or not.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    fn inbox_of(&self, key: &PublicKey) -> Option<mpsc::Sender<InboundSession>> {
        self.inboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

/// A party's handle on a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
    local: Party,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_party(&self) -> &Party {
        &self.local
    }

    async fn open(&self, counterparty: &Party, protocol: &str) -> Result<Channel, TransportError> {
        self.network.sessions_opened.fetch_add(1, Ordering::SeqCst);
        let unreachable = || TransportError::Unreachable(counterparty.to_string());

        if self.network.faults.is_unreachable(&counterparty.owning_key) {
            return Err(unreachable());
        }
        let inbox = self
            .network
            .inbox_of(&counterparty.owning_key)
            .ok_or_else(unreachable)?;

        let (local_end, remote_end) = Channel::pair_with_faults(
            self.local.clone(),
            counterparty.clone(),
            Some(Arc::clone(&self.network.faults)),
        );
        inbox
            .send(InboundSession {
                protocol: protocol.to_string(),
                initiator: self.local.clone(),
                channel: remote_end,
            })
            .await
            .map_err(|_| unreachable())?;

        tracing::trace!(from = %self.local, to = %counterparty, protocol, "session opened");
        Ok(local_end)
    }
}
