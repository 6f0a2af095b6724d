use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::radio::Characteristic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

#[derive(Debug)]
struct Link {
    connection: ConnectionState,
    advertising_active: bool,
    restart_pending: bool,
}

/// Connection and visibility flags, guarded together so that a reader
/// never pairs a connection state with a stale visibility flag.
///
/// Critical sections are short and never span an await point, which lets
/// transport callbacks write here from any thread without waiting on an
/// in-flight advertising sequence.
#[derive(Debug)]
pub struct LinkState {
    link: Mutex<Link>,
    restart: Notify,
}

impl Default for LinkState {
    fn default() -> Self {
        LinkState {
            link: Mutex::new(Link {
                connection: ConnectionState::Disconnected,
                advertising_active: false,
                restart_pending: false,
            }),
            restart: Notify::new(),
        }
    }
}

impl LinkState {
    /// Returns true on the Disconnected -> Connected edge.
    pub fn on_attach(&self) -> bool {
        let mut link = self.link.lock();
        if link.connection == ConnectionState::Connected {
            return false;
        }
        link.connection = ConnectionState::Connected;
        // The transport stops advertising while a peer holds the link.
        link.advertising_active = false;
        link.restart_pending = false;
        true
    }

    /// Returns true on the Connected -> Disconnected edge, which queues
    /// exactly one advertising restart.
    pub fn on_detach(&self) -> bool {
        {
            let mut link = self.link.lock();
            if link.connection == ConnectionState::Disconnected {
                return false;
            }
            link.connection = ConnectionState::Disconnected;
            link.advertising_active = false;
            link.restart_pending = true;
        }
        self.restart.notify_one();
        true
    }

    pub fn connection(&self) -> ConnectionState {
        self.link.lock().connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection() == ConnectionState::Connected
    }

    pub fn advertising_active(&self) -> bool {
        self.link.lock().advertising_active
    }

    pub fn restart_pending(&self) -> bool {
        self.link.lock().restart_pending
    }

    pub(crate) fn needs_advertising(&self) -> bool {
        let link = self.link.lock();
        link.connection == ConnectionState::Disconnected && !link.advertising_active
    }

    /// Records a successful start unless a peer attached in the meantime.
    pub(crate) fn advertising_started(&self) -> bool {
        let mut link = self.link.lock();
        if link.connection == ConnectionState::Connected {
            return false;
        }
        link.advertising_active = true;
        link.restart_pending = false;
        true
    }

    pub(crate) fn advertising_stopped(&self) {
        self.link.lock().advertising_active = false;
    }

    /// Resolves once a detach has queued a restart.
    pub(crate) async fn restart_requested(&self) {
        self.restart.notified().await
    }
}

/// Handle the radio transport drives from its callback context.
#[derive(Debug, Clone)]
pub struct LinkEvents {
    link: Arc<LinkState>,
}

impl LinkEvents {
    pub fn new(link: Arc<LinkState>) -> Self {
        LinkEvents { link }
    }

    pub fn attached(&self) {
        if self.link.on_attach() {
            info!("Peer connected");
        } else {
            debug!("Duplicate attach ignored");
        }
    }

    pub fn detached(&self) {
        if self.link.on_detach() {
            info!("Peer disconnected, advertising restart queued");
        } else {
            debug!("Duplicate detach ignored");
        }
    }

    pub fn characteristic_written(&self, characteristic: Characteristic, value: &[u8]) {
        if value.is_empty() {
            return;
        }
        info!(
            "Peer wrote {:?} characteristic: {}",
            characteristic,
            String::from_utf8_lossy(value)
        );
    }

    pub fn characteristic_read(&self, characteristic: Characteristic) {
        debug!("Peer read {:?} characteristic", characteristic);
    }
}
