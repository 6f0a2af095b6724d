use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use rand::Rng;
use sysinfo::System;
use tokio::time::MissedTickBehavior;

use crate::advertising::AdvertisingController;
use crate::backend::BackendApi;
use crate::connection::LinkState;
use crate::identity::IdentityStore;
use crate::network::Network;
use crate::radio::Characteristic;

/// Simulated RSSI around -40 dBm.
fn signal_sample(rng: &mut impl Rng) -> i16 {
    -40 + rng.gen_range(-20..20)
}

/// Liveness over the wireless link: a signal sample on the signal
/// characteristic, pushed to the peer when one is attached.
pub struct LocalHeartbeat {
    controller: Arc<AdvertisingController>,
    link: Arc<LinkState>,
    system: System,
}

impl LocalHeartbeat {
    pub fn new(controller: Arc<AdvertisingController>, link: Arc<LinkState>) -> Self {
        LocalHeartbeat {
            controller,
            link,
            system: System::new(),
        }
    }

    pub async fn tick(&mut self) -> i16 {
        self.system.refresh_memory();
        let rssi = signal_sample(&mut rand::thread_rng());
        info!(
            "Heartbeat - available memory: {} bytes - connected: {}",
            self.system.available_memory(),
            if self.link.is_connected() { "yes" } else { "no" }
        );
        self.controller
            .publish(Characteristic::Signal, rssi.to_string().as_bytes())
            .await;
        rssi
    }

    pub async fn run(mut self, period: Duration) {
        info!("Local heartbeat every {:?}", period);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Delivered,
    Rejected(u16),
    Failed,
    Offline,
}

/// Liveness over the network: one GET per period, keyed by the current id.
pub struct RemoteHeartbeat {
    network: Arc<dyn Network>,
    backend: BackendApi,
    identity: IdentityStore,
}

impl RemoteHeartbeat {
    pub fn new(network: Arc<dyn Network>, backend: BackendApi, identity: IdentityStore) -> Self {
        RemoteHeartbeat {
            network,
            backend,
            identity,
        }
    }

    pub async fn tick(&self) -> HeartbeatOutcome {
        if !self.network.is_associated() {
            warn!("Network not associated, requesting association");
            self.network.request_association();
            return HeartbeatOutcome::Offline;
        }
        let id = self.identity.snapshot().id;
        let url = match self.backend.heartbeat_url(&id) {
            Ok(url) => url,
            Err(err) => {
                error!("Heartbeat url: {}", err);
                return HeartbeatOutcome::Failed;
            }
        };
        match self.network.get(&url).await {
            Ok(response) if response.status == 200 => {
                info!("Heartbeat delivered: {}", response.body);
                HeartbeatOutcome::Delivered
            }
            Ok(response) => {
                warn!("Heartbeat rejected with HTTP {}", response.status);
                HeartbeatOutcome::Rejected(response.status)
            }
            Err(err) => {
                warn!("Heartbeat failed: {}", err);
                HeartbeatOutcome::Failed
            }
        }
    }

    pub async fn run(self, period: Duration) {
        info!("Remote heartbeat every {:?}", period);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

/// Association upkeep for deployments that run the network activities
/// without the remote heartbeat, which otherwise owns this check.
pub async fn watch_association(network: Arc<dyn Network>, period: Duration) {
    info!("Association check every {:?}", period);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !network.is_associated() {
            warn!("Network not associated, requesting association");
            network.request_association();
        }
    }
}
