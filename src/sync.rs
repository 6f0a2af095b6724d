use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::time::MissedTickBehavior;

use crate::advertising::AdvertisingController;
use crate::backend::BackendApi;
use crate::identity::{BeaconIdentity, IdentityStore};
use crate::messages::RemoteConfigResponse;
use crate::network::Network;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Backend agrees with the current identity.
    Unchanged,
    /// A new identity was committed and advertised.
    Applied(BeaconIdentity),
    Rejected(u16),
    TransportFailed,
    DecodeFailed,
    Offline,
}

/// Checks the payload against the fixed schema; fields that would make an
/// unusable identity are rejected along with malformed JSON.
fn decode(body: &str) -> Result<BeaconIdentity, String> {
    let response: RemoteConfigResponse =
        serde_json::from_str(body).map_err(|err| err.to_string())?;
    if response.beacon_id.trim().is_empty() {
        return Err("empty beacon_id".to_string());
    }
    if response.device_name.trim().is_empty() {
        return Err("empty device_name".to_string());
    }
    Ok(BeaconIdentity {
        id: response.beacon_id,
        display_name: response.device_name,
        status: response.status,
        message: response.message,
    })
}

/// Pulls the authoritative identity from the backend. The only writer of
/// the identity after boot.
pub struct RemoteConfigSync {
    network: Arc<dyn Network>,
    backend: BackendApi,
    identity: IdentityStore,
    controller: Arc<AdvertisingController>,
}

impl RemoteConfigSync {
    pub fn new(
        network: Arc<dyn Network>,
        backend: BackendApi,
        identity: IdentityStore,
        controller: Arc<AdvertisingController>,
    ) -> Self {
        RemoteConfigSync {
            network,
            backend,
            identity,
            controller,
        }
    }

    pub async fn tick(&self) -> SyncOutcome {
        if !self.network.is_associated() {
            warn!("Network not associated, skipping config sync");
            return SyncOutcome::Offline;
        }
        let current = self.identity.snapshot();
        let url = match self.backend.config_url(&current.id) {
            Ok(url) => url,
            Err(err) => {
                error!("Config url: {}", err);
                return SyncOutcome::TransportFailed;
            }
        };
        let response = match self.network.get(&url).await {
            Ok(response) if response.status == 200 => response,
            Ok(response) => {
                warn!("Config fetch rejected with HTTP {}", response.status);
                return SyncOutcome::Rejected(response.status);
            }
            Err(err) => {
                warn!("Config fetch failed: {}", err);
                return SyncOutcome::TransportFailed;
            }
        };
        let next = match decode(&response.body) {
            Ok(next) => next,
            Err(err) => {
                warn!("Discarding config payload: {}", err);
                return SyncOutcome::DecodeFailed;
            }
        };

        let committed = self.identity.commit(next.clone());
        if committed {
            info!(
                "Identity changed: {:?} ({:?}) -> {:?} ({:?})",
                current.id, current.display_name, next.id, next.display_name
            );
        }
        // Commit first; the advertisement always follows the committed record.
        if committed || self.controller.advertisement_stale(&next).await {
            self.controller.republish_advertisement(&next).await;
            return SyncOutcome::Applied(next);
        }
        SyncOutcome::Unchanged
    }

    pub async fn run(self, period: Duration) {
        info!("Config sync every {:?}", period);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}
