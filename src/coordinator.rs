use std::future::Future;
use std::sync::Arc;

use log::{error, info};
use tokio::task::JoinSet;

use crate::advertising::AdvertisingController;
use crate::backend::BackendApi;
use crate::config::{AppConfig, Features, GattLayout, Schedule};
use crate::connection::{LinkEvents, LinkState};
use crate::error::ConfigError;
use crate::identity::{BeaconIdentity, IdentityStore};
use crate::network::Network;
use crate::radio::Radio;
use crate::registration::Registration;
use crate::sync::RemoteConfigSync;
use crate::telemetry::{LocalHeartbeat, RemoteHeartbeat, watch_association};

/// Everything that differs between deployments of the same beacon.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub identity: BeaconIdentity,
    pub backend: BackendApi,
    pub gatt: GattLayout,
    pub schedule: Schedule,
    pub features: Features,
    pub version: String,
}

impl CoordinatorConfig {
    pub fn from_app(config: &AppConfig, identity: BeaconIdentity) -> Result<Self, ConfigError> {
        Ok(CoordinatorConfig {
            identity,
            backend: BackendApi::new(&config.backend.base_url)?,
            gatt: config.gatt(),
            schedule: config.schedule(),
            features: config.features(),
            version: config.firmware_version(),
        })
    }
}

/// Composition root. Owns the identity, link and visibility records and
/// hands each activity only the handles it needs for one step at a time.
pub struct Coordinator {
    identity: IdentityStore,
    link: Arc<LinkState>,
    controller: Arc<AdvertisingController>,
    network: Arc<dyn Network>,
    backend: BackendApi,
    schedule: Schedule,
    features: Features,
    version: String,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, radio: Box<dyn Radio>, network: Arc<dyn Network>) -> Self {
        let link = Arc::new(LinkState::default());
        let controller = Arc::new(AdvertisingController::new(
            radio,
            link.clone(),
            config.gatt,
            config.schedule.advertising_settle,
        ));
        Coordinator {
            identity: IdentityStore::new(config.identity),
            link,
            controller,
            network,
            backend: config.backend,
            schedule: config.schedule,
            features: config.features,
            version: config.version,
        }
    }

    /// Callback handle for the radio transport's connection events.
    pub fn link_events(&self) -> LinkEvents {
        LinkEvents::new(self.link.clone())
    }

    /// Brings the radio up and spawns every activity.
    pub async fn start(&self) -> JoinSet<()> {
        let boot = self.identity.snapshot();
        self.controller.bring_up(&boot, &self.version).await;

        let schedule = self.schedule;
        let mut tasks = JoinSet::new();
        tasks.spawn(
            self.controller
                .clone()
                .run_visibility(schedule.visibility_repair),
        );
        tasks.spawn(
            self.controller
                .clone()
                .run_status(self.identity.clone(), schedule.status_publish),
        );
        tasks.spawn(
            LocalHeartbeat::new(self.controller.clone(), self.link.clone())
                .run(schedule.local_heartbeat),
        );

        if self.features.remote_heartbeat {
            tasks.spawn(
                RemoteHeartbeat::new(
                    self.network.clone(),
                    self.backend.clone(),
                    self.identity.clone(),
                )
                .run(schedule.remote_heartbeat),
            );
        } else if self.features.remote_sync || self.features.registration {
            tasks.spawn(watch_association(
                self.network.clone(),
                schedule.remote_heartbeat,
            ));
        }
        if self.features.remote_sync {
            tasks.spawn(
                RemoteConfigSync::new(
                    self.network.clone(),
                    self.backend.clone(),
                    self.identity.clone(),
                    self.controller.clone(),
                )
                .run(schedule.config_sync),
            );
        }
        if self.features.registration {
            let registration = Registration::new(
                self.network.clone(),
                self.backend.clone(),
                boot,
                self.version.clone(),
            );
            tasks.spawn(async move {
                registration.run(schedule.association_poll).await;
            });
        }
        info!("All beacon activities started");
        tasks
    }

    /// Runs until `shutdown` resolves, then stops every activity.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let mut tasks = self.start().await;
        tokio::select! {
            _ = shutdown => info!("Shutting down"),
            _ = supervise(&mut tasks) => {}
        }
        tasks.shutdown().await;
    }
}

async fn supervise(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            error!("Beacon activity stopped: {}", err);
        }
    }
}
