use std::path::Path;
use std::time::Duration;

use mac_address::MacAddress;
use serde_derive::Deserialize;
use uuid::Uuid;

use crate::error::ConfigError;
use crate::identity::BeaconIdentity;

pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0x12345678_1234_1234_1234_123456789abc);
pub const DEFAULT_STATUS_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x87654321_4321_4321_4321_cba987654321);
pub const DEFAULT_SIGNAL_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x11111111_2222_3333_4444_555555555555);

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub beacon: BeaconConfig,
    pub backend: BackendConfig,
    pub network: Option<NetworkConfig>,
    pub gatt: Option<GattConfig>,
    pub schedule: Option<ScheduleConfig>,
    pub features: Option<FeatureFlags>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BeaconConfig {
    /// Falls back to an id derived from the hardware address when unset.
    pub id: Option<String>,
    pub display_name: String,
    pub status: Option<String>,
    pub message: Option<String>,
    pub version: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NetworkConfig {
    pub ssid: String,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GattConfig {
    pub service_uuid: Option<Uuid>,
    pub status_characteristic_uuid: Option<Uuid>,
    pub signal_characteristic_uuid: Option<Uuid>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ScheduleConfig {
    pub visibility_repair_ms: Option<u64>,
    pub status_publish_ms: Option<u64>,
    pub local_heartbeat_ms: Option<u64>,
    pub remote_heartbeat_ms: Option<u64>,
    pub config_sync_ms: Option<u64>,
    pub advertising_settle_ms: Option<u64>,
    pub association_poll_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct FeatureFlags {
    pub registration: Option<bool>,
    pub remote_heartbeat: Option<bool>,
    pub remote_sync: Option<bool>,
}

/// Periods every activity runs at, with defaults applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub visibility_repair: Duration,
    pub status_publish: Duration,
    pub local_heartbeat: Duration,
    pub remote_heartbeat: Duration,
    pub config_sync: Duration,
    pub advertising_settle: Duration,
    pub association_poll: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            visibility_repair: Duration::from_millis(100),
            status_publish: Duration::from_secs(1),
            local_heartbeat: Duration::from_secs(5),
            remote_heartbeat: Duration::from_secs(15),
            config_sync: Duration::from_secs(15),
            advertising_settle: Duration::from_millis(500),
            association_poll: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub registration: bool,
    pub remote_heartbeat: bool,
    pub remote_sync: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattLayout {
    pub service: Uuid,
    pub status_characteristic: Uuid,
    pub signal_characteristic: Uuid,
}

impl Default for GattLayout {
    fn default() -> Self {
        GattLayout {
            service: DEFAULT_SERVICE_UUID,
            status_characteristic: DEFAULT_STATUS_CHARACTERISTIC_UUID,
            signal_characteristic: DEFAULT_SIGNAL_CHARACTERISTIC_UUID,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::de::from_str(&contents)?)
    }

    pub fn schedule(&self) -> Schedule {
        let defaults = Schedule::default();
        let Some(s) = self.schedule.as_ref() else {
            return defaults;
        };
        let ms = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_millis).unwrap_or(fallback)
        };
        Schedule {
            visibility_repair: ms(s.visibility_repair_ms, defaults.visibility_repair),
            status_publish: ms(s.status_publish_ms, defaults.status_publish),
            local_heartbeat: ms(s.local_heartbeat_ms, defaults.local_heartbeat),
            remote_heartbeat: ms(s.remote_heartbeat_ms, defaults.remote_heartbeat),
            config_sync: ms(s.config_sync_ms, defaults.config_sync),
            advertising_settle: ms(s.advertising_settle_ms, defaults.advertising_settle),
            association_poll: ms(s.association_poll_ms, defaults.association_poll),
        }
    }

    pub fn features(&self) -> Features {
        let flags = self.features.clone().unwrap_or_default();
        Features {
            registration: flags.registration.unwrap_or(true),
            remote_heartbeat: flags.remote_heartbeat.unwrap_or(true),
            remote_sync: flags.remote_sync.unwrap_or(true),
        }
    }

    pub fn gatt(&self) -> GattLayout {
        let defaults = GattLayout::default();
        match self.gatt.as_ref() {
            Some(g) => GattLayout {
                service: g.service_uuid.unwrap_or(defaults.service),
                status_characteristic: g
                    .status_characteristic_uuid
                    .unwrap_or(defaults.status_characteristic),
                signal_characteristic: g
                    .signal_characteristic_uuid
                    .unwrap_or(defaults.signal_characteristic),
            },
            None => defaults,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_seconds.unwrap_or(10))
    }

    pub fn firmware_version(&self) -> String {
        self.beacon
            .version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }

    /// Builds the boot identity, asking the platform for its hardware
    /// address only when no id is configured.
    pub fn initial_identity(&self) -> Result<BeaconIdentity, ConfigError> {
        let id = match self.beacon.id.as_ref() {
            Some(id) => id.clone(),
            None => {
                let mac = mac_address::get_mac_address()
                    .ok()
                    .flatten()
                    .ok_or(ConfigError::NoIdentity)?;
                id_from_mac(mac)
            }
        };
        Ok(BeaconIdentity {
            id,
            display_name: self.beacon.display_name.clone(),
            status: self.beacon.status.clone().unwrap_or("ativo".to_string()),
            message: self.beacon.message.clone().unwrap_or_default(),
        })
    }
}

pub fn id_from_mac(mac: MacAddress) -> String {
    let hex = mac
        .bytes()
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<String>();
    format!("BEACON-{hex}")
}
