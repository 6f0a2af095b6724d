use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info};
use uuid::Uuid;

use crate::config::GattLayout;
use crate::connection::LinkEvents;
use crate::error::RadioError;

/// Largest attribute value the GATT layer accepts.
pub const MAX_VALUE_LEN: usize = 512;

/// The two data slots the beacon's GATT service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Read/write/notify JSON status record.
    Status,
    /// Read/notify signal strength sample.
    Signal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementPayload {
    pub name: String,
    pub service: Uuid,
    /// Manufacturer data carried next to the service UUID.
    pub data: Vec<u8>,
}

/// Advertising and GATT primitives of the wireless stack.
///
/// Calls return promptly; none of them wait on network I/O.
pub trait Radio: Send {
    fn start_advertising(&mut self) -> Result<(), RadioError>;
    fn stop_advertising(&mut self) -> Result<(), RadioError>;
    fn set_advertisement_payload(&mut self, payload: &AdvertisementPayload)
    -> Result<(), RadioError>;
    fn write_characteristic(
        &mut self,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<(), RadioError>;
    fn notify(&mut self, characteristic: Characteristic, value: &[u8]) -> Result<(), RadioError>;
}

/// Stand-in for hosts without a peripheral-capable controller: keeps the
/// characteristic values in memory and logs every operation.
pub struct SimulatedRadio {
    gatt: GattLayout,
    /// Shared with [`SimulatedPeer`], which halts advertising on connect
    /// the way a controller does.
    advertising: Arc<AtomicBool>,
    payload: Option<AdvertisementPayload>,
    status: Vec<u8>,
    signal: Vec<u8>,
}

impl SimulatedRadio {
    pub fn new(gatt: GattLayout) -> Self {
        SimulatedRadio {
            gatt,
            advertising: Arc::new(AtomicBool::new(false)),
            payload: None,
            status: Vec::new(),
            signal: Vec::new(),
        }
    }

    fn uuid(&self, characteristic: Characteristic) -> Uuid {
        match characteristic {
            Characteristic::Status => self.gatt.status_characteristic,
            Characteristic::Signal => self.gatt.signal_characteristic,
        }
    }

    fn slot(&mut self, characteristic: Characteristic) -> &mut Vec<u8> {
        match characteristic {
            Characteristic::Status => &mut self.status,
            Characteristic::Signal => &mut self.signal,
        }
    }
}

impl Radio for SimulatedRadio {
    fn start_advertising(&mut self) -> Result<(), RadioError> {
        if self.advertising.swap(true, Ordering::SeqCst) {
            return Err(RadioError::StartFailed("already advertising".to_string()));
        }
        let name = self.payload.as_ref().map(|p| p.name.as_str()).unwrap_or("");
        info!("[radio] advertising started as {:?}", name);
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), RadioError> {
        self.advertising.store(false, Ordering::SeqCst);
        info!("[radio] advertising stopped");
        Ok(())
    }

    fn set_advertisement_payload(
        &mut self,
        payload: &AdvertisementPayload,
    ) -> Result<(), RadioError> {
        if self.advertising.load(Ordering::SeqCst) {
            return Err(RadioError::PayloadRejected(
                "payload update while advertising".to_string(),
            ));
        }
        info!(
            "[radio] advertisement name={:?} service={} data={:?}",
            payload.name,
            payload.service,
            String::from_utf8_lossy(&payload.data)
        );
        self.payload = Some(payload.clone());
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<(), RadioError> {
        if value.len() > MAX_VALUE_LEN {
            return Err(RadioError::WriteFailed(
                characteristic,
                format!("{} bytes exceeds {}", value.len(), MAX_VALUE_LEN),
            ));
        }
        debug!(
            "[radio] {} <- {}",
            self.uuid(characteristic),
            String::from_utf8_lossy(value)
        );
        *self.slot(characteristic) = value.to_vec();
        Ok(())
    }

    fn notify(&mut self, characteristic: Characteristic, value: &[u8]) -> Result<(), RadioError> {
        if value.len() > MAX_VALUE_LEN {
            return Err(RadioError::NotifyFailed(
                characteristic,
                format!("{} bytes exceeds {}", value.len(), MAX_VALUE_LEN),
            ));
        }
        debug!(
            "[radio] notify {} ({} bytes)",
            self.uuid(characteristic),
            value.len()
        );
        Ok(())
    }
}

/// A phone walking past: attaches, reads and writes the status
/// characteristic, lingers, detaches.
pub struct SimulatedPeer {
    advertising: Arc<AtomicBool>,
}

impl SimulatedPeer {
    pub fn new(radio: &SimulatedRadio) -> Self {
        SimulatedPeer {
            advertising: radio.advertising.clone(),
        }
    }

    pub async fn run(self, events: LinkEvents, dwell: Duration) {
        info!("Simulating a peer visit every {:?}", dwell * 2);
        loop {
            tokio::time::sleep(dwell).await;
            self.advertising.store(false, Ordering::SeqCst);
            events.attached();
            events.characteristic_read(Characteristic::Status);
            events.characteristic_written(Characteristic::Status, b"hello beacon");
            tokio::time::sleep(dwell).await;
            events.detached();
        }
    }
}
