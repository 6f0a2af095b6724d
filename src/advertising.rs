use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::GattLayout;
use crate::connection::LinkState;
use crate::identity::{BeaconIdentity, IdentityStore};
use crate::messages::{BootStatus, StatusPayload};
use crate::radio::{AdvertisementPayload, Characteristic, Radio};

struct RadioSlot {
    radio: Box<dyn Radio>,
    /// Payload the transport last accepted.
    advertised: Option<AdvertisementPayload>,
}

/// Owns the radio handle and with it every advertising decision.
///
/// All radio calls go through one async mutex. The republish sequence keeps
/// it from stop until start, so the visibility repair can never issue a
/// start in the middle of a reconfiguration.
pub struct AdvertisingController {
    radio: Mutex<RadioSlot>,
    /// Set for the duration of a republish sequence.
    reconfiguring: AtomicBool,
    link: Arc<LinkState>,
    gatt: GattLayout,
    settle: Duration,
    boot: Instant,
}

impl AdvertisingController {
    pub fn new(
        radio: Box<dyn Radio>,
        link: Arc<LinkState>,
        gatt: GattLayout,
        settle: Duration,
    ) -> Self {
        AdvertisingController {
            radio: Mutex::new(RadioSlot {
                radio,
                advertised: None,
            }),
            reconfiguring: AtomicBool::new(false),
            link,
            gatt,
            settle,
            boot: Instant::now(),
        }
    }

    pub fn advertisement_for(&self, identity: &BeaconIdentity) -> AdvertisementPayload {
        AdvertisementPayload {
            name: identity.display_name.clone(),
            service: self.gatt.service,
            data: identity.id.as_bytes().to_vec(),
        }
    }

    /// Seeds both characteristics and starts the first advertisement.
    pub async fn bring_up(&self, identity: &BeaconIdentity, version: &str) {
        let boot_status = BootStatus {
            id: &identity.id,
            kind: "beacon",
            version,
        };
        let mut slot = self.radio.lock().await;
        match serde_json::to_vec(&boot_status) {
            Ok(value) => {
                if let Err(err) = slot.radio.write_characteristic(Characteristic::Status, &value) {
                    warn!("Could not seed status characteristic: {}", err);
                }
            }
            Err(err) => error!("Could not encode boot status: {}", err),
        }
        if let Err(err) = slot.radio.write_characteristic(Characteristic::Signal, b"-50") {
            warn!("Could not seed signal characteristic: {}", err);
        }

        let payload = self.advertisement_for(identity);
        match slot.radio.set_advertisement_payload(&payload) {
            Ok(()) => slot.advertised = Some(payload),
            Err(err) => warn!("Could not set advertisement payload: {}", err),
        }
        match slot.radio.start_advertising() {
            Ok(()) => {
                self.link.advertising_started();
                info!("Advertising as {:?}, waiting for a peer", identity.display_name);
            }
            Err(err) => warn!("Could not start advertising, will retry: {}", err),
        }
    }

    /// Starts advertising when no peer is attached and the device is not
    /// already discoverable. Returns true when it issued a start.
    pub async fn ensure_visible(&self) -> bool {
        if !self.link.needs_advertising() {
            return false;
        }
        let mut slot = self.radio.lock().await;
        // A republish may have finished, or a peer attached, while waiting.
        if !self.link.needs_advertising() {
            return false;
        }
        let after_disconnect = self.link.restart_pending();
        if let Err(err) = slot.radio.start_advertising() {
            warn!("Could not start advertising, retrying next tick: {}", err);
            return false;
        }
        if !self.link.advertising_started() {
            debug!("Peer attached while advertising was starting");
            return false;
        }
        if after_disconnect {
            info!("Advertising restarted after disconnect");
        } else {
            info!("Advertising restored");
        }
        true
    }

    pub async fn publish_identity(&self, identity: &BeaconIdentity) {
        let status = StatusPayload {
            id: &identity.id,
            timestamp: self.boot.elapsed().as_millis() as u64,
            status: "active",
        };
        match serde_json::to_vec(&status) {
            Ok(value) => self.publish(Characteristic::Status, &value).await,
            Err(err) => error!("Could not encode status payload: {}", err),
        }
    }

    /// Writes the characteristic and notifies an attached peer. Skips the
    /// tick rather than wait out a republish; any other holder is awaited.
    pub async fn publish(&self, characteristic: Characteristic, value: &[u8]) {
        if self.reconfiguring.load(Ordering::SeqCst) {
            debug!("Radio busy reconfiguring, skipping {:?} update", characteristic);
            return;
        }
        let mut slot = self.radio.lock().await;
        if let Err(err) = slot.radio.write_characteristic(characteristic, value) {
            warn!("{}", err);
            return;
        }
        if !self.link.is_connected() {
            return;
        }
        if let Err(err) = slot.radio.notify(characteristic, value) {
            warn!("{}", err);
        }
    }

    /// Stop, settle, swap the payload, start. Holds the radio for the whole
    /// sequence and leaves advertising off if a peer attached meanwhile.
    pub async fn republish_advertisement(&self, identity: &BeaconIdentity) {
        self.reconfiguring.store(true, Ordering::SeqCst);
        self.swap_payload(identity).await;
        self.reconfiguring.store(false, Ordering::SeqCst);
    }

    async fn swap_payload(&self, identity: &BeaconIdentity) {
        let payload = self.advertisement_for(identity);
        let mut slot = self.radio.lock().await;

        if let Err(err) = slot.radio.stop_advertising() {
            warn!("Could not stop advertising for republish, retrying next sync: {}", err);
            return;
        }
        self.link.advertising_stopped();
        tokio::time::sleep(self.settle).await;

        match slot.radio.set_advertisement_payload(&payload) {
            Ok(()) => {
                info!("Advertisement updated to {:?}", payload.name);
                slot.advertised = Some(payload);
            }
            Err(err) => warn!("Could not update advertisement payload: {}", err),
        }

        if self.link.is_connected() {
            info!("Peer attached during republish, leaving advertising off");
            return;
        }
        match slot.radio.start_advertising() {
            Ok(()) => {
                self.link.advertising_started();
            }
            Err(err) => warn!("Could not restart advertising after republish: {}", err),
        }
    }

    /// True when the transport does not carry this identity's payload yet.
    pub async fn advertisement_stale(&self, identity: &BeaconIdentity) -> bool {
        let wanted = self.advertisement_for(identity);
        self.radio.lock().await.advertised.as_ref() != Some(&wanted)
    }

    pub async fn run_visibility(self: Arc<Self>, period: Duration) {
        info!("Visibility repair every {:?}", period);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.link.restart_requested() => {}
            }
            self.ensure_visible().await;
        }
    }

    pub async fn run_status(self: Arc<Self>, identity: IdentityStore, period: Duration) {
        info!("Status publish every {:?}", period);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let snapshot = identity.snapshot();
            self.publish_identity(&snapshot).await;
        }
    }
}
