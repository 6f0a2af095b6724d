//! In-memory radio and network doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use reqwest::Url;

use crate::error::{NetworkError, RadioError};
use crate::network::{HttpResponse, Network};
use crate::radio::{AdvertisementPayload, Characteristic, Radio};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioOp {
    Start,
    Stop,
    SetPayload(String),
}

#[derive(Debug, Default)]
pub struct FakeRadioState {
    pub ops: Vec<RadioOp>,
    pub advertising: bool,
    /// Starts issued while the radio was already advertising.
    pub overlapping_starts: usize,
    pub fail_starts: usize,
    pub fail_payloads: usize,
    pub payload: Option<AdvertisementPayload>,
    pub values: HashMap<Characteristic, Vec<u8>>,
    pub notified: Vec<(Characteristic, Vec<u8>)>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeRadio {
    pub state: Arc<Mutex<FakeRadioState>>,
}

impl FakeRadio {
    pub fn starts(&self) -> usize {
        let state = self.state.lock();
        state.ops.iter().filter(|op| **op == RadioOp::Start).count()
    }

    pub fn ops(&self) -> Vec<RadioOp> {
        self.state.lock().ops.clone()
    }

    pub fn value(&self, characteristic: Characteristic) -> Option<String> {
        let state = self.state.lock();
        state
            .values
            .get(&characteristic)
            .map(|v| String::from_utf8_lossy(v).to_string())
    }
}

impl Radio for FakeRadio {
    fn start_advertising(&mut self) -> Result<(), RadioError> {
        let mut state = self.state.lock();
        if state.fail_starts > 0 {
            state.fail_starts -= 1;
            return Err(RadioError::StartFailed("controller busy".to_string()));
        }
        if state.advertising {
            state.overlapping_starts += 1;
        }
        state.advertising = true;
        state.ops.push(RadioOp::Start);
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), RadioError> {
        let mut state = self.state.lock();
        state.advertising = false;
        state.ops.push(RadioOp::Stop);
        Ok(())
    }

    fn set_advertisement_payload(
        &mut self,
        payload: &AdvertisementPayload,
    ) -> Result<(), RadioError> {
        let mut state = self.state.lock();
        if state.advertising {
            return Err(RadioError::PayloadRejected("advertising".to_string()));
        }
        if state.fail_payloads > 0 {
            state.fail_payloads -= 1;
            return Err(RadioError::PayloadRejected("controller busy".to_string()));
        }
        state.ops.push(RadioOp::SetPayload(payload.name.clone()));
        state.payload = Some(payload.clone());
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<(), RadioError> {
        self.state.lock().values.insert(characteristic, value.to_vec());
        Ok(())
    }

    fn notify(&mut self, characteristic: Characteristic, value: &[u8]) -> Result<(), RadioError> {
        self.state
            .lock()
            .notified
            .push((characteristic, value.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub method: &'static str,
    pub path: String,
    pub url: String,
    pub body: Option<String>,
}

/// Network double answering from a per-path script, then with 200 and an
/// empty body.
#[derive(Debug)]
pub struct FakeNetwork {
    pub associated: AtomicBool,
    pub association_requests: AtomicUsize,
    pub requests: Mutex<Vec<Recorded>>,
    script: Mutex<HashMap<String, VecDeque<Result<HttpResponse, NetworkError>>>>,
}

impl Default for FakeNetwork {
    fn default() -> Self {
        FakeNetwork {
            associated: AtomicBool::new(true),
            association_requests: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(HashMap::new()),
        }
    }
}

impl FakeNetwork {
    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.script
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(Ok(HttpResponse {
                status,
                body: body.to_string(),
            }));
    }

    pub fn fail(&self, path: &str, err: NetworkError) {
        self.script
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(Err(err));
    }

    pub fn set_associated(&self, associated: bool) {
        self.associated.store(associated, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<Recorded> {
        self.requests.lock().last().cloned()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    fn record(&self, method: &'static str, url: &Url, body: Option<String>) {
        self.requests.lock().push(Recorded {
            method,
            path: url.path().to_string(),
            url: url.to_string(),
            body,
        });
    }

    fn next(&self, url: &Url) -> Result<HttpResponse, NetworkError> {
        self.script
            .lock()
            .get_mut(url.path())
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Ok(HttpResponse {
                status: 200,
                body: String::new(),
            }))
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn get(&self, url: &Url) -> Result<HttpResponse, NetworkError> {
        self.record("GET", url, None);
        self.next(url)
    }

    async fn post(&self, url: &Url, body: String, _content_type: &str) -> Result<u16, NetworkError> {
        self.record("POST", url, Some(body));
        self.next(url).map(|response| response.status)
    }

    fn is_associated(&self) -> bool {
        self.associated.load(Ordering::SeqCst)
    }

    fn request_association(&self) {
        self.association_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lets every task that is ready to run make progress on the current-thread
/// test runtime.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

thread_local! {
    static CAPTURED: RefCell<Vec<(Level, String, String)>> = const { RefCell::new(Vec::new()) };
}

/// Keeps records per thread, so concurrently running tests on their own
/// current-thread runtimes never see each other's output.
struct CapturingLogger;

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED.with(|captured| {
            captured.borrow_mut().push((
                record.level(),
                record.target().to_string(),
                record.args().to_string(),
            ))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger;

/// Installs the capturing logger once and clears this thread's records.
pub fn capture_logs() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    CAPTURED.with(|captured| captured.borrow_mut().clear());
}

/// Messages this thread logged at `level` from the given module.
pub fn captured(level: Level, module: &str) -> Vec<String> {
    let target = format!("{}::{}", env!("CARGO_CRATE_NAME"), module);
    CAPTURED.with(|captured| {
        captured
            .borrow()
            .iter()
            .filter(|(l, t, _)| *l == level && *t == target)
            .map(|(_, _, message)| message.clone())
            .collect()
    })
}
