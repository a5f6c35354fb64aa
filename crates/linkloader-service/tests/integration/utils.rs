use std::sync::{Arc, Mutex};
use std::time::Duration;

use linkloader_service::config::ElementsConfig;
use linkloader_service::{ElementLoader, FetchCallback, FetchTransport, ManualClock};

pub const IMAGE_ID: &str = "KSK@gpl.png";

/// A transport that records every started fetch and holds on to its callback.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    started: Mutex<Vec<String>>,
    pending: Mutex<Vec<FetchCallback>>,
}

impl RecordingTransport {
    /// How often a fetch was started for `id`.
    pub fn fetches(&self, id: &str) -> usize {
        self.started
            .lock()
            .unwrap()
            .iter()
            .filter(|started| *started == id)
            .count()
    }

    /// Takes the oldest pending callback for `id`.
    pub fn callback(&self, id: &str) -> FetchCallback {
        let mut pending = self.pending.lock().unwrap();
        let index = pending
            .iter()
            .position(|callback| callback.id() == id)
            .unwrap_or_else(|| panic!("no pending fetch for `{id}`"));
        pending.remove(index)
    }
}

impl FetchTransport for RecordingTransport {
    fn start_fetch(&self, id: &str, callback: FetchCallback) {
        self.started.lock().unwrap().push(id.to_owned());
        self.pending.lock().unwrap().push(callback);
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub transport: Arc<RecordingTransport>,
    pub loader: ElementLoader,
}

impl Harness {
    pub fn new() -> Self {
        linkloader_test::setup();

        let clock = Arc::new(ManualClock::new());
        let transport = Arc::new(RecordingTransport::default());
        let loader =
            ElementLoader::from_config(&ElementsConfig::default(), clock.clone(), transport.clone());

        Self {
            clock,
            transport,
            loader,
        }
    }

    pub fn advance_minutes(&self, minutes: u64) {
        self.clock.advance(Duration::from_secs(minutes * 60));
    }
}
