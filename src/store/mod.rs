//! Session-scoped, auto-numbered measurement store.
//!
//! Measurements live at `measurements/<session>/<push key>`. Appending scans the
//! session for the highest existing number and writes `max + 1`. The scan runs
//! outside the write lock, so concurrent appends to one session can be assigned
//! the same number; the lock is per store instance and covers the push only.

use tokio::sync::Mutex;

use crate::{
    log_debug, log_info, log_warn,
    models::{sequence_number_of, MalformedRecord, Measurement, MeasurementDraft},
    remote::{ChildRecord, KeyPath, RemoteStore, StoreError, StoreResult},
};

const ENABLE_LOGS: bool = true;

/// Root label every session collection lives under.
pub const MEASUREMENTS_ROOT: &str = "measurements";

/// What the numbering read saw before an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceScan {
    /// The session has no numbered entries yet.
    Empty,
    /// Highest `measurementNumber` currently stored.
    Highest(u64),
    /// The read failed; numbering falls back to 1.
    ReadFailed(String),
}

impl SequenceScan {
    pub fn from_children(children: &[ChildRecord]) -> Self {
        children
            .iter()
            .filter_map(|child| sequence_number_of(&child.value))
            .max()
            .map_or(SequenceScan::Empty, SequenceScan::Highest)
    }

    pub fn next_number(&self) -> u64 {
        match self {
            SequenceScan::Empty | SequenceScan::ReadFailed(_) => 1,
            SequenceScan::Highest(max) => max.saturating_add(1),
        }
    }
}

/// Result of a session read that keeps track of what was dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionHistory {
    pub measurements: Vec<Measurement>,
    pub malformed: Vec<MalformedRecord>,
}

impl SessionHistory {
    pub fn from_children(children: Vec<ChildRecord>) -> Self {
        let mut history = SessionHistory::default();
        for child in children {
            match Measurement::from_record(&child.key, &child.value) {
                Ok(measurement) => history.measurements.push(measurement),
                Err(malformed) => history.malformed.push(malformed),
            }
        }
        history
    }
}

pub struct SessionMeasurementStore<S> {
    remote: S,
    root: KeyPath,
    write_lock: Mutex<()>,
}

impl<S: RemoteStore> SessionMeasurementStore<S> {
    pub fn new(remote: S) -> Self {
        Self {
            remote,
            root: KeyPath::trusted_root(MEASUREMENTS_ROOT),
            write_lock: Mutex::new(()),
        }
    }

    pub fn remote(&self) -> &S {
        &self.remote
    }

    pub fn session_path(&self, session: &str) -> StoreResult<KeyPath> {
        self.root.child(session)
    }

    /// Read the session and report the highest stored number. Read failures are
    /// reported as [`SequenceScan::ReadFailed`], never as an error.
    pub async fn scan_sequence(&self, session: &str) -> StoreResult<SequenceScan> {
        let path = self.session_path(session)?;
        Ok(self.scan_path(&path).await)
    }

    async fn scan_path(&self, path: &KeyPath) -> SequenceScan {
        match self.remote.read_children(path).await {
            Ok(children) => SequenceScan::from_children(&children),
            Err(err) => {
                log_warn!("Numbering read for {path} failed, starting from 1: {err:#}");
                SequenceScan::ReadFailed(format!("{err:#}"))
            }
        }
    }

    /// Append `draft` to `session` under the next sequence number and return
    /// the measurement as written.
    pub async fn append_measurement(
        &self,
        session: &str,
        draft: MeasurementDraft,
    ) -> StoreResult<Measurement> {
        let path = self.session_path(session)?;
        draft
            .ensure_finite()
            .map_err(|err| StoreError::write(&path, err.into()))?;

        let scan = self.scan_path(&path).await;
        let measurement = draft.into_measurement(session, scan.next_number());
        let record = measurement
            .to_record()
            .map_err(|err| StoreError::write(&path, err))?;

        let key = {
            let _guard = self.write_lock.lock().await;
            self.remote
                .push_child(&path, record)
                .await
                .map_err(|err| StoreError::write(&path, err))?
        };

        log_info!(
            "Stored measurement #{} in {path} as {key}",
            measurement.measurement_number
        );

        Ok(measurement)
    }

    /// Every readable measurement in `session`, in the backend's order.
    /// Malformed entries are dropped; an unreadable session is an error.
    pub async fn fetch_measurements(&self, session: &str) -> StoreResult<Vec<Measurement>> {
        Ok(self.fetch_history(session).await?.measurements)
    }

    pub async fn fetch_history(&self, session: &str) -> StoreResult<SessionHistory> {
        let path = self.session_path(session)?;
        let children = self
            .remote
            .read_children(&path)
            .await
            .map_err(|err| StoreError::read(&path, err))?;

        log_debug!("Fetched {} children from {path}", children.len());
        Ok(SessionHistory::from_children(children))
    }
}
