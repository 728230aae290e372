//! Session-scoped measurement recording.
//!
//! [`SessionMeasurementStore`] numbers and stores distance/angle measurements per
//! session on top of any [`RemoteStore`] backend: the SQLite [`Database`], the
//! Firebase REST client, or the in-process [`MemoryStore`].

pub mod cli;
pub mod config;
pub mod db;
pub mod models;
pub mod remote;
pub mod screen;
pub mod store;
pub mod utils;

pub use db::Database;
pub use models::{MalformedRecord, Measurement, MeasurementDraft, NonFiniteField};
pub use remote::{
    ChildRecord, FirebaseStore, KeyPath, MemoryStore, RemoteStore, StoreError, StoreResult,
};
pub use store::{SequenceScan, SessionHistory, SessionMeasurementStore, MEASUREMENTS_ROOT};
