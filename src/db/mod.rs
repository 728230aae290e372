//! Local SQLite backend for the remote store interface.

pub mod connection;
mod helpers;
pub mod migrations;
pub mod repositories;

pub use connection::Database;
