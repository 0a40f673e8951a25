//! Embedded SQLite store for transaction records.
//!
//! Used when the simulator runs without the remote persistence service;
//! it keeps the same contract as `POST/GET/DELETE /transactions`.

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
