//! A Redis-compatible in-memory data store.
//!
//! This crate implements a minimal Redis-compatible server:
//!
//! - RESP protocol framing, including the length-only-framed RDB snapshot
//!   blob that rides the replication link
//! - String key-value operations (GET, SET with PX expiry, KEYS, TYPE)
//! - Stream operations (XADD, XRANGE, XREAD with BLOCK)
//! - Master-replica replication: handshake, snapshot delivery, write
//!   fan-out, offset accounting, and the WAIT barrier
//! - RDB snapshot loading at startup
//!
//! Connections are handled concurrently with async/await on Tokio; each
//! store sits behind its own lock.

pub mod commands;
pub mod connection;
pub mod entry_id;
pub mod key_value_store;
pub mod rdb;
pub mod replication;
pub mod resp;
pub mod server;
pub mod stream_store;
