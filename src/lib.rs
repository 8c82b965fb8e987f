//! sck-collector — Smart Citizen Kit data collector.
//!
//! Polls the Smart Citizen API on a fixed interval, normalizes raw sensor
//! readings against a static allow-list, deduplicates by the device's own
//! reading timestamp, and writes the result to InfluxDB as line protocol.
//! A small axum server exposes `/health` for the supervising process.
//!
//! The poll loop is the only writer of the shared [`state::PollStatus`]
//! snapshot; the health responder only reads it. Shutdown is cooperative:
//! SIGINT/SIGTERM flip a single token and every wait observes it.

pub mod api;
pub mod catalog;
pub mod config;
pub mod health;
pub mod influx;
pub mod lineproto;
pub mod normalize;
pub mod poll;
pub mod shutdown;
pub mod state;
