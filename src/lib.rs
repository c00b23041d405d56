//! Peerlink signaling server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod ai;
pub mod config;
pub mod monitor;
pub mod registry;
pub mod routes;
pub mod signaling;
pub mod state;
pub mod ws;
