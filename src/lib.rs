//! Clawdash - Monitoring dashboard backend for a personal OpenClaw agent
//!
//! This library crate exposes internal modules for integration testing.

pub mod calendar;
pub mod collector;
pub mod config;
pub mod data;
pub mod gateway;
pub mod server;
pub mod store;
pub mod workspace;
