//! Pixeldrop - queue-backed image ingestion service
//!
//! This library crate exposes the core functionality for integration testing.

pub mod broker;
pub mod codec;
pub mod compressor;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod worker;
