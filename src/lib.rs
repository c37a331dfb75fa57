//! Typeset: per-site typography and text-direction overrides.
//!
//! This library crate exposes all modules for use by the RPC host binary and
//! integration tests.

pub mod app;
pub mod database;
pub mod logging;
pub mod managers;
pub mod page;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
