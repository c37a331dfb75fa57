// Typeset shared type definitions
// Each submodule defines types used across the contexts.

pub mod config;
pub mod errors;
pub mod message;
pub mod settings;
pub mod storage;
pub mod tab;
