//! Common utilities and shared functionality
//!
//! Configuration loading, collaborator interfaces and the types shared by
//! the engine and the command layer.

pub mod types;
pub mod config;
pub mod traits;
