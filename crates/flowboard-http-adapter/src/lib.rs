//! HTTP adapter for the flowboard engine
//!
//! [`HttpBackend`] implements `flowboard_engine::WorkflowBackend` against
//! the backend's JSON API. [`BackendConfig`] resolves where that API lives.

pub mod client;
pub mod config;
pub mod constants;
pub mod error;

pub use client::HttpBackend;
pub use config::BackendConfig;
pub use error::{HttpAdapterError, Result};
