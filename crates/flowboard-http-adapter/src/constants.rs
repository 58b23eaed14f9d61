//! Adapter-wide constants
//!
//! Single source of truth for the backend endpoints and connection defaults.

/// Connection defaults
pub mod defaults {
    /// Base URL used when neither the config file nor the environment sets one
    pub const BASE_URL: &str = "http://localhost:8000";

    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    pub const USER_AGENT: &str = concat!("flowboard/", env!("CARGO_PKG_VERSION"));
}

/// Environment variables
pub mod env {
    /// Overrides the configured base URL
    pub const API_URL: &str = "FLOWBOARD_API_URL";
}

/// Endpoint paths relative to the base URL
pub mod endpoints {
    pub const CATALOG: &str = "/api/v1/nodes/";
    pub const MODELS: &str = "/api/v1/nodes/models";
    pub const EXECUTE: &str = "/api/v1/nodes/execute";
    pub const COLLECTIONS: &str = "/api/v1/vector-store/collections";
    pub const WORKFLOWS: &str = "/api/v1/workflows/";
}

/// Dynamic option families served by the backend
pub mod families {
    pub const MODELS: &str = "models";
    pub const COLLECTIONS: &str = "collections";
}
