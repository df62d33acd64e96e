//! Core types and local logic (network independent).
pub mod claims;
pub mod config;
pub mod data;
pub mod jwk;
pub mod key_manager;
pub mod request;
pub mod store;
pub mod utils;

/// Environment variable name for the onboarder config file.
pub const ONBOARDER_CONFIG: &str = "ONBOARDER_CONFIG";

