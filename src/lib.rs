//! Onboarder library: DID, VC and VP lifecycle client.
pub use onboarder_api;
pub use onboarder_core;
