//! Lifecycle orchestration of keys, DIDs, VCs and VPs against the onboarding service.
pub mod api;
pub mod errors;
pub mod http_client;

use crate::api::{
    OnboarderDIDAPI, OnboarderInfoAPI, OnboarderKeyAPI, OnboarderVCAPI, OnboarderVPAPI,
};

/// A type for implementing CLI traits on.
pub struct OnboarderAPI;

impl OnboarderInfoAPI for OnboarderAPI {}
impl OnboarderKeyAPI for OnboarderAPI {}
impl OnboarderDIDAPI for OnboarderAPI {}
impl OnboarderVCAPI for OnboarderAPI {}
impl OnboarderVPAPI for OnboarderAPI {}
