//! Style profile catalog
//!
//! Fetched from the service once at startup. When the service cannot be
//! reached, or lists no profiles, the runtime carries on with a built-in list
//! of profile ids.

use crate::client::ThoughtService;
use mind_common::api::Profile;
use tracing::{info, warn};

/// Profile used when the catalog is empty
pub const DEFAULT_PROFILE_ID: &str = "wide_acoustic";

/// Profile ids used when the service cannot be reached
pub const FALLBACK_PROFILE_IDS: [&str; 3] =
    ["wide_acoustic", "percussive_fingerstyle", "dark_pulse_synth"];

#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    profiles: Vec<Profile>,
}

impl ProfileCatalog {
    pub fn new(profiles: Vec<Profile>) -> Self {
        Self { profiles }
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_PROFILE_IDS.iter().map(|id| Profile::new(*id)).collect())
    }

    /// Load the catalog from the service, falling back on failure
    pub async fn fetch(service: &dyn ThoughtService) -> Self {
        match service.profiles().await {
            Ok(profiles) if profiles.is_empty() => {
                warn!("Service returned no style profiles; using fallback");
                Self::fallback()
            }
            Ok(profiles) => {
                info!("Loaded {} style profiles", profiles.len());
                Self::new(profiles)
            }
            Err(e) => {
                warn!("Failed to fetch profiles; using fallback: {}", e);
                Self::fallback()
            }
        }
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Style profile given to new nodes
    pub fn default_profile(&self) -> &str {
        self.profiles
            .first()
            .map_or(DEFAULT_PROFILE_ID, |profile| profile.id.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.profiles.iter().any(|profile| profile.id == id)
    }
}
