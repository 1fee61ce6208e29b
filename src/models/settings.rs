use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedDomain {
    pub domain: String,
    pub enabled: bool,
}

impl TrackedDomain {
    pub fn enabled(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            enabled: true,
        }
    }
}

/// Global user settings. Read-mostly; mutated only through explicit user
/// action in the popup UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub tracked_domains: Vec<TrackedDomain>,
    pub time_limit_minutes: u64,
    pub active_room_id: Option<String>,
}

impl Settings {
    pub fn limit_seconds(&self) -> f64 {
        (self.time_limit_minutes * 60) as f64
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tracked_domains: vec![
                TrackedDomain::enabled("reddit.com"),
                TrackedDomain::enabled("twitter.com"),
                TrackedDomain::enabled("x.com"),
                TrackedDomain::enabled("instagram.com"),
                TrackedDomain::enabled("tiktok.com"),
                TrackedDomain::enabled("youtube.com"),
                TrackedDomain::enabled("facebook.com"),
            ],
            time_limit_minutes: 15,
            active_room_id: None,
        }
    }
}

/// Logged-in user as stored by the popup after authentication. The bearer
/// token is what the backend API client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    pub id: String,
    pub username: String,
    pub token: String,
}
