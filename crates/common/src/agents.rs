//! Agent registration, heartbeat, and fleet-listing types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/agents/register`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub hostname: String,
    /// Site label the agent belongs to; created on first use.
    pub site: String,
    pub agent_version: String,
    #[serde(default)]
    pub registration_token: Option<String>,
}

/// Reply to a successful registration. The API key is returned exactly
/// once; only its hash is kept server-side.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterResponse {
    pub agent_id: i32,
    pub api_key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HeartbeatResponse {
    pub server_time: DateTime<Utc>,
}

/// Liveness derived from `last_seen` staleness; never stored.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Online,
    Stale,
    Offline,
}

/// An agent is online for five minutes after its last contact and stale
/// for thirty; beyond that it is reported offline.
pub const ONLINE_WINDOW_SECONDS: i64 = 5 * 60;
pub const STALE_WINDOW_SECONDS: i64 = 30 * 60;

impl Liveness {
    pub fn from_last_seen(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> Liveness {
        let age = now - last_seen;
        if age <= Duration::seconds(ONLINE_WINDOW_SECONDS) {
            Liveness::Online
        } else if age <= Duration::seconds(STALE_WINDOW_SECONDS) {
            Liveness::Stale
        } else {
            Liveness::Offline
        }
    }
}

/// One row of `GET /api/agents`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AgentSummary {
    pub id: i32,
    pub site_id: i32,
    pub site: String,
    pub hostname: String,
    pub agent_version: Option<String>,
    pub liveness: Liveness,
    pub last_seen: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    pub total_jobs: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SiteSummary {
    pub id: i32,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liveness_thresholds() {
        let now = Utc::now();
        assert_eq!(Liveness::from_last_seen(now, now), Liveness::Online);
        assert_eq!(
            Liveness::from_last_seen(now - Duration::minutes(4), now),
            Liveness::Online
        );
        assert_eq!(
            Liveness::from_last_seen(now - Duration::minutes(6), now),
            Liveness::Stale
        );
        assert_eq!(
            Liveness::from_last_seen(now - Duration::hours(2), now),
            Liveness::Offline
        );
    }
}
