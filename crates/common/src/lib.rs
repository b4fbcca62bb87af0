//! Wire types shared between the PrintWatch agent, server, and dashboard
//! client. Everything here travels as plain JSON over HTTPS.

pub mod agents;
pub mod jobs;
pub mod reports;

use serde::{Deserialize, Serialize};

/// JSON body returned by the server for every error response.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorBody {
    pub error: String,
    /// Present on duplicate-submission conflicts: the id the server
    /// originally assigned to this submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<i32>,
}
