use serde::{Deserialize, Serialize};

/// Message resource returned by the Twilio Messages API.
///
/// Only the fields we read are modeled; Twilio returns many more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub sid: String,
    pub status: String,
    pub to: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}
