use serde::{Deserialize, Serialize};

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

fn default_line_data_api_base() -> String {
    "https://api-data.line.me".to_string()
}

/// Messaging platform credentials and endpoints.
///
/// An empty `channelSecret` disables webhook signature verification, which is
/// only meant for local testing.
#[derive(Clone, Serialize, Deserialize)]
pub struct LineConfig {
    #[serde(default, rename = "channelSecret")]
    pub channel_secret: String,
    #[serde(default, rename = "channelAccessToken")]
    pub channel_access_token: String,
    #[serde(default = "default_line_api_base", rename = "apiBase")]
    pub api_base: String,
    #[serde(default = "default_line_data_api_base", rename = "dataApiBase")]
    pub data_api_base: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: String::new(),
            channel_access_token: String::new(),
            api_base: default_line_api_base(),
            data_api_base: default_line_data_api_base(),
        }
    }
}

redact_debug!(
    LineConfig,
    redact(channel_secret),
    redact(channel_access_token),
    api_base,
    data_api_base,
);
