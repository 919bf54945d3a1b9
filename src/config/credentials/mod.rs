use super::schema::Config;

macro_rules! define_credentials {
    ($( $name:literal, $env:literal => $($path:ident).+ );* $(;)?) => {
        /// (slot name, env var name) pairs.
        pub const CREDENTIAL_ENV_VARS: &[(&str, &str)] = &[$(($name, $env)),*];

        /// Get the current value of a credential field by slot name.
        pub fn get_credential_value<'a>(config: &'a Config, name: &str) -> Option<&'a str> {
            match name {
                $($name => Some(config.$($path).+.as_str()),)*
                _ => None,
            }
        }

        /// Apply environment variable overrides.
        ///
        /// Any `KAZEBOT_*` env var that is set and non-empty will overwrite the
        /// corresponding config field, so secrets can be injected without
        /// touching the config file.
        pub fn apply_env_overrides(config: &mut Config) {
            $(
                if let Ok(val) = std::env::var($env) {
                    if !val.is_empty() {
                        config.$($path).+ = val;
                    }
                }
            )*
        }
    };
}

define_credentials! {
    "line-channel-secret",       "KAZEBOT_LINE_CHANNEL_SECRET"       => line.channel_secret;
    "line-channel-access-token", "KAZEBOT_LINE_CHANNEL_ACCESS_TOKEN" => line.channel_access_token;
    "gemini-api-key",            "KAZEBOT_GEMINI_API_KEY"            => providers.gemini.api_key;
    "weather-api-key",           "KAZEBOT_WEATHER_API_KEY"           => providers.weather.api_key;
    "youtube-api-key",           "KAZEBOT_YOUTUBE_API_KEY"           => providers.youtube.api_key;
}

/// Credential slots that are still empty after overrides, for `check-config` output.
pub fn missing_credentials(config: &Config) -> Vec<&'static str> {
    CREDENTIAL_ENV_VARS
        .iter()
        .filter(|(name, _)| get_credential_value(config, name).is_some_and(str::is_empty))
        .map(|(name, _)| *name)
        .collect()
}
