use serde::{Deserialize, Serialize};

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_bot_name() -> String {
    "Kaze".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_api_base", rename = "apiBase")]
    pub api_base: String,
    /// Name the assistant introduces itself with in the system prompt.
    #[serde(default = "default_bot_name", rename = "botName")]
    pub bot_name: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
            api_base: default_gemini_api_base(),
            bot_name: default_bot_name(),
        }
    }
}

redact_debug!(GeminiConfig, redact(api_key), model, api_base, bot_name,);

fn default_weather_api_base() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_units() -> String {
    "metric".to_string()
}

fn default_weather_lang() -> String {
    "en".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default = "default_weather_api_base", rename = "apiBase")]
    pub api_base: String,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default = "default_weather_lang")]
    pub lang: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_weather_api_base(),
            units: default_units(),
            lang: default_weather_lang(),
        }
    }
}

redact_debug!(WeatherConfig, redact(api_key), api_base, units, lang,);

fn default_youtube_api_base() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_max_results() -> u32 {
    5
}

#[derive(Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default = "default_youtube_api_base", rename = "apiBase")]
    pub api_base: String,
    /// Hits requested per search (the API allows 1 to 50).
    #[serde(default = "default_max_results", rename = "maxResults")]
    pub max_results: u32,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_youtube_api_base(),
            max_results: default_max_results(),
        }
    }
}

redact_debug!(YouTubeConfig, redact(api_key), api_base, max_results,);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub youtube: YouTubeConfig,
}
