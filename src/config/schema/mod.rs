use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::KazeError;
use crate::replies::Language;

/// Generates a `Debug` impl that redacts secret fields.
///
/// Field specifiers:
/// - `field_name`            : printed normally via `&self.field_name`
/// - `redact(field_name)`    : `String` field: shows `[empty]` or `[REDACTED]`
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

// Submodules, declared after the macro so they can use `redact_debug!`
mod channels;
mod providers;

pub use channels::*;
pub use providers::*;

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_webhook_path", rename = "webhookPath")]
    pub webhook_path: String,
    #[serde(default = "default_max_body_bytes", rename = "maxBodyBytes")]
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

fn default_request_timeout_secs() -> u64 {
    25
}

fn default_safety_margin_secs() -> u64 {
    3
}

fn default_intake_reserve_ms() -> u64 {
    4000
}

fn default_media_reserve_ms() -> u64 {
    8000
}

fn default_max_text_chars() -> usize {
    5000
}

fn default_max_alt_text_chars() -> usize {
    400
}

fn default_max_card_bytes() -> usize {
    2500
}

fn default_max_payloads() -> usize {
    5
}

/// Response-time budget and outbound payload limits.
///
/// The usable budget is `requestTimeoutSecs - safetyMarginSecs`. Each stage
/// gate trips once the remaining budget falls to its reserve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(
        default = "default_request_timeout_secs",
        rename = "requestTimeoutSecs"
    )]
    pub request_timeout_secs: u64,
    #[serde(default = "default_safety_margin_secs", rename = "safetyMarginSecs")]
    pub safety_margin_secs: u64,
    #[serde(default = "default_intake_reserve_ms", rename = "intakeReserveMs")]
    pub intake_reserve_ms: u64,
    #[serde(default = "default_media_reserve_ms", rename = "mediaReserveMs")]
    pub media_reserve_ms: u64,
    #[serde(default = "default_max_text_chars", rename = "maxTextChars")]
    pub max_text_chars: usize,
    #[serde(default = "default_max_alt_text_chars", rename = "maxAltTextChars")]
    pub max_alt_text_chars: usize,
    #[serde(default = "default_max_card_bytes", rename = "maxCardBytes")]
    pub max_card_bytes: usize,
    #[serde(default = "default_max_payloads", rename = "maxPayloads")]
    pub max_payloads: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            safety_margin_secs: default_safety_margin_secs(),
            intake_reserve_ms: default_intake_reserve_ms(),
            media_reserve_ms: default_media_reserve_ms(),
            max_text_chars: default_max_text_chars(),
            max_alt_text_chars: default_max_alt_text_chars(),
            max_card_bytes: default_max_card_bytes(),
            max_payloads: default_max_payloads(),
        }
    }
}

impl DeliveryConfig {
    /// Time available for processing after the safety margin is taken off.
    pub fn budget(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .saturating_sub(self.safety_margin_secs),
        )
    }
}

// ---------------------------------------------------------------------------
// Idempotency
// ---------------------------------------------------------------------------

fn default_retention_secs() -> u64 {
    300
}

fn default_max_entries() -> u64 {
    100_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    #[serde(default = "default_retention_secs", rename = "dedupTtlSecs")]
    pub dedup_ttl_secs: u64,
    #[serde(default = "default_retention_secs", rename = "replyTokenTtlSecs")]
    pub reply_token_ttl_secs: u64,
    #[serde(default = "default_max_entries", rename = "maxEntries")]
    pub max_entries: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            dedup_ttl_secs: default_retention_secs(),
            reply_token_ttl_secs: default_retention_secs(),
            max_entries: default_max_entries(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation context
// ---------------------------------------------------------------------------

fn default_context_ttl_secs() -> u64 {
    600
}

fn default_history_limit() -> usize {
    20
}

fn default_history_window() -> usize {
    10
}

fn default_max_users() -> u64 {
    10_000
}

/// An extra city the router should recognize, on top of the built-in directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityConfig {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone name, e.g. `Asia/Tokyo`.
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_context_ttl_secs", rename = "ttlSecs")]
    pub ttl_secs: u64,
    #[serde(default = "default_history_limit", rename = "historyLimit")]
    pub history_limit: usize,
    #[serde(default = "default_history_window", rename = "historyWindow")]
    pub history_window: usize,
    /// Users the memory backend keeps context and history for at once.
    #[serde(default = "default_max_users", rename = "maxUsers")]
    pub max_users: u64,
    #[serde(default, rename = "extraCities")]
    pub extra_cities: Vec<CityConfig>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_context_ttl_secs(),
            history_limit: default_history_limit(),
            history_window: default_history_window(),
            max_users: default_max_users(),
            extra_cities: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

fn default_storage_path() -> String {
    "~/.kazebot/kazebot.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepliesConfig {
    #[serde(default, rename = "defaultLanguage")]
    pub default_language: Language,
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub replies: RepliesConfig,
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), KazeError> {
        self.validate_gateway()?;
        self.validate_delivery()?;
        self.validate_idempotency()?;
        self.validate_context()?;
        self.validate_endpoints()?;
        if !(1..=50).contains(&self.providers.youtube.max_results) {
            return Err(KazeError::Config(
                "providers.youtube.maxResults must be between 1 and 50".into(),
            ));
        }
        Ok(())
    }

    fn validate_gateway(&self) -> Result<(), KazeError> {
        let g = &self.gateway;
        if g.port == 0 {
            return Err(KazeError::Config("gateway.port must be > 0".into()));
        }
        if !g.webhook_path.starts_with('/') {
            return Err(KazeError::Config(
                "gateway.webhookPath must start with '/'".into(),
            ));
        }
        if g.max_body_bytes == 0 {
            return Err(KazeError::Config(
                "gateway.maxBodyBytes must be > 0".into(),
            ));
        }
        Ok(())
    }

    fn validate_delivery(&self) -> Result<(), KazeError> {
        let d = &self.delivery;
        if d.request_timeout_secs == 0 {
            return Err(KazeError::Config(
                "delivery.requestTimeoutSecs must be > 0".into(),
            ));
        }
        if d.safety_margin_secs >= d.request_timeout_secs {
            return Err(KazeError::Config(
                "delivery.safetyMarginSecs must be smaller than delivery.requestTimeoutSecs"
                    .into(),
            ));
        }
        let budget_ms = d.budget().as_millis() as u64;
        if d.intake_reserve_ms >= budget_ms {
            return Err(KazeError::Config(format!(
                "delivery.intakeReserveMs must be smaller than the processing budget ({budget_ms} ms)"
            )));
        }
        if d.media_reserve_ms >= budget_ms {
            return Err(KazeError::Config(format!(
                "delivery.mediaReserveMs must be smaller than the processing budget ({budget_ms} ms)"
            )));
        }
        if d.max_text_chars == 0
            || d.max_alt_text_chars == 0
            || d.max_card_bytes == 0
            || d.max_payloads == 0
        {
            return Err(KazeError::Config(
                "delivery payload limits (maxTextChars, maxAltTextChars, maxCardBytes, maxPayloads) must be > 0"
                    .into(),
            ));
        }
        Ok(())
    }

    fn validate_idempotency(&self) -> Result<(), KazeError> {
        let i = &self.idempotency;
        if i.dedup_ttl_secs == 0 {
            return Err(KazeError::Config(
                "idempotency.dedupTtlSecs must be > 0".into(),
            ));
        }
        if i.reply_token_ttl_secs == 0 {
            return Err(KazeError::Config(
                "idempotency.replyTokenTtlSecs must be > 0".into(),
            ));
        }
        if i.max_entries == 0 {
            return Err(KazeError::Config(
                "idempotency.maxEntries must be > 0".into(),
            ));
        }
        Ok(())
    }

    fn validate_context(&self) -> Result<(), KazeError> {
        let c = &self.context;
        if c.ttl_secs == 0 {
            return Err(KazeError::Config("context.ttlSecs must be > 0".into()));
        }
        if c.history_limit == 0 {
            return Err(KazeError::Config(
                "context.historyLimit must be > 0".into(),
            ));
        }
        if c.max_users == 0 {
            return Err(KazeError::Config("context.maxUsers must be > 0".into()));
        }
        if c.history_window > c.history_limit {
            return Err(KazeError::Config(
                "context.historyWindow must not exceed context.historyLimit".into(),
            ));
        }
        for city in &c.extra_cities {
            if city.name.trim().is_empty() {
                return Err(KazeError::Config(
                    "context.extraCities entries need a name".into(),
                ));
            }
            if !(-90.0..=90.0).contains(&city.latitude)
                || !(-180.0..=180.0).contains(&city.longitude)
            {
                return Err(KazeError::Config(format!(
                    "context.extraCities.{}: coordinates out of range",
                    city.name
                )));
            }
            if city.timezone.parse::<chrono_tz::Tz>().is_err() {
                return Err(KazeError::Config(format!(
                    "context.extraCities.{}: unknown timezone '{}'",
                    city.name, city.timezone
                )));
            }
        }
        Ok(())
    }

    fn validate_endpoints(&self) -> Result<(), KazeError> {
        let endpoints = [
            ("line.apiBase", self.line.api_base.as_str()),
            ("line.dataApiBase", self.line.data_api_base.as_str()),
            ("providers.gemini.apiBase", self.providers.gemini.api_base.as_str()),
            ("providers.weather.apiBase", self.providers.weather.api_base.as_str()),
            ("providers.youtube.apiBase", self.providers.youtube.api_base.as_str()),
        ];
        for (name, value) in endpoints {
            let parsed = url::Url::parse(value)
                .map_err(|e| KazeError::Config(format!("{name} is not a valid URL: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(KazeError::Config(format!(
                    "{name} must use http or https"
                )));
            }
        }
        Ok(())
    }
}
