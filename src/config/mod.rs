pub mod credentials;
pub mod loader;
pub mod schema;

pub use loader::{get_config_path, load_config};
pub use schema::{
    CityConfig, Config, ContextConfig, DeliveryConfig, GatewayConfig, GeminiConfig,
    IdempotencyConfig, LineConfig, ProvidersConfig, RepliesConfig, StorageBackend, StorageConfig,
    WeatherConfig, YouTubeConfig,
};
