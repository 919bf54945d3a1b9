use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::channels::{LineClient, MessagingClient};
use crate::config::credentials::missing_credentials;
use crate::config::{Config, StorageBackend, load_config};
use crate::context::{ContextManager, ContextStore, MemoryContextStore};
use crate::deadline::DeadlinePolicy;
use crate::delivery::PayloadLimits;
use crate::dispatch::{Dispatcher, DispatcherParts};
use crate::gateway::{self, GatewayState};
use crate::handlers::{HandlerSettings, Handlers, Services};
use crate::idempotency::{EventDeduplicator, ReplyTokenGuard};
use crate::providers::{GeminiClient, OpenWeatherClient, YouTubeClient};
use crate::router::CityDirectory;
use crate::store::{HistoryStore, MemoryHistoryStore, SqliteStore};
use crate::telemetry::{self, ErrorReporter, LogReporter};
use crate::utils::{ensure_dir, expand_home};

/// The three persistence seams, backed by one store or by memory.
pub(super) struct Stores {
    pub context: Arc<dyn ContextStore>,
    pub history: Arc<dyn HistoryStore>,
    pub reporter: Arc<dyn ErrorReporter>,
}

pub(super) fn open_stores(config: &Config) -> Result<Stores> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Stores {
            context: Arc::new(MemoryContextStore::new(
                Duration::from_secs(config.context.ttl_secs),
                config.context.max_users,
            )),
            history: Arc::new(MemoryHistoryStore::new(
                config.context.history_limit,
                config.context.max_users,
            )),
            reporter: Arc::new(LogReporter),
        }),
        StorageBackend::Sqlite => {
            let path = expand_home(&config.storage.path);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                ensure_dir(parent)?;
            }
            let store = Arc::new(
                SqliteStore::open(&path, config.context.history_limit)
                    .with_context(|| format!("failed to open store at {}", path.display()))?,
            );
            info!("conversation store: {}", path.display());
            Ok(Stores {
                context: store.clone(),
                history: store.clone(),
                reporter: store,
            })
        }
    }
}

/// Wire every collaborator named in `config` into a dispatcher.
pub(super) fn build_dispatcher(
    config: &Config,
    stores: Stores,
    messenger: Arc<dyn MessagingClient>,
) -> Result<Dispatcher> {
    let cities = CityDirectory::with_extra(&config.context.extra_cities)?;
    let services = Services {
        ai: Arc::new(GeminiClient::new(&config.providers.gemini)),
        weather: Arc::new(OpenWeatherClient::new(&config.providers.weather)),
        video: Arc::new(YouTubeClient::new(&config.providers.youtube)),
        messenger: messenger.clone(),
        context: ContextManager::new(
            stores.context,
            Duration::from_secs(config.context.ttl_secs),
        ),
        history: stores.history,
    };
    let settings = HandlerSettings {
        cities,
        history_window: config.context.history_window,
        bot_name: config.providers.gemini.bot_name.clone(),
        ..HandlerSettings::default()
    };

    let idempotency = &config.idempotency;
    Ok(Dispatcher::new(DispatcherParts {
        dedup: EventDeduplicator::in_memory(
            Duration::from_secs(idempotency.dedup_ttl_secs),
            idempotency.max_entries,
        ),
        tokens: ReplyTokenGuard::in_memory(
            Duration::from_secs(idempotency.reply_token_ttl_secs),
            idempotency.max_entries,
        ),
        handlers: Arc::new(Handlers::new(services, settings)),
        messenger,
        reporter: stores.reporter,
        policy: DeadlinePolicy::from_config(&config.delivery),
        limits: PayloadLimits::from_config(&config.delivery),
        default_language: config.replies.default_language,
    }))
}

pub(super) async fn serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    config.validate()?;

    for slot in missing_credentials(&config) {
        warn!("credential '{}' is empty; related features will fail", slot);
    }
    if config.line.channel_secret.is_empty() {
        warn!("no channel secret configured: webhook signatures are NOT verified");
    }

    let stores = open_stores(&config)?;
    let messenger: Arc<dyn MessagingClient> = Arc::new(LineClient::new(&config.line));
    let dispatcher = build_dispatcher(&config, stores, messenger)?;

    let mut state = GatewayState::new(Arc::new(dispatcher), &config.line.channel_secret);
    match telemetry::install_prometheus() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => warn!("metrics disabled: {}", e),
    }

    gateway::serve(&config.gateway, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
    })
    .await
}

pub(super) fn check_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    println!("Configuration OK\n");
    println!("{}", describe(&config));
    Ok(())
}

pub(super) fn describe(config: &Config) -> String {
    let mut out = format!("{:#?}\n", config);
    let missing = missing_credentials(config);
    if missing.is_empty() {
        out.push_str("\nAll credentials set.");
    } else {
        out.push_str("\nMissing credentials:");
        for slot in missing {
            out.push_str("\n  - ");
            out.push_str(slot);
        }
    }
    out
}

pub(super) fn cities(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let directory = CityDirectory::with_extra(&config.context.extra_cities)?;
    print!("{}", city_table(&directory));
    Ok(())
}

pub(super) fn city_table(directory: &CityDirectory) -> String {
    let mut out = String::new();
    for city in directory.iter() {
        out.push_str(&format!(
            "{:<12} {:>8.4} {:>9.4}  {:<16} {}\n",
            city.name,
            city.latitude,
            city.longitude,
            city.timezone.name(),
            city.aliases().join(", ")
        ));
    }
    out
}
