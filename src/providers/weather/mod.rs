//! OpenWeatherMap client.
//!
//! Current conditions render as a rich card with follow-up buttons; forecasts
//! render as plain text grouped by the city's local day.

mod cards;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Days, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::WeatherProvider;
use super::errors::{RetryConfig, check_response, with_retry};
use crate::config::WeatherConfig;
use crate::delivery::ResponsePayload;
use crate::router::{City, ForecastHorizon};
use crate::utils::http::http_client;

const REQUEST_TIMEOUT_SECS: u64 = 8;
/// Forecast entries are three hours apart; eight cover the next day.
const HOURLY_ENTRIES: u32 = 8;
const FULL_FORECAST_ENTRIES: u32 = 40;

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Condition {
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Readings {
    pub temp: f64,
    #[serde(default)]
    pub feels_like: f64,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub temp_min: f64,
    #[serde(default)]
    pub temp_max: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Wind {
    #[serde(default)]
    pub speed: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CurrentWeather {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub weather: Vec<Condition>,
    pub main: Readings,
    #[serde(default)]
    pub wind: Option<Wind>,
}

impl CurrentWeather {
    fn condition(&self) -> Condition {
        self.weather.first().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ForecastEntry {
    /// Unix seconds, UTC.
    pub dt: i64,
    pub main: Readings,
    #[serde(default)]
    pub weather: Vec<Condition>,
    /// Probability of precipitation, 0.0..=1.0.
    #[serde(default)]
    pub pop: f64,
}

impl ForecastEntry {
    fn condition(&self) -> Condition {
        self.weather.first().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Forecast {
    #[serde(default)]
    pub list: Vec<ForecastEntry>,
}

/// Display units for the configured measurement system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Units {
    pub temperature: &'static str,
    pub speed: &'static str,
}

impl Units {
    fn for_system(system: &str) -> Self {
        match system {
            "imperial" => Self {
                temperature: "°F",
                speed: "mph",
            },
            "standard" => Self {
                temperature: "K",
                speed: "m/s",
            },
            _ => Self {
                temperature: "°C",
                speed: "m/s",
            },
        }
    }
}

pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    units: String,
    lang: String,
    client: Client,
    retry: RetryConfig,
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            units: config.units.clone(),
            lang: config.lang.clone(),
            client: http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
            retry: RetryConfig::default(),
        }
    }

    fn display_units(&self) -> Units {
        Units::for_system(&self.units)
    }

    async fn fetch(
        &self,
        endpoint: &str,
        latitude: f64,
        longitude: f64,
        count: Option<u32>,
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut query: Vec<(&str, String)> = vec![
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("appid", self.api_key.clone()),
            ("units", self.units.clone()),
            ("lang", self.lang.clone()),
        ];
        if let Some(count) = count {
            query.push(("cnt", count.to_string()));
        }
        debug!("fetching {} for ({}, {})", endpoint, latitude, longitude);
        let client = &self.client;
        let (url, query) = (&url, &query);
        with_retry(self.retry, "OpenWeather", move || async move {
            let resp = client
                .get(url)
                .query(query)
                .send()
                .await
                .with_context(|| format!("Failed to send request to OpenWeather {}", endpoint))?;
            check_response(resp, "OpenWeather").await
        })
        .await
    }

    async fn fetch_current(&self, latitude: f64, longitude: f64) -> Result<CurrentWeather> {
        let json = self.fetch("weather", latitude, longitude, None).await?;
        serde_json::from_value(json).context("Unexpected OpenWeather current weather shape")
    }

    async fn fetch_forecast(&self, city: &City, count: u32) -> Result<Forecast> {
        let json = self
            .fetch("forecast", city.latitude, city.longitude, Some(count))
            .await?;
        serde_json::from_value(json).context("Unexpected OpenWeather forecast shape")
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(&self, city: &City) -> Result<ResponsePayload> {
        let observed = self.fetch_current(city.latitude, city.longitude).await?;
        let local = Utc::now().with_timezone(&city.timezone);
        Ok(cards::current_card(
            &observed,
            &city.name,
            Some(&city.name),
            self.display_units(),
            &local.format("%a %-d %b %H:%M").to_string(),
        ))
    }

    async fn forecast(&self, city: &City, horizon: ForecastHorizon) -> Result<ResponsePayload> {
        let units = self.display_units();
        let payload = match horizon {
            ForecastHorizon::Hourly => {
                let forecast = self.fetch_forecast(city, HOURLY_ENTRIES).await?;
                cards::hourly_text(city, &forecast, units)
            }
            ForecastHorizon::Weekly => {
                let forecast = self.fetch_forecast(city, FULL_FORECAST_ENTRIES).await?;
                cards::weekly_text(city, &forecast, units)
            }
            ForecastHorizon::DaysAhead(days) => {
                let today = Utc::now().with_timezone(&city.timezone).date_naive();
                let date = today
                    .checked_add_days(Days::new(u64::from(days)))
                    .context("forecast date out of range")?;
                let forecast = self.fetch_forecast(city, FULL_FORECAST_ENTRIES).await?;
                cards::day_text(city, &forecast, date, units)
            }
            ForecastHorizon::Day(date) => {
                let forecast = self.fetch_forecast(city, FULL_FORECAST_ENTRIES).await?;
                cards::day_text(city, &forecast, date, units)
            }
        };
        Ok(payload)
    }

    async fn current_at(&self, latitude: f64, longitude: f64) -> Result<ResponsePayload> {
        let observed = self.fetch_current(latitude, longitude).await?;
        let title = if observed.name.is_empty() {
            format!("{:.3}, {:.3}", latitude, longitude)
        } else {
            observed.name.clone()
        };
        let local = Utc::now().format("%a %-d %b %H:%M UTC").to_string();
        Ok(cards::current_card(
            &observed,
            &title,
            None,
            self.display_units(),
            &local,
        ))
    }
}
