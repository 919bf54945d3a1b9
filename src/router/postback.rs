use chrono::NaiveDate;

use super::{CityDirectory, ForecastHorizon};
use crate::context::{ContextPatch, ContextUpdate};
use crate::utils::regex::RegexPatterns;

/// A button press decoded from its `data` string.
#[derive(Debug, Clone, PartialEq)]
pub enum PostbackAction {
    Current { city: String },
    Forecast { city: String, horizon: ForecastHorizon },
    /// Anything without a known prefix. Answered by the assistant.
    Other(String),
}

const PREFIXES: &[(&str, Kind)] = &[
    ("weekly_forecast_", Kind::Weekly),
    ("hourly_forecast_", Kind::Hourly),
    ("detailed_forecast_", Kind::Hourly),
    ("daily_detail_", Kind::Daily),
    ("refresh_", Kind::Current),
    ("weekly_", Kind::Weekly),
];

#[derive(Debug, Clone, Copy)]
enum Kind {
    Current,
    Weekly,
    Hourly,
    Daily,
}

impl PostbackAction {
    pub fn parse(data: &str) -> Self {
        let data = data.trim();
        for (prefix, kind) in PREFIXES {
            let Some(rest) = data.strip_prefix(prefix) else {
                continue;
            };
            if rest.is_empty() {
                break;
            }
            let city = rest.to_string();
            return match kind {
                Kind::Current => PostbackAction::Current { city },
                Kind::Weekly => PostbackAction::Forecast {
                    city,
                    horizon: ForecastHorizon::Weekly,
                },
                Kind::Hourly => PostbackAction::Forecast {
                    city,
                    horizon: ForecastHorizon::Hourly,
                },
                Kind::Daily => match parse_daily(rest) {
                    Some((date, city)) => PostbackAction::Forecast {
                        city,
                        horizon: ForecastHorizon::Day(date),
                    },
                    None => PostbackAction::Other(data.to_string()),
                },
            };
        }
        PostbackAction::Other(data.to_string())
    }

    pub fn city(&self) -> Option<&str> {
        match self {
            PostbackAction::Current { city } | PostbackAction::Forecast { city, .. } => Some(city),
            PostbackAction::Other(_) => None,
        }
    }

    /// A button press starts a fresh context: any pending question is dropped
    /// and the resolved city, if any, becomes the remembered one.
    pub fn context_update(&self, cities: &CityDirectory) -> ContextUpdate {
        match self.city().and_then(|name| cities.by_name(name)) {
            Some(city) => ContextUpdate::Replace(ContextPatch::entity(city.name.clone())),
            None => ContextUpdate::Clear,
        }
    }
}

fn parse_daily(rest: &str) -> Option<(NaiveDate, String)> {
    let caps = RegexPatterns::iso_date_prefix().captures(rest)?;
    let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
    Some((date, caps[2].to_string()))
}
