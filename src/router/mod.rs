//! Intent classification.
//!
//! Pure functions from a message and the user's current context to an
//! [`Intent`] and the [`ContextUpdate`] to write back. No I/O happens here;
//! handlers execute the intent and persist the update.

mod cities;
mod keywords;
mod postback;

pub use cities::{City, CityDirectory};
pub use keywords::NormalizedMessage;
pub use postback::PostbackAction;

use chrono::NaiveDate;

use crate::context::{ContextPatch, ContextState, ContextUpdate, PendingAction};
use crate::utils::regex::RegexPatterns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastHorizon {
    /// A day relative to today in the city's timezone (1 = tomorrow).
    DaysAhead(u8),
    Day(NaiveDate),
    Weekly,
    Hourly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// A weather question without a recognizable city.
    NoCity,
    WeatherCurrent(City),
    WeatherWeekly(City),
    WeatherHourly(City),
    /// A short follow-up ("and tomorrow?") resolved against the remembered city.
    ContextualFollowUp {
        city: City,
        horizon: ForecastHorizon,
    },
    TimeQuery,
    /// A YouTube link to summarize.
    VideoSummary(String),
    /// A request to find videos about the carried topic.
    VideoSearch(String),
    General,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub update: ContextUpdate,
}

impl Classification {
    fn new(intent: Intent, update: ContextUpdate) -> Self {
        Self { intent, update }
    }

    /// Rewrite the update so the pending action is dropped while the
    /// remembered entity survives. A merge cannot unset a field, so every
    /// outcome that keeps some state becomes a replace.
    fn dropping_pending(self, ctx: &ContextState) -> Self {
        let remembered = ctx.last_mentioned_entity.clone();
        let update = match self.update {
            ContextUpdate::Keep => match remembered {
                Some(entity) => ContextUpdate::Replace(ContextPatch::entity(entity)),
                None => ContextUpdate::Clear,
            },
            ContextUpdate::Merge(patch) => ContextUpdate::Replace(ContextPatch {
                pending_action: patch.pending_action,
                last_mentioned_entity: patch.last_mentioned_entity.or(remembered),
            }),
            other => other,
        };
        Self { update, ..self }
    }
}

/// Classify a text message against the user's current context.
///
/// Precedence, highest first:
/// 1. A pending city question answered with a city resolves that question.
///    Any other message abandons it and is classified on its own.
/// 2. A follow-up keyword without an explicit city reuses the remembered city.
/// 3. Weather keywords (or a follow-up keyword naming a city) ask for weather.
/// 4. Time keywords ask for the time.
/// 5. Everything else is open-ended: a YouTube link is summarized, a video
///    request with a topic is searched, and the rest goes to the assistant.
pub fn classify(text: &str, ctx: &ContextState, cities: &CityDirectory) -> Classification {
    let message = NormalizedMessage::new(text);

    if ctx.pending_action == Some(PendingAction::AwaitingCityForWeather) {
        if let Some(city) = cities.find_in(&message) {
            return Classification::new(
                weather_intent(&message, city.clone()),
                ContextUpdate::Replace(ContextPatch::entity(city.name.clone())),
            );
        }
        return classify_open(&message, ctx, cities).dropping_pending(ctx);
    }

    classify_open(&message, ctx, cities)
}

fn classify_open(
    message: &NormalizedMessage,
    ctx: &ContextState,
    cities: &CityDirectory,
) -> Classification {
    let named = cities.find_in(message);
    let horizon = follow_up_horizon(message);

    if named.is_none()
        && let Some(horizon) = horizon
        && let Some(city) = ctx
            .last_mentioned_entity
            .as_deref()
            .and_then(|name| cities.by_name(name))
    {
        return Classification::new(
            Intent::ContextualFollowUp {
                city: city.clone(),
                horizon,
            },
            ContextUpdate::Merge(ContextPatch::entity(city.name.clone())),
        );
    }

    let asks_weather =
        message.mentions_any(keywords::WEATHER) || (horizon.is_some() && named.is_some());
    if asks_weather {
        return match named {
            Some(city) => Classification::new(
                weather_intent(message, city.clone()),
                ContextUpdate::Merge(ContextPatch::entity(city.name.clone())),
            ),
            None => Classification::new(
                Intent::NoCity,
                ContextUpdate::Merge(ContextPatch::pending(
                    PendingAction::AwaitingCityForWeather,
                )),
            ),
        };
    }

    if message.mentions_any(keywords::TIME) {
        return Classification::new(Intent::TimeQuery, ContextUpdate::Keep);
    }

    if let Some(link) = RegexPatterns::youtube_url().find(message.original()) {
        return Classification::new(
            Intent::VideoSummary(link.as_str().to_string()),
            ContextUpdate::Keep,
        );
    }

    if message.mentions_any(keywords::VIDEO)
        && let Some(topic) = video_topic(message.original())
    {
        return Classification::new(Intent::VideoSearch(topic), ContextUpdate::Keep);
    }

    Classification::new(Intent::General, ContextUpdate::Keep)
}

/// What a video request is about, with the request words removed.
fn video_topic(text: &str) -> Option<String> {
    let stripped = RegexPatterns::video_request_words().replace_all(text, " ");
    let topic = stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_ascii_punctuation() || matches!(c, '？' | '！' | '。' | '、'))
        .trim()
        .to_string();
    (!topic.is_empty()).then_some(topic)
}

fn weather_intent(message: &NormalizedMessage, city: City) -> Intent {
    if message.mentions_any(keywords::WEEKLY) {
        Intent::WeatherWeekly(city)
    } else if message.mentions_any(keywords::HOURLY) {
        Intent::WeatherHourly(city)
    } else {
        Intent::WeatherCurrent(city)
    }
}

fn follow_up_horizon(message: &NormalizedMessage) -> Option<ForecastHorizon> {
    if message.mentions_any(keywords::WEEKLY) {
        Some(ForecastHorizon::Weekly)
    } else if message.mentions_any(keywords::HOURLY) {
        Some(ForecastHorizon::Hourly)
    } else if message.mentions_any(keywords::DAY_AFTER_TOMORROW) {
        Some(ForecastHorizon::DaysAhead(2))
    } else if message.mentions_any(keywords::TOMORROW) {
        Some(ForecastHorizon::DaysAhead(1))
    } else {
        None
    }
}
